//! Eager Arrow frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, Value};
use tessera_expr::compliant::{CompliantFrame, CompliantSeries, Reconciled};

use super::dtypes::from_logical;
use super::series::ArrowSeries;
use super::Columnar;
use crate::compute::scalar::to_array;
use crate::compute::selection::{self, broadcast};
use crate::compute::{grouping, NativeAgg};

/// A record batch.
#[derive(Debug, Clone)]
pub struct ArrowFrame {
    batch: RecordBatch,
}

impl ArrowFrame {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a frame from named columns of equal length.
    pub fn from_columns<I, S>(columns: I) -> TesseraResult<Self>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: Into<String>,
    {
        let columns: Vec<(String, ArrayRef)> =
            columns.into_iter().map(|(n, a)| (n.into(), a)).collect();
        let height = columns.first().map_or(0, |(_, a)| a.len());
        Ok(Self::new(selection::batch_of(columns, height)?))
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn height(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Height of a frame assembled from columns of `lengths`: the first length
/// other than one, else one (zero when there are no columns).
pub(crate) fn assembled_height(lengths: impl IntoIterator<Item = usize>) -> usize {
    let mut any = false;
    for len in lengths {
        if len != 1 {
            return len;
        }
        any = true;
    }
    usize::from(any)
}

/// Replace same-named columns in place and append the rest.
pub(crate) fn merge_columns(
    mut existing: Vec<(String, ArrayRef)>,
    new: Vec<(String, ArrayRef)>,
) -> Vec<(String, ArrayRef)> {
    for (name, array) in new {
        match existing.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = array,
            None => existing.push((name, array)),
        }
    }
    existing
}

pub(crate) fn named_columns(batch: &RecordBatch) -> Vec<(String, ArrayRef)> {
    batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| (field.name().clone(), Arc::clone(array)))
        .collect()
}

pub(crate) fn frame_height_mismatch(len: usize, height: usize) -> TesseraError {
    TesseraError::value_error(format!(
        "Series of length {len} cannot be aligned with a frame of height {height}"
    ))
}

impl CompliantFrame<Columnar> for ArrowFrame {
    fn columns(&self) -> Vec<String> {
        selection::column_names(&self.batch)
    }

    fn column(&self, name: &str) -> TesseraResult<ArrowSeries> {
        Ok(ArrowSeries::new(name, selection::column(&self.batch, name)?))
    }

    fn dtype_of(&self, name: &str) -> TesseraResult<DataType> {
        Ok(selection::column(&self.batch, name)?.data_type().clone())
    }

    fn len_series(&self) -> TesseraResult<ArrowSeries> {
        let height = i64::try_from(self.height())
            .map_err(|_| TesseraError::value_error("frame height exceeds i64"))?;
        Ok(ArrowSeries::new("len", Arc::new(Int64Array::from(vec![height]))))
    }

    fn literal(&self, value: &Value, dtype: Option<&DType>) -> TesseraResult<ArrowSeries> {
        let target = dtype.map(from_logical).transpose()?;
        Ok(ArrowSeries::new("literal", to_array(value, target.as_ref())?))
    }

    fn from_series(&self, series: Vec<ArrowSeries>) -> TesseraResult<Self> {
        let height = assembled_height(series.iter().map(ArrowSeries::len));
        let columns = series
            .into_iter()
            .map(|s| Ok((s.name().to_string(), broadcast(s.array(), height)?)))
            .collect::<TesseraResult<Vec<_>>>()?;
        Ok(Self::new(selection::batch_of(columns, height)?))
    }

    fn with_series(&self, series: Vec<ArrowSeries>) -> TesseraResult<Self> {
        let height = self.height();
        let mut new = Vec::with_capacity(series.len());
        for s in series {
            let array = match self.reconcile_series(&s)? {
                Reconciled::Column(aligned) => aligned.into_array(),
                _ => broadcast(s.array(), height)?,
            };
            new.push((s.name().to_string(), array));
        }
        let columns = merge_columns(named_columns(&self.batch), new);
        Ok(Self::new(selection::batch_of(columns, height)?))
    }

    fn filter_mask(&self, mask: &ArrowSeries) -> TesseraResult<Self> {
        Ok(Self::new(selection::filter_batch(&self.batch, mask.array())?))
    }

    fn reconcile_series(&self, series: &ArrowSeries) -> TesseraResult<Reconciled<ArrowSeries>> {
        match series.len() {
            1 => Ok(Reconciled::Scalar(series.get(0)?)),
            n if n == self.height() => Ok(Reconciled::Column(series.clone())),
            n => Err(frame_height_mismatch(n, self.height())),
        }
    }

    fn group_and_aggregate(
        &self,
        keys: &[String],
        aggs: &[NativeAgg],
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        Ok(Self::new(grouping::aggregate(
            &self.batch,
            keys,
            aggs,
            drop_null_keys,
        )?))
    }

    fn concat_horizontal(frames: &[Self]) -> TesseraResult<Self> {
        let batches: Vec<RecordBatch> = frames.iter().map(|f| f.batch.clone()).collect();
        Ok(Self::new(selection::hstack(&batches)?))
    }

    fn concat_vertical(frames: &[Self]) -> TesseraResult<Self> {
        let batches: Vec<RecordBatch> = frames.iter().map(|f| f.batch.clone()).collect();
        Ok(Self::new(selection::vstack(&batches)?))
    }

    fn sort(&self, by: &[String], descending: &[bool]) -> TesseraResult<Self> {
        Ok(Self::new(selection::sort_batch(&self.batch, by, descending)?))
    }

    fn head(&self, n: usize) -> TesseraResult<Self> {
        Ok(Self::new(selection::head_batch(&self.batch, n)))
    }

    fn rename(&self, mapping: &BTreeMap<String, String>) -> TesseraResult<Self> {
        Ok(Self::new(selection::rename_batch(&self.batch, mapping)?))
    }

    fn drop(&self, names: &[String]) -> TesseraResult<Self> {
        Ok(Self::new(selection::drop_columns(&self.batch, names)?))
    }

    fn to_batch(&self) -> TesseraResult<RecordBatch> {
        Ok(self.batch.clone())
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, Float64Array, StringArray};
    use tessera_expr::compliant::{Comparand, CompliantSeries};

    use super::*;

    fn sample() -> ArrowFrame {
        ArrowFrame::from_columns([
            ("a", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            ("b", Arc::new(StringArray::from(vec!["x", "y", "z"])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_series_broadcasts_scalars() {
        let f = sample();
        let total = ArrowSeries::new("total", Arc::new(Int64Array::from(vec![6])));
        let out = f.from_series(vec![f.column("a").unwrap(), total]).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(out.columns(), ["a", "total"]);

        let only_scalar = f
            .from_series(vec![ArrowSeries::new("s", Arc::new(Int64Array::from(vec![6])))])
            .unwrap();
        assert_eq!(only_scalar.height(), 1);
    }

    #[test]
    fn test_with_series_replaces_in_place() {
        let f = sample();
        let doubled = ArrowSeries::new("a", Arc::new(Float64Array::from(vec![2.0, 4.0, 6.0])));
        let extra = ArrowSeries::new("c", Arc::new(Int64Array::from(vec![0])));
        let out = f.with_series(vec![doubled, extra]).unwrap();
        assert_eq!(out.columns(), ["a", "b", "c"]);
        assert_eq!(out.dtype_of("a").unwrap(), DataType::Float64);
        assert_eq!(out.batch().column(2).len(), 3);
    }

    #[test]
    fn test_frame_context_reconcile() {
        let f = sample();
        let one = ArrowSeries::new("x", Arc::new(Int64Array::from(vec![9])));
        assert!(matches!(
            f.reconcile(&Comparand::Series(one)).unwrap(),
            Reconciled::Scalar(Value::Int64(9))
        ));
        let wrong = ArrowSeries::new("x", Arc::new(Int64Array::from(vec![1, 2])));
        assert!(matches!(
            f.reconcile(&Comparand::Series(wrong)),
            Err(TesseraError::ValueError(_))
        ));
        assert!(f.reconcile(&Comparand::Frame(sample())).unwrap().is_unsupported());
        assert!(matches!(
            f.reconcile(&Comparand::Exprs(Vec::new())),
            Err(TesseraError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_literal_with_dtype() {
        let lit = sample()
            .literal(&Value::Int64(1), Some(&DType::Float32))
            .unwrap();
        assert_eq!(lit.name(), "literal");
        assert_eq!(lit.data_type(), &DataType::Float32);
    }

    #[test]
    fn test_vertical_concat_mismatch() {
        let other = ArrowFrame::from_columns([
            ("a", Arc::new(Int64Array::from(vec![1])) as ArrayRef),
            ("c", Arc::new(Int64Array::from(vec![2])) as ArrayRef),
        ])
        .unwrap();
        let err = ArrowFrame::concat_vertical(&[sample(), other]).unwrap_err();
        assert!(matches!(err, TesseraError::ColumnMismatch(_)));
    }
}
