//! Row-labelled column.
//!
//! Every column carries a row index. Operations between two full-length
//! columns align on the labels, not on positions: the right-hand side is
//! reordered to the left-hand side's labels first.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use common_config::IndexedStorage;
use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;
use tessera_expr::compliant::{CompliantSeries, Reconciled, Reduced};
use tessera_expr::expr::{AggFunc, BinaryOp, Elementwise, Reshape};

use super::dtypes::IndexedDtype;
use super::Indexed;
use crate::columnar::{apply_binary, operand_array};
use crate::compute::scalar::{to_array, value_at};
use crate::compute::{aggregate, elementwise, selection};

/// Row labels of a column or frame.
pub type RowIndex = Arc<[i64]>;

/// The labels `0..len`.
pub fn default_index(len: usize) -> RowIndex {
    (0..len).map(|i| i as i64).collect()
}

/// Whether two indexes hold the same labels in the same order.
pub(crate) fn same_labels(left: &RowIndex, right: &RowIndex) -> bool {
    Arc::ptr_eq(left, right) || left[..] == right[..]
}

/// Reorder `values`, labelled by `from`, to the labels `to`. Labels missing
/// from `from` become nulls.
pub(crate) fn realign(values: &ArrayRef, from: &RowIndex, to: &RowIndex) -> TesseraResult<ArrayRef> {
    let mut slots: HashMap<i64, usize> = HashMap::with_capacity(from.len());
    for (pos, label) in from.iter().enumerate() {
        slots.entry(*label).or_insert(pos);
    }
    let rows = to
        .iter()
        .map(|label| {
            slots
                .get(label)
                .map(|pos| {
                    u32::try_from(*pos)
                        .map_err(|_| TesseraError::value_error("row position exceeds u32"))
                })
                .transpose()
        })
        .collect::<TesseraResult<Vec<Option<u32>>>>()?;
    selection::take_array(values, &UInt32Array::from(rows))
}

/// Labels kept by positional `rows`.
pub(crate) fn take_labels(index: &RowIndex, rows: &UInt32Array) -> RowIndex {
    rows.iter()
        .map(|row| row.and_then(|r| index.get(r as usize).copied()).unwrap_or(-1))
        .collect()
}

/// Labels where `mask` is true.
pub(crate) fn filter_labels(index: &RowIndex, mask: &ArrayRef) -> TesseraResult<RowIndex> {
    let mask = selection::broadcast(mask, index.len())?;
    let mask = selection::as_mask(&mask)?;
    Ok(index
        .iter()
        .enumerate()
        .filter(|(i, _)| mask.is_valid(*i) && mask.value(*i))
        .map(|(_, label)| *label)
        .collect())
}

/// Numpy storage has no missing integers: integer columns with nulls are
/// held as floats.
pub(crate) fn normalize(values: ArrayRef, storage: IndexedStorage) -> TesseraResult<ArrayRef> {
    if storage == IndexedStorage::Numpy
        && values.data_type().is_integer()
        && values.null_count() > 0
    {
        return Ok(cast(values.as_ref(), &DataType::Float64)?);
    }
    Ok(values)
}

/// A named column with row labels.
#[derive(Debug, Clone)]
pub struct IndexedSeries {
    name: String,
    values: ArrayRef,
    index: RowIndex,
    storage: IndexedStorage,
}

impl IndexedSeries {
    /// A column labelled `0..len`.
    pub fn new(
        name: impl Into<String>,
        values: ArrayRef,
        storage: IndexedStorage,
    ) -> TesseraResult<Self> {
        let index = default_index(values.len());
        Self::with_index(name, values, index, storage)
    }

    pub fn with_index(
        name: impl Into<String>,
        values: ArrayRef,
        index: RowIndex,
        storage: IndexedStorage,
    ) -> TesseraResult<Self> {
        if index.len() != values.len() {
            return Err(TesseraError::value_error(format!(
                "index of length {} does not match {} values",
                index.len(),
                values.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            values: normalize(values, storage)?,
            index,
            storage,
        })
    }

    pub fn values(&self) -> &ArrayRef {
        &self.values
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn storage(&self) -> IndexedStorage {
        self.storage
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> TesseraResult<Value> {
        value_at(self.values.as_ref(), i)
    }

    /// A copy labelled `0..len`.
    pub fn reset_index(&self) -> Self {
        Self {
            index: default_index(self.len()),
            ..self.clone()
        }
    }

    /// This column reordered to `index`.
    pub fn aligned_to(&self, index: &RowIndex) -> TesseraResult<Self> {
        if same_labels(&self.index, index) {
            return Ok(Self {
                index: Arc::clone(index),
                ..self.clone()
            });
        }
        let values = realign(&self.values, &self.index, index)?;
        Self::with_index(self.name.clone(), values, Arc::clone(index), self.storage)
    }

    fn with_values(&self, values: ArrayRef, index: RowIndex) -> TesseraResult<Self> {
        Self::with_index(self.name.clone(), values, index, self.storage)
    }

    /// `self`'s values reordered to `driver`'s labels when both are full
    /// length; one-value columns are left as they are.
    fn values_against(&self, driver: &Self) -> TesseraResult<ArrayRef> {
        if self.len() == driver.len() && !same_labels(&self.index, &driver.index) {
            return realign(&self.values, &self.index, &driver.index);
        }
        Ok(Arc::clone(&self.values))
    }

    /// Result index of an operation producing `len` rows.
    fn index_for(&self, len: usize, other: Option<&Self>) -> RowIndex {
        if len == self.len() {
            Arc::clone(&self.index)
        } else if let Some(other) = other.filter(|o| o.len() == len) {
            Arc::clone(&other.index)
        } else {
            default_index(len)
        }
    }
}

impl CompliantSeries<Indexed> for IndexedSeries {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn is_scalar(&self) -> bool {
        self.len() == 1
    }

    fn dtype(&self) -> TesseraResult<IndexedDtype> {
        Ok(IndexedDtype::of(&self.values, self.storage))
    }

    fn reconcile_series(&self, other: &Self) -> TesseraResult<Reconciled<Self>> {
        if other.len() == 1 {
            return Ok(Reconciled::Scalar(other.get(0)?));
        }
        if other.len() == self.len() && !same_labels(&self.index, &other.index) {
            return Ok(Reconciled::Column(other.aligned_to(&self.index)?));
        }
        Ok(Reconciled::Column(other.clone()))
    }

    fn binary(&self, op: BinaryOp, other: &Reconciled<Self>, reflected: bool) -> TesseraResult<Self> {
        let rhs = operand_array(other, |s| Arc::clone(&s.values), op.label())?;
        let values = apply_binary(op, &self.values, &rhs, reflected)?;
        let index = self.index_for(values.len(), other.series());
        self.with_values(values, index)
    }

    fn elementwise(&self, op: &Elementwise) -> TesseraResult<Self> {
        self.with_values(elementwise::apply(&self.values, op)?, Arc::clone(&self.index))
    }

    fn reduce(&self, func: AggFunc) -> TesseraResult<Reduced<Self>> {
        Ok(Reduced::Value(aggregate::reduce(func, &self.values)?))
    }

    fn from_scalar(value: Reduced<Self>, like: &Self) -> TesseraResult<Self> {
        match value {
            Reduced::Value(value) => Self::with_index(
                like.name.clone(),
                to_array(&value, None)?,
                Arc::from([0_i64]),
                like.storage,
            ),
            Reduced::Deferred(series) => Ok(series.rename(&like.name)),
        }
    }

    fn fill_null(&self, value: &Reconciled<Self>) -> TesseraResult<Self> {
        let fill = operand_array(value, |s| Arc::clone(&s.values), "fill_null")?;
        self.with_values(
            elementwise::fill_null(&self.values, &fill)?,
            Arc::clone(&self.index),
        )
    }

    fn filter(&self, mask: &Self) -> TesseraResult<Self> {
        let mask = match self.reconcile_series(mask)? {
            Reconciled::Column(aligned) => aligned.values,
            _ => Arc::clone(&mask.values),
        };
        let index = filter_labels(&self.index, &mask)?;
        self.with_values(selection::filter_array(&self.values, &mask)?, index)
    }

    fn zip_with(&self, mask: &Self, other: &Reconciled<Self>) -> TesseraResult<Self> {
        let driver = [Some(self), Some(mask), other.series()]
            .into_iter()
            .flatten()
            .find(|s| s.len() != 1)
            .unwrap_or(self);
        let otherwise = match other.series() {
            Some(series) => series.values_against(driver)?,
            None => operand_array(other, |s| Arc::clone(&s.values), "when")?,
        };
        let values = elementwise::when_then(
            &mask.values_against(driver)?,
            &self.values_against(driver)?,
            &otherwise,
        )?;
        let index = if values.len() == driver.len() {
            Arc::clone(&driver.index)
        } else {
            default_index(values.len())
        };
        self.with_values(values, index)
    }

    fn reshape(&self, op: Reshape) -> TesseraResult<Self> {
        match selection::reshape_positions(&self.values, op)? {
            Some(rows) => self.with_values(
                selection::take_array(&self.values, &rows)?,
                take_labels(&self.index, &rows),
            ),
            None => self.with_values(
                selection::reshape(&self.values, op)?,
                Arc::clone(&self.index),
            ),
        }
    }

    fn str_concat(&self, other: &Self, separator: &str) -> TesseraResult<Self> {
        let other = match self.reconcile_series(other)? {
            Reconciled::Column(aligned) => aligned.values,
            _ => Arc::clone(&other.values),
        };
        let values = elementwise::str_concat(&self.values, &other, separator)?;
        let index = self.index_for(values.len(), None);
        self.with_values(values, index)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{BooleanArray, Float64Array, Int64Array};
    use tessera_expr::compliant::Comparand;

    use super::*;

    fn labelled(values: &[i64], index: &[i64]) -> IndexedSeries {
        IndexedSeries::with_index(
            "a",
            Arc::new(Int64Array::from(values.to_vec())),
            index.iter().copied().collect(),
            IndexedStorage::Numpy,
        )
        .unwrap()
    }

    #[test]
    fn test_realigns_on_labels() {
        let left = labelled(&[1, 2, 3], &[0, 1, 2]);
        let right = labelled(&[30, 10, 20], &[2, 0, 1]);
        let Reconciled::Column(aligned) = left.reconcile(&Comparand::Series(right)).unwrap()
        else {
            panic!("full-length operands stay columns");
        };
        assert_eq!(aligned.index()[..], [0, 1, 2]);
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30]));
        assert_eq!(aligned.values().as_ref(), expected.as_ref());

        let sum = left
            .binary(BinaryOp::Add, &Reconciled::Column(aligned), false)
            .unwrap();
        assert_eq!(sum.get(2).unwrap(), Value::Int64(33));
    }

    #[test]
    fn test_missing_labels_become_nulls_and_floats() {
        let left = labelled(&[1, 2], &[0, 1]);
        let right = labelled(&[5, 6], &[1, 7]);
        let Reconciled::Column(aligned) = left.reconcile_series(&right).unwrap() else {
            panic!("expected a column");
        };
        let expected: ArrayRef = Arc::new(Float64Array::from(vec![None, Some(5.0)]));
        assert_eq!(aligned.values().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_filter_keeps_labels() {
        let s = labelled(&[1, 2, 3], &[10, 11, 12]);
        let mask = IndexedSeries::with_index(
            "m",
            Arc::new(BooleanArray::from(vec![true, false, true])),
            Arc::clone(s.index()),
            IndexedStorage::Numpy,
        )
        .unwrap();
        let out = s.filter(&mask).unwrap();
        assert_eq!(out.index()[..], [10, 12]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_zip_with_aligns_on_labels() {
        let s = labelled(&[1, 2, 3], &[0, 1, 2]);
        let mask = IndexedSeries::with_index(
            "m",
            Arc::new(BooleanArray::from(vec![true, false, false])),
            [2, 1, 0].into_iter().collect(),
            IndexedStorage::Numpy,
        )
        .unwrap();
        let out = s
            .zip_with(&mask, &Reconciled::Scalar(Value::Int64(0)))
            .unwrap();
        assert_eq!(out.index()[..], [0, 1, 2]);
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![0, 0, 3]));
        assert_eq!(out.values().as_ref(), expected.as_ref());

        let seven = labelled(&[7], &[0]);
        let other = labelled(&[60, 50, 40], &[0, 1, 2]);
        let out = seven
            .zip_with(&mask, &Reconciled::Column(other))
            .unwrap();
        assert_eq!(out.index()[..], [2, 1, 0]);
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![7, 50, 60]));
        assert_eq!(out.values().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_sort_moves_labels() {
        let s = labelled(&[3, 1, 2], &[0, 1, 2]);
        let out = s.reshape(Reshape::Sort { descending: false }).unwrap();
        assert_eq!(out.index()[..], [1, 2, 0]);
        let shifted = s.reshape(Reshape::Shift(1)).unwrap();
        assert_eq!(shifted.index()[..], [0, 1, 2]);
        assert_eq!(shifted.values().data_type(), &DataType::Float64);
    }

    #[test]
    fn test_nullable_storage_keeps_integers() {
        let values: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
        let s = IndexedSeries::new("a", values, IndexedStorage::Nullable).unwrap();
        assert_eq!(s.values().data_type(), &DataType::Int64);
        assert_eq!(s.dtype().unwrap().spelling, "Int64");
    }
}
