//! Row-labelled frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::compute::concat;
use arrow::record_batch::RecordBatch;
use common_config::{IndexedStorage, TesseraConfig};
use common_error::{TesseraError, TesseraResult};
use log::{debug, warn};
use tessera_core::{DType, Value};
use tessera_expr::compliant::{CompliantExpr, CompliantFrame, CompliantSeries, Reconciled};

use super::dtypes::IndexedDtype;
use super::series::{
    default_index, filter_labels, normalize, realign, same_labels, take_labels, IndexedSeries,
    RowIndex,
};
use super::Indexed;
use crate::columnar::dtypes::from_logical;
use crate::columnar::{assembled_height, frame_height_mismatch, merge_columns, named_columns};
use crate::compute::scalar::to_array;
use crate::compute::selection::{self, broadcast};
use crate::compute::{grouping, NativeAgg};

/// Options every frame of the row-labelled engine carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedOptions {
    pub storage: IndexedStorage,
    pub warn_on_complex_group_by: bool,
}

impl Default for IndexedOptions {
    fn default() -> Self {
        Self {
            storage: IndexedStorage::default(),
            warn_on_complex_group_by: true,
        }
    }
}

impl IndexedOptions {
    pub fn from_config(config: &TesseraConfig) -> Self {
        Self {
            storage: config.backends.indexed.storage,
            warn_on_complex_group_by: config.evaluation.warn_on_complex_group_by,
        }
    }
}

/// A record batch plus row labels.
#[derive(Debug, Clone)]
pub struct IndexedFrame {
    batch: RecordBatch,
    index: RowIndex,
    options: IndexedOptions,
}

impl IndexedFrame {
    /// A frame labelled `0..height`; columns are stored the way `options`
    /// asks.
    pub fn new(batch: RecordBatch, options: IndexedOptions) -> TesseraResult<Self> {
        let index = default_index(batch.num_rows());
        Self::with_index(batch, index, options)
    }

    fn with_index(batch: RecordBatch, index: RowIndex, options: IndexedOptions) -> TesseraResult<Self> {
        let height = batch.num_rows();
        let columns = named_columns(&batch)
            .into_iter()
            .map(|(name, array)| Ok((name, normalize(array, options.storage)?)))
            .collect::<TesseraResult<Vec<_>>>()?;
        Ok(Self {
            batch: selection::batch_of(columns, height)?,
            index,
            options,
        })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn options(&self) -> IndexedOptions {
        self.options
    }

    pub fn height(&self) -> usize {
        self.batch.num_rows()
    }

    fn rebuild(&self, batch: RecordBatch, index: RowIndex) -> TesseraResult<Self> {
        Self::with_index(batch, index, self.options)
    }

    /// Rows of `rows` as a frame of their own, labels kept.
    fn take(&self, rows: &[usize]) -> TesseraResult<Self> {
        let rows = selection::positions(rows.iter().copied())?;
        self.rebuild(
            selection::take_batch(&self.batch, &rows)?,
            take_labels(&self.index, &rows),
        )
    }
}

fn single_value(series: &IndexedSeries, expr: &str) -> TesseraResult<ArrayRef> {
    if series.len() != 1 {
        return Err(TesseraError::InvalidAggregation(format!(
            "`{expr}` produced {} values for one group; aggregations must return a scalar",
            series.len()
        )));
    }
    Ok(Arc::clone(series.values()))
}

impl CompliantFrame<Indexed> for IndexedFrame {
    fn columns(&self) -> Vec<String> {
        selection::column_names(&self.batch)
    }

    fn column(&self, name: &str) -> TesseraResult<IndexedSeries> {
        IndexedSeries::with_index(
            name,
            selection::column(&self.batch, name)?,
            Arc::clone(&self.index),
            self.options.storage,
        )
    }

    fn dtype_of(&self, name: &str) -> TesseraResult<IndexedDtype> {
        self.column(name)?.dtype()
    }

    fn len_series(&self) -> TesseraResult<IndexedSeries> {
        let height = i64::try_from(self.height())
            .map_err(|_| TesseraError::value_error("frame height exceeds i64"))?;
        IndexedSeries::with_index(
            "len",
            Arc::new(Int64Array::from(vec![height])),
            Arc::from([0_i64]),
            self.options.storage,
        )
    }

    fn literal(&self, value: &Value, dtype: Option<&DType>) -> TesseraResult<IndexedSeries> {
        let target = dtype.map(from_logical).transpose()?;
        IndexedSeries::with_index(
            "literal",
            to_array(value, target.as_ref())?,
            Arc::from([0_i64]),
            self.options.storage,
        )
    }

    fn from_series(&self, series: Vec<IndexedSeries>) -> TesseraResult<Self> {
        let height = assembled_height(series.iter().map(IndexedSeries::len));
        let index = series
            .iter()
            .find(|s| s.len() == height && height != 1)
            .map_or_else(|| default_index(height), |s| Arc::clone(s.index()));
        let mut columns = Vec::with_capacity(series.len());
        for s in series {
            let values = match s.len() {
                n if n == height && height != 1 => Arc::clone(s.aligned_to(&index)?.values()),
                1 => broadcast(s.values(), height)?,
                n => return Err(frame_height_mismatch(n, height)),
            };
            columns.push((s.name().to_string(), values));
        }
        self.rebuild(selection::batch_of(columns, height)?, index)
    }

    fn with_series(&self, series: Vec<IndexedSeries>) -> TesseraResult<Self> {
        let height = self.height();
        let mut new = Vec::with_capacity(series.len());
        for s in series {
            let values = match self.reconcile_series(&s)? {
                Reconciled::Column(aligned) => Arc::clone(aligned.values()),
                _ => broadcast(s.values(), height)?,
            };
            new.push((s.name().to_string(), values));
        }
        let columns = merge_columns(named_columns(&self.batch), new);
        self.rebuild(selection::batch_of(columns, height)?, Arc::clone(&self.index))
    }

    fn filter_mask(&self, mask: &IndexedSeries) -> TesseraResult<Self> {
        let mask = match self.reconcile_series(mask)? {
            Reconciled::Column(aligned) => Arc::clone(aligned.values()),
            _ => Arc::clone(mask.values()),
        };
        let index = filter_labels(&self.index, &mask)?;
        self.rebuild(selection::filter_batch(&self.batch, &mask)?, index)
    }

    fn reconcile_series(&self, series: &IndexedSeries) -> TesseraResult<Reconciled<IndexedSeries>> {
        match series.len() {
            1 if self.height() != 1 => Ok(Reconciled::Scalar(series.get(0)?)),
            n if n == self.height() => Ok(Reconciled::Column(series.aligned_to(&self.index)?)),
            n => Err(frame_height_mismatch(n, self.height())),
        }
    }

    fn group_and_aggregate(
        &self,
        keys: &[String],
        aggs: &[NativeAgg],
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        let batch = grouping::aggregate(&self.batch, keys, aggs, drop_null_keys)?;
        let index = default_index(batch.num_rows());
        self.rebuild(batch, index)
    }

    fn group_and_evaluate(
        &self,
        keys: &[String],
        exprs: &[CompliantExpr<Indexed>],
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        if self.options.warn_on_complex_group_by {
            warn!(
                "Found complex group-by expression, which can't be expressed efficiently with \
                 the row-labelled engine's native group-by; falling back to evaluating each \
                 group separately"
            );
        }
        let groups = grouping::group_rows(&self.batch, keys, drop_null_keys)?;
        debug!("evaluating {} expressions over {} groups", exprs.len(), groups.len());

        let firsts = selection::positions(groups.iter().filter_map(|rows| rows.first().copied()))?;
        let mut columns: Vec<(String, ArrayRef)> = keys
            .iter()
            .map(|key| {
                let keys = selection::column(&self.batch, key)?;
                Ok((key.clone(), selection::take_array(&keys, &firsts)?))
            })
            .collect::<TesseraResult<_>>()?;

        if groups.is_empty() {
            let empty = self.take(&[])?;
            for expr in exprs {
                for series in expr.evaluate(&empty)? {
                    columns.push((series.name().to_string(), series.values().slice(0, 0)));
                }
            }
        } else {
            let mut outputs: Vec<(String, Vec<ArrayRef>)> = Vec::new();
            for (g, rows) in groups.iter().enumerate() {
                let group = self.take(rows)?;
                let mut slot = 0;
                for expr in exprs {
                    for series in expr.evaluate(&group)? {
                        let value = single_value(&series, expr.function_name())?;
                        if g == 0 {
                            let parts = Vec::with_capacity(groups.len());
                            outputs.push((series.name().to_string(), parts));
                        }
                        match outputs.get_mut(slot) {
                            Some((_, parts)) => parts.push(value),
                            None => {
                                return Err(TesseraError::consistency(
                                    "groups produced different numbers of outputs",
                                ))
                            }
                        }
                        slot += 1;
                    }
                }
            }
            for (name, parts) in outputs {
                let parts: Vec<&dyn Array> = parts.iter().map(AsRef::as_ref).collect();
                columns.push((name, concat(&parts)?));
            }
        }
        let height = groups.len();
        self.rebuild(selection::batch_of(columns, height)?, default_index(height))
    }

    fn concat_horizontal(frames: &[Self]) -> TesseraResult<Self> {
        let Some(first) = frames.first() else {
            return Err(TesseraError::value_error("No items to concatenate"));
        };
        let mut batches = Vec::with_capacity(frames.len());
        for frame in frames {
            if frame.height() == first.height() && !same_labels(&frame.index, &first.index) {
                let columns = named_columns(&frame.batch)
                    .into_iter()
                    .map(|(name, array)| {
                        Ok((name, realign(&array, &frame.index, &first.index)?))
                    })
                    .collect::<TesseraResult<Vec<_>>>()?;
                batches.push(selection::batch_of(columns, first.height())?);
            } else {
                batches.push(frame.batch.clone());
            }
        }
        first.rebuild(selection::hstack(&batches)?, Arc::clone(&first.index))
    }

    fn concat_vertical(frames: &[Self]) -> TesseraResult<Self> {
        let Some(first) = frames.first() else {
            return Err(TesseraError::value_error("No items to concatenate"));
        };
        let batches: Vec<RecordBatch> = frames.iter().map(|f| f.batch.clone()).collect();
        let batch = selection::vstack(&batches)?;
        let index = default_index(batch.num_rows());
        first.rebuild(batch, index)
    }

    fn sort(&self, by: &[String], descending: &[bool]) -> TesseraResult<Self> {
        let rows = selection::sort_indices(&self.batch, by, descending)?;
        self.rebuild(
            selection::take_batch(&self.batch, &rows)?,
            take_labels(&self.index, &rows),
        )
    }

    fn head(&self, n: usize) -> TesseraResult<Self> {
        let batch = selection::head_batch(&self.batch, n);
        let index = self.index[..batch.num_rows()].iter().copied().collect();
        self.rebuild(batch, index)
    }

    fn rename(&self, mapping: &BTreeMap<String, String>) -> TesseraResult<Self> {
        self.rebuild(
            selection::rename_batch(&self.batch, mapping)?,
            Arc::clone(&self.index),
        )
    }

    fn drop(&self, names: &[String]) -> TesseraResult<Self> {
        self.rebuild(
            selection::drop_columns(&self.batch, names)?,
            Arc::clone(&self.index),
        )
    }

    fn to_batch(&self) -> TesseraResult<RecordBatch> {
        Ok(self.batch.clone())
    }
}
