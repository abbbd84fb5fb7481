//! Deferred, partitioned frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use common_error::{TesseraError, TesseraResult};
use log::debug;
use tessera_core::{DType, Value};
use tessera_expr::compliant::{CompliantFrame, CompliantSeries, Reconciled};

use super::deferred::Deferred;
use super::dtypes::spelling_of;
use super::series::{conform, layout, partition_lengths, PartitionedSeries, Partitions};
use super::Partitioned;
use crate::columnar::dtypes::from_logical;
use crate::compute::aggregate::result_type;
use crate::compute::scalar::to_array;
use crate::compute::selection::{self, broadcast};
use crate::compute::{grouping, NativeAgg};
use crate::indexed::{IndexedFrame, IndexedOptions};

pub type Batches = Vec<RecordBatch>;

/// A deferred list of record batches sharing one schema.
#[derive(Debug, Clone)]
pub struct PartitionedFrame {
    schema: SchemaRef,
    parts: Deferred<Batches>,
    npartitions: usize,
}

fn schema_of(columns: &[(String, DataType)]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, dtype)| Field::new(name, dtype.clone(), true))
            .collect::<Vec<_>>(),
    ))
}

fn batch_rows(batches: &[RecordBatch]) -> Vec<usize> {
    batches.iter().map(RecordBatch::num_rows).collect()
}

/// The named columns of `series` laid out as `lengths`: full columns are
/// repartitioned, scalars broadcast into every partition.
fn assemble(
    series: &[(String, Partitions, bool, DataType)],
    lengths: &[usize],
) -> TesseraResult<Batches> {
    let mut columns: Vec<Vec<(String, ArrayRef)>> = vec![Vec::new(); lengths.len()];
    for (name, parts, scalar, meta) in series {
        let parts = match (scalar, parts.first()) {
            (true, Some(value)) => lengths
                .iter()
                .map(|len| broadcast(value, *len))
                .collect::<TesseraResult<Vec<_>>>()?,
            _ => conform(parts, lengths, meta)?,
        };
        for (slot, part) in columns.iter_mut().zip(parts) {
            slot.push((name.clone(), part));
        }
    }
    columns
        .into_iter()
        .zip(lengths)
        .map(|(cols, len)| selection::batch_of(cols, *len))
        .collect()
}

impl PartitionedFrame {
    /// Split `batch` into `npartitions` row partitions.
    pub fn new(batch: RecordBatch, npartitions: usize) -> TesseraResult<Self> {
        let npartitions = npartitions.max(1);
        let mut offset = 0;
        let parts = partition_lengths(batch.num_rows(), npartitions)
            .into_iter()
            .map(|len| {
                let part = batch.slice(offset, len);
                offset += len;
                part
            })
            .collect();
        Ok(Self {
            schema: batch.schema(),
            parts: Deferred::ready("from_batch", parts),
            npartitions,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn parts(&self) -> &Deferred<Batches> {
        &self.parts
    }

    pub fn npartitions(&self) -> usize {
        self.npartitions
    }

    fn derived(&self, schema: SchemaRef, parts: Deferred<Batches>) -> Self {
        Self {
            schema,
            parts,
            npartitions: self.npartitions,
        }
    }

    fn map_batches<F>(&self, label: &str, schema: SchemaRef, f: F) -> Self
    where
        F: Fn(&RecordBatch) -> TesseraResult<RecordBatch> + Send + Sync + 'static,
    {
        let parts = self
            .parts
            .map(label, move |batches: &Batches| batches.iter().map(&f).collect());
        self.derived(schema, parts)
    }

    fn meta_of(&self, name: &str) -> TesseraResult<DataType> {
        Ok(self
            .schema
            .field_with_name(name)
            .map_err(|_| TesseraError::column_not_found(name))?
            .data_type()
            .clone())
    }

    /// Build a frame from columns, deferring the partition assembly.
    fn from_columns(
        &self,
        label: &str,
        series: Vec<PartitionedSeries>,
        base: Option<&Self>,
    ) -> Self {
        let metas: Vec<(String, DataType)> = series
            .iter()
            .map(|s| (s.name().to_string(), s.meta().clone()))
            .collect();
        let schema = schema_of(&metas);
        let base = base.map(|frame| frame.parts.clone());
        let parts = Deferred::new(label, move || {
            let computed = series
                .iter()
                .map(|s| {
                    Ok((
                        s.name().to_string(),
                        s.parts().compute()?.clone(),
                        s.is_scalar(),
                        s.meta().clone(),
                    ))
                })
                .collect::<TesseraResult<Vec<_>>>()?;
            let lengths = match &base {
                Some(base) => batch_rows(base.compute()?),
                None => computed
                    .iter()
                    .find(|(_, _, scalar, _)| !scalar)
                    .map_or_else(|| vec![1], |(_, parts, _, _)| layout(parts)),
            };
            debug!(
                "assembling {} columns over {} partitions",
                computed.len(),
                lengths.len()
            );
            assemble(&computed, &lengths)
        });
        self.derived(schema, parts)
    }

    /// Compute every partition into one record batch.
    pub fn compute(&self) -> TesseraResult<RecordBatch> {
        let batches = self.parts.compute()?;
        if batches.is_empty() {
            let columns: Vec<(String, DataType)> = self
                .schema
                .fields()
                .iter()
                .map(|f| (f.name().clone(), f.data_type().clone()))
                .collect();
            return selection::empty_batch(&columns);
        }
        selection::vstack(batches)
    }

    /// Materialize into a row-labelled frame.
    pub fn collect(&self, options: IndexedOptions) -> TesseraResult<IndexedFrame> {
        IndexedFrame::new(self.compute()?, options)
    }
}

impl CompliantFrame<Partitioned> for PartitionedFrame {
    fn columns(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    fn column(&self, name: &str) -> TesseraResult<PartitionedSeries> {
        let meta = self.meta_of(name)?;
        let key = name.to_string();
        let parts = self.parts.map(format!("column {name}"), move |batches: &Batches| {
            batches.iter().map(|b| selection::column(b, &key)).collect()
        });
        Ok(PartitionedSeries::new(name, parts, meta, false))
    }

    fn dtype_of(&self, name: &str) -> TesseraResult<String> {
        Ok(spelling_of(&self.meta_of(name)?))
    }

    fn len_series(&self) -> TesseraResult<PartitionedSeries> {
        let parts = self.parts.map("len", |batches: &Batches| {
            let height: usize = batches.iter().map(RecordBatch::num_rows).sum();
            let height = i64::try_from(height)
                .map_err(|_| TesseraError::value_error("frame height exceeds i64"))?;
            Ok(vec![Arc::new(Int64Array::from(vec![height])) as ArrayRef])
        });
        Ok(PartitionedSeries::new("len", parts, DataType::Int64, true))
    }

    fn literal(&self, value: &Value, dtype: Option<&DType>) -> TesseraResult<PartitionedSeries> {
        let target = dtype.map(from_logical).transpose()?;
        Ok(PartitionedSeries::scalar("literal", to_array(value, target.as_ref())?))
    }

    fn from_series(&self, series: Vec<PartitionedSeries>) -> TesseraResult<Self> {
        Ok(self.from_columns("from_series", series, None))
    }

    fn with_series(&self, series: Vec<PartitionedSeries>) -> TesseraResult<Self> {
        let existing = self
            .columns()
            .iter()
            .map(|name| Ok((name.clone(), self.column(name)?)))
            .collect::<TesseraResult<Vec<_>>>()?;
        let mut merged: Vec<(String, PartitionedSeries)> = existing;
        for s in series {
            match merged.iter_mut().find(|(n, _)| n == s.name()) {
                Some(slot) => slot.1 = s,
                None => merged.push((s.name().to_string(), s)),
            }
        }
        let series = merged.into_iter().map(|(_, s)| s).collect();
        Ok(self.from_columns("with_series", series, Some(self)))
    }

    fn filter_mask(&self, mask: &PartitionedSeries) -> TesseraResult<Self> {
        let scalar = mask.is_scalar();
        let mask_meta = mask.meta().clone();
        if mask_meta != DataType::Boolean && mask_meta != DataType::Null {
            return Err(TesseraError::type_error(format!(
                "filter predicate must be boolean, got {mask_meta}"
            )));
        }
        let parts = self.parts.zip(mask.parts(), "filter", move |batches, masks| {
            let lengths = batch_rows(batches);
            let masks = match (scalar, masks.first()) {
                (true, Some(value)) => lengths
                    .iter()
                    .map(|len| broadcast(value, *len))
                    .collect::<TesseraResult<Vec<_>>>()?,
                _ => conform(masks, &lengths, &mask_meta)?,
            };
            batches
                .iter()
                .zip(&masks)
                .map(|(b, m)| selection::filter_batch(b, m))
                .collect()
        });
        Ok(self.derived(Arc::clone(&self.schema), parts))
    }

    fn reconcile_series(
        &self,
        series: &PartitionedSeries,
    ) -> TesseraResult<Reconciled<PartitionedSeries>> {
        if series.is_scalar() {
            return Ok(Reconciled::Broadcast(series.clone()));
        }
        Ok(Reconciled::Column(series.clone()))
    }

    fn group_and_aggregate(
        &self,
        keys: &[String],
        aggs: &[NativeAgg],
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        let mut metas = Vec::with_capacity(keys.len() + aggs.len());
        for key in keys {
            metas.push((key.clone(), self.meta_of(key)?));
        }
        for agg in aggs {
            let dtype = result_type(agg.func, &self.meta_of(&agg.input)?)?;
            metas.push((agg.output.clone(), dtype));
        }
        let schema = schema_of(&metas);
        let (keys, aggs) = (keys.to_vec(), aggs.to_vec());
        let parts = self.parts.map("group_by", move |batches: &Batches| {
            let whole = selection::vstack(batches)?;
            debug!("aggregating {} partitions by {:?}", batches.len(), keys);
            Ok(vec![grouping::aggregate(&whole, &keys, &aggs, drop_null_keys)?])
        });
        Ok(self.derived(schema, parts))
    }

    fn concat_horizontal(frames: &[Self]) -> TesseraResult<Self> {
        let Some(first) = frames.first() else {
            return Err(TesseraError::value_error("No items to concatenate"));
        };
        let series = frames
            .iter()
            .flat_map(|frame| frame.columns().into_iter().map(move |name| frame.column(&name)))
            .collect::<TesseraResult<Vec<_>>>()?;
        Ok(first.from_columns("concat_horizontal", series, Some(first)))
    }

    fn concat_vertical(frames: &[Self]) -> TesseraResult<Self> {
        let Some(first) = frames.first() else {
            return Err(TesseraError::value_error("No items to concatenate"));
        };
        let names = first.columns();
        let mut sorted = names.clone();
        sorted.sort();
        for frame in frames {
            let mut other = frame.columns();
            other.sort();
            if other != sorted {
                return Err(TesseraError::column_mismatch(format!(
                    "unable to vstack, column names don't match: {:?} vs {:?}",
                    names,
                    frame.columns()
                )));
            }
        }
        let inputs: Vec<Deferred<Batches>> = frames.iter().map(|f| f.parts.clone()).collect();
        let parts = Deferred::new("concat_vertical", move || {
            let mut out = Vec::new();
            for input in &inputs {
                for batch in input.compute()? {
                    out.push(selection::project_batch(batch, &names)?);
                }
            }
            Ok(out)
        });
        Ok(first.derived(Arc::clone(&first.schema), parts))
    }

    fn sort(&self, by: &[String], descending: &[bool]) -> TesseraResult<Self> {
        for name in by {
            self.meta_of(name)?;
        }
        let (by, descending) = (by.to_vec(), descending.to_vec());
        let npartitions = self.npartitions;
        let parts = self.parts.map("sort", move |batches: &Batches| {
            let sorted = selection::sort_batch(&selection::vstack(batches)?, &by, &descending)?;
            let mut offset = 0;
            Ok(partition_lengths(sorted.num_rows(), npartitions)
                .into_iter()
                .map(|len| {
                    let part = sorted.slice(offset, len);
                    offset += len;
                    part
                })
                .collect())
        });
        Ok(self.derived(Arc::clone(&self.schema), parts))
    }

    fn head(&self, n: usize) -> TesseraResult<Self> {
        let parts = self.parts.map("head", move |batches: &Batches| {
            let mut left = n;
            let mut out = Vec::new();
            for batch in batches {
                let take = left.min(batch.num_rows());
                out.push(batch.slice(0, take));
                left -= take;
                if left == 0 {
                    break;
                }
            }
            Ok(out)
        });
        Ok(self.derived(Arc::clone(&self.schema), parts))
    }

    fn rename(&self, mapping: &BTreeMap<String, String>) -> TesseraResult<Self> {
        let metas: Vec<(String, DataType)> = self
            .schema
            .fields()
            .iter()
            .map(|f| {
                let name = mapping.get(f.name()).unwrap_or(f.name());
                (name.clone(), f.data_type().clone())
            })
            .collect();
        if let Some(missing) = mapping.keys().find(|k| self.schema.field_with_name(k).is_err()) {
            return Err(TesseraError::column_not_found(missing.clone()));
        }
        let mapping = mapping.clone();
        Ok(self.map_batches("rename", schema_of(&metas), move |b| {
            selection::rename_batch(b, &mapping)
        }))
    }

    fn drop(&self, names: &[String]) -> TesseraResult<Self> {
        for name in names {
            self.meta_of(name)?;
        }
        let metas: Vec<(String, DataType)> = self
            .schema
            .fields()
            .iter()
            .filter(|f| !names.contains(f.name()))
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect();
        let names = names.to_vec();
        Ok(self.map_batches("drop", schema_of(&metas), move |b| {
            selection::drop_columns(b, &names)
        }))
    }

    fn to_batch(&self) -> TesseraResult<RecordBatch> {
        self.compute()
    }
}
