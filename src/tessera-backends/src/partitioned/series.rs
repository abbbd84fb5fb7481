//! Deferred, partitioned column.
//!
//! A column is a deferred list of Arrow arrays, one per row partition, plus
//! its `meta`: the Arrow type every partition will have. The meta is found
//! by running each operation on empty input, so type errors surface when
//! the graph is built, and data errors when it is computed.

use std::sync::Arc;

use arrow::array::{new_empty_array, Array, ArrayRef};
use arrow::compute::{cast, concat};
use arrow::datatypes::DataType;
use common_error::{TesseraError, TesseraResult};
use tessera_expr::compliant::{CompliantSeries, Reconciled, Reduced};
use tessera_expr::expr::{AggFunc, BinaryOp, Elementwise, Reshape};

use super::deferred::Deferred;
use super::dtypes::spelling_of;
use super::Partitioned;
use crate::columnar::{apply_binary, frame_height_mismatch};
use crate::compute::scalar::to_array;
use crate::compute::{aggregate, arithmetic, elementwise, selection};

pub type Partitions = Vec<ArrayRef>;

/// Row counts of each partition.
pub(crate) fn layout(parts: &[ArrayRef]) -> Vec<usize> {
    parts.iter().map(|p| p.len()).collect()
}

/// All partitions as one array.
pub(crate) fn concat_parts(parts: &[ArrayRef], meta: &DataType) -> TesseraResult<ArrayRef> {
    match parts {
        [] => Ok(new_empty_array(meta)),
        [only] => Ok(Arc::clone(only)),
        many => {
            let refs: Vec<&dyn Array> = many.iter().map(AsRef::as_ref).collect();
            Ok(concat(&refs)?)
        }
    }
}

/// Cut `array` into partitions of `lengths`.
pub(crate) fn split(array: &ArrayRef, lengths: &[usize]) -> TesseraResult<Partitions> {
    let total: usize = lengths.iter().sum();
    if total != array.len() {
        return Err(frame_height_mismatch(array.len(), total));
    }
    let mut offset = 0;
    Ok(lengths
        .iter()
        .map(|len| {
            let part = array.slice(offset, *len);
            offset += len;
            part
        })
        .collect())
}

/// `parts` repartitioned to `lengths`.
pub(crate) fn conform(
    parts: &[ArrayRef],
    lengths: &[usize],
    meta: &DataType,
) -> TesseraResult<Partitions> {
    if layout(parts) == lengths {
        return Ok(parts.to_vec());
    }
    split(&concat_parts(parts, meta)?, lengths)
}

fn with_type(array: ArrayRef, meta: &DataType) -> TesseraResult<ArrayRef> {
    if array.data_type() == meta {
        return Ok(array);
    }
    Ok(cast(array.as_ref(), meta)?)
}

/// Combine two partitioned operands partition by partition. A scalar side
/// (one partition of one row) is broadcast against every partition of the
/// other side.
pub(crate) fn zip_parts<F>(
    left: &[ArrayRef],
    left_scalar: bool,
    right: &[ArrayRef],
    right_scalar: bool,
    right_meta: &DataType,
    f: F,
) -> TesseraResult<Partitions>
where
    F: Fn(&ArrayRef, &ArrayRef) -> TesseraResult<ArrayRef>,
{
    match (left_scalar, right_scalar, left.first(), right.first()) {
        (_, true, _, Some(r)) => left.iter().map(|l| f(l, r)).collect(),
        (true, false, Some(l), _) => right.iter().map(|r| f(l, r)).collect(),
        _ => {
            let right = conform(right, &layout(left), right_meta)?;
            left.iter().zip(&right).map(|(l, r)| f(l, r)).collect()
        }
    }
}

/// One operand of a partition-wise combination: its partitions, whether it
/// is a broadcast scalar, and its type.
type Side<'a> = (&'a [ArrayRef], bool, &'a DataType);

/// `sides` cut to the layout of the first non-scalar side; scalar sides
/// repeat their single value for every partition.
fn conform_all(sides: &[Side<'_>]) -> TesseraResult<Vec<Partitions>> {
    let lengths = sides
        .iter()
        .find(|(_, scalar, _)| !scalar)
        .map_or_else(|| vec![1], |(parts, _, _)| layout(parts));
    sides
        .iter()
        .map(|(parts, scalar, meta)| {
            if *scalar {
                let value = parts
                    .first()
                    .ok_or_else(|| TesseraError::internal("scalar column without a partition"))?;
                Ok(vec![Arc::clone(value); lengths.len()])
            } else {
                conform(parts, &lengths, meta)
            }
        })
        .collect()
}

/// Partition boundaries for `height` rows in `npartitions` partitions.
pub(crate) fn partition_lengths(height: usize, npartitions: usize) -> Vec<usize> {
    if height == 0 {
        return vec![0];
    }
    let size = height.div_ceil(npartitions.max(1));
    let mut lengths = Vec::new();
    let mut left = height;
    while left > 0 {
        let len = size.min(left);
        lengths.push(len);
        left -= len;
    }
    lengths
}

/// A named deferred column.
#[derive(Debug, Clone)]
pub struct PartitionedSeries {
    name: String,
    parts: Deferred<Partitions>,
    meta: DataType,
    scalar: bool,
}

impl PartitionedSeries {
    pub fn new(
        name: impl Into<String>,
        parts: Deferred<Partitions>,
        meta: DataType,
        scalar: bool,
    ) -> Self {
        Self {
            name: name.into(),
            parts,
            meta,
            scalar,
        }
    }

    /// An in-memory array split into `npartitions` partitions.
    pub fn from_array(
        name: impl Into<String>,
        array: ArrayRef,
        npartitions: usize,
    ) -> TesseraResult<Self> {
        let meta = array.data_type().clone();
        let parts = split(&array, &partition_lengths(array.len(), npartitions))?;
        Ok(Self::new(name, Deferred::ready("from_array", parts), meta, false))
    }

    /// A one-row column broadcast against whatever it meets.
    pub fn scalar(name: impl Into<String>, array: ArrayRef) -> Self {
        let meta = array.data_type().clone();
        Self::new(name, Deferred::ready("scalar", vec![array]), meta, true)
    }

    pub fn parts(&self) -> &Deferred<Partitions> {
        &self.parts
    }

    pub fn meta(&self) -> &DataType {
        &self.meta
    }

    /// Compute the graph and return the whole column.
    pub fn compute(&self) -> TesseraResult<ArrayRef> {
        concat_parts(self.parts.compute()?, &self.meta)
    }

    fn empty(&self) -> ArrayRef {
        new_empty_array(&self.meta)
    }

    fn derived(&self, parts: Deferred<Partitions>, meta: DataType, scalar: bool) -> Self {
        Self::new(self.name.clone(), parts, meta, scalar)
    }

    /// Partition-wise combination with another operand.
    fn combine<F>(
        &self,
        label: &str,
        other: &Self,
        meta: Option<DataType>,
        f: F,
    ) -> TesseraResult<Self>
    where
        F: Fn(&ArrayRef, &ArrayRef) -> TesseraResult<ArrayRef> + Send + Sync + 'static,
    {
        let meta = match meta {
            Some(meta) => meta,
            None => f(&self.empty(), &other.empty())?.data_type().clone(),
        };
        let (left_scalar, right_scalar) = (self.scalar, other.scalar);
        let right_meta = other.meta.clone();
        let out_meta = meta.clone();
        let parts = self.parts.zip(&other.parts, label, move |left, right| {
            zip_parts(left, left_scalar, right, right_scalar, &right_meta, |l, r| {
                with_type(f(l, r)?, &out_meta)
            })
        });
        Ok(self.derived(parts, meta, left_scalar && right_scalar))
    }

    /// Apply `f` partition by partition.
    fn map_parts<F>(&self, label: &str, f: F) -> TesseraResult<Self>
    where
        F: Fn(&ArrayRef) -> TesseraResult<ArrayRef> + Send + Sync + 'static,
    {
        let meta = f(&self.empty())?.data_type().clone();
        let out_meta = meta.clone();
        let parts = self.parts.map(label, move |parts: &Partitions| {
            parts
                .iter()
                .map(|p| with_type(f(p)?, &out_meta))
                .collect()
        });
        Ok(self.derived(parts, meta, self.scalar))
    }

    /// Apply `f` to the whole column at once. With `keep_layout` the result
    /// is cut back to the input's partitions; otherwise it is one partition.
    fn map_whole<F>(&self, label: &str, keep_layout: bool, f: F) -> TesseraResult<Self>
    where
        F: Fn(&ArrayRef) -> TesseraResult<ArrayRef> + Send + Sync + 'static,
    {
        let meta = f(&self.empty())?.data_type().clone();
        let in_meta = self.meta.clone();
        let out_meta = meta.clone();
        let parts = self.parts.map(label, move |parts: &Partitions| {
            let whole = with_type(f(&concat_parts(parts, &in_meta)?)?, &out_meta)?;
            if keep_layout {
                split(&whole, &layout(parts))
            } else {
                Ok(vec![whole])
            }
        });
        Ok(self.derived(parts, meta, self.scalar && keep_layout))
    }

    fn operand(&self, other: &Reconciled<Self>, what: &str) -> TesseraResult<Self> {
        match other {
            Reconciled::Scalar(value) => {
                Ok(Self::scalar(self.name.clone(), to_array(value, None)?))
            }
            Reconciled::Broadcast(series) | Reconciled::Column(series) => Ok(series.clone()),
            Reconciled::Unsupported => Err(TesseraError::type_error(format!(
                "unsupported operand for `{what}`"
            ))),
        }
    }
}

impl CompliantSeries<Partitioned> for PartitionedSeries {
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
        None
    }

    fn is_scalar(&self) -> bool {
        self.scalar
    }

    fn dtype(&self) -> TesseraResult<String> {
        Ok(spelling_of(&self.meta))
    }

    fn reconcile_series(&self, other: &Self) -> TesseraResult<Reconciled<Self>> {
        if other.scalar {
            return Ok(Reconciled::Broadcast(other.clone()));
        }
        Ok(Reconciled::Column(other.clone()))
    }

    fn binary(&self, op: BinaryOp, other: &Reconciled<Self>, reflected: bool) -> TesseraResult<Self> {
        let rhs = self.operand(other, op.label())?;
        self.combine(op.label(), &rhs, None, move |l, r| {
            apply_binary(op, l, r, reflected)
        })
    }

    fn elementwise(&self, op: &Elementwise) -> TesseraResult<Self> {
        let label = op.label();
        let op = op.clone();
        if op.needs_whole_column() {
            self.map_whole(label, true, move |a| elementwise::apply(a, &op))
        } else {
            self.map_parts(label, move |a| elementwise::apply(a, &op))
        }
    }

    fn reduce(&self, func: AggFunc) -> TesseraResult<Reduced<Self>> {
        let meta = aggregate::result_type(func, &self.meta)?;
        let in_meta = self.meta.clone();
        let out_meta = meta.clone();
        let parts = self.parts.map(func.name(), move |parts: &Partitions| {
            let value = aggregate::reduce(func, &concat_parts(parts, &in_meta)?)?;
            Ok(vec![to_array(&value, Some(&out_meta))?])
        });
        Ok(Reduced::Deferred(self.derived(parts, meta, true)))
    }

    fn from_scalar(value: Reduced<Self>, like: &Self) -> TesseraResult<Self> {
        match value {
            Reduced::Deferred(series) => Ok(series.rename(&like.name)),
            Reduced::Value(value) => Ok(Self::scalar(like.name.clone(), to_array(&value, None)?)),
        }
    }

    fn fill_null(&self, value: &Reconciled<Self>) -> TesseraResult<Self> {
        let fill = self.operand(value, "fill_null")?;
        let meta = arithmetic::supertype(&self.meta, &fill.meta)
            .unwrap_or_else(|| self.meta.clone());
        self.combine("fill_null", &fill, Some(meta), elementwise::fill_null)
    }

    fn filter(&self, mask: &Self) -> TesseraResult<Self> {
        let meta = self.meta.clone();
        let mut out = self.combine("filter", mask, Some(meta), selection::filter_array)?;
        out.scalar = false;
        Ok(out)
    }

    fn zip_with(&self, mask: &Self, other: &Reconciled<Self>) -> TesseraResult<Self> {
        let other = self.operand(other, "when")?;
        let meta = elementwise::when_then(&mask.empty(), &self.empty(), &other.empty())?
            .data_type()
            .clone();
        let scalar = mask.scalar && self.scalar && other.scalar;
        let flags = (mask.scalar, self.scalar, other.scalar);
        let metas = (mask.meta.clone(), self.meta.clone(), other.meta.clone());
        let out_meta = meta.clone();
        let branches = self
            .parts
            .zip(&other.parts, "when", |t: &Partitions, f: &Partitions| {
                Ok((t.clone(), f.clone()))
            });
        let parts = mask.parts.zip(
            &branches,
            "when",
            move |masks: &Partitions, (truthy, falsy): &(Partitions, Partitions)| {
                let sides = conform_all(&[
                    (&masks[..], flags.0, &metas.0),
                    (&truthy[..], flags.1, &metas.1),
                    (&falsy[..], flags.2, &metas.2),
                ])?;
                sides[0]
                    .iter()
                    .zip(&sides[1])
                    .zip(&sides[2])
                    .map(|((m, t), f)| with_type(elementwise::when_then(m, t, f)?, &out_meta))
                    .collect()
            },
        );
        Ok(self.derived(parts, meta, scalar))
    }

    fn reshape(&self, op: Reshape) -> TesseraResult<Self> {
        let keep_layout = matches!(op, Reshape::Shift(_));
        self.map_whole(op.label(), keep_layout, move |a| selection::reshape(a, op))
    }

    fn str_concat(&self, other: &Self, separator: &str) -> TesseraResult<Self> {
        let separator = separator.to_string();
        self.combine("str_concat", other, Some(DataType::Utf8), move |l, r| {
            elementwise::str_concat(l, r, &separator)
        })
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{BooleanArray, Float64Array, Int64Array};
    use tessera_core::Value;

    use super::*;

    fn ints(values: &[i64]) -> PartitionedSeries {
        PartitionedSeries::from_array("a", Arc::new(Int64Array::from(values.to_vec())), 2).unwrap()
    }

    #[test]
    fn test_partition_lengths() {
        assert_eq!(partition_lengths(5, 2), vec![3, 2]);
        assert_eq!(partition_lengths(1, 4), vec![1]);
        assert_eq!(partition_lengths(0, 3), vec![0]);
    }

    #[test]
    fn test_operations_are_deferred() {
        let a = ints(&[0, 1, 2]);
        let gt = a
            .binary(BinaryOp::Gt, &Reconciled::Scalar(Value::Int64(1)), false)
            .unwrap();
        assert!(!gt.parts().is_computed());
        assert_eq!(gt.meta(), &DataType::Boolean);
        let expected: ArrayRef = Arc::new(BooleanArray::from(vec![false, false, true]));
        assert_eq!(gt.compute().unwrap().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_type_errors_surface_when_building() {
        let a = ints(&[1]);
        let s = PartitionedSeries::scalar("s", to_array(&Value::from("x"), None).unwrap());
        assert!(a
            .binary(BinaryOp::Sub, &Reconciled::Broadcast(s), false)
            .is_err());
    }

    #[test]
    fn test_reductions_stay_deferred_and_broadcast() {
        let a = ints(&[1, 2, 3, 4]);
        let Reduced::Deferred(mean) = a.reduce(AggFunc::Mean).unwrap() else {
            panic!("partitioned reductions are deferred");
        };
        assert!(mean.is_scalar());
        let centered = a
            .binary(BinaryOp::Sub, &a.reconcile_series(&mean).unwrap(), false)
            .unwrap();
        let expected: ArrayRef = Arc::new(Float64Array::from(vec![-1.5, -0.5, 0.5, 1.5]));
        assert_eq!(centered.compute().unwrap().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_cum_sum_carries_across_partitions() {
        let a = ints(&[1, 2, 3, 4, 5]);
        let out = a.elementwise(&Elementwise::CumSum).unwrap();
        assert_eq!(layout(out.parts().compute().unwrap()), vec![3, 2]);
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![1, 3, 6, 10, 15]));
        assert_eq!(out.compute().unwrap().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_distinct_flags_see_the_whole_column() {
        let a = ints(&[1, 2, 1, 3]);
        let out = a.elementwise(&Elementwise::IsFirstDistinct).unwrap();
        assert_eq!(layout(out.parts().compute().unwrap()), vec![2, 2]);
        let expected: ArrayRef = Arc::new(BooleanArray::from(vec![true, true, false, true]));
        assert_eq!(out.compute().unwrap().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_zip_with_follows_the_column_layout() {
        let a = ints(&[1, 2, 3, 4, 5]);
        let mask = a
            .binary(BinaryOp::Gt, &Reconciled::Scalar(Value::Int64(2)), false)
            .unwrap();
        let out = a
            .zip_with(&mask, &Reconciled::Scalar(Value::Float64(0.5)))
            .unwrap();
        assert!(!out.parts().is_computed());
        assert_eq!(out.meta(), &DataType::Float64);
        let expected: ArrayRef = Arc::new(Float64Array::from(vec![0.5, 0.5, 3.0, 4.0, 5.0]));
        assert_eq!(out.compute().unwrap().as_ref(), expected.as_ref());

        let ten = PartitionedSeries::scalar("ten", to_array(&Value::Int64(10), None).unwrap());
        let other = PartitionedSeries::from_array(
            "b",
            Arc::new(Int64Array::from(vec![6, 7, 8, 9, 0])),
            3,
        )
        .unwrap();
        let out = ten.zip_with(&mask, &Reconciled::Column(other)).unwrap();
        assert!(!out.is_scalar());
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![6, 7, 10, 10, 10]));
        assert_eq!(out.compute().unwrap().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_fill_null_keeps_partitions_consistent() {
        let values: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(4)]));
        let a = PartitionedSeries::from_array("a", values, 2).unwrap();
        let out = a.fill_null(&Reconciled::Scalar(Value::Float64(0.5))).unwrap();
        assert_eq!(out.meta(), &DataType::Float64);
        let expected: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 0.5, 4.0]));
        assert_eq!(out.compute().unwrap().as_ref(), expected.as_ref());
    }
}
