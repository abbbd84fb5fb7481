//! The interface record every backend implements.
//!
//! A backend is a zero-sized marker type implementing [`Backend`]; its
//! associated `Frame` and `Series` types implement [`CompliantFrame`] and
//! [`CompliantSeries`]. The generic machinery in this crate (expression
//! nodes, parsing, the namespace, group-by classification) only ever talks
//! to a backend through these three traits.

use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use common_config::BackendKind;
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, Value};

use super::comparand::{Comparand, Reconciled, Reduced};
use super::node::CompliantExpr;
use crate::expr::{AggFunc, BinaryOp, Elementwise, Reshape};

/// How a backend deals with group-by aggregations that are not a single
/// reduction of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    /// Only `col(..).<reduction>()` is supported; anything else raises.
    SimpleOnly,
    /// Complex aggregations are evaluated group by group.
    PerGroupEvaluation,
    /// Complex aggregations are compiled to native expressions and handed
    /// to the engine, which validates them.
    NativeExpressions,
}

/// A dataframe engine reachable through the compliant layer.
pub trait Backend: Sized + Send + Sync + 'static {
    /// Native frame.
    type Frame: CompliantFrame<Self>;
    /// Native column.
    type Series: CompliantSeries<Self>;
    /// Native dtype descriptor.
    type Dtype: Clone + Debug + Display + PartialEq + Send + Sync;
    /// Extra information the write path of the dtype table needs.
    type DtypeContext: Clone + Debug + Default;
    /// One native aggregation of a group-by.
    type AggExpr: Clone + Debug + Send + Sync;

    const KIND: BackendKind;

    /// Neutral aggregation names whose native spelling differs.
    const AGGREGATION_NAMES: &'static [(&'static str, &'static str)];

    const AGGREGATION_STRATEGY: AggregationStrategy;

    /// Read path of the dtype table. Never fails; unmapped types are
    /// [`DType::Unknown`].
    fn to_logical(native: &Self::Dtype) -> DType;

    /// Write path of the dtype table.
    fn from_logical(dtype: &DType, context: &Self::DtypeContext) -> TesseraResult<Self::Dtype>;

    /// Native name of a neutral aggregation, `None` if `neutral` is not an
    /// aggregation at all.
    fn native_aggregation(neutral: &str) -> Option<&'static str> {
        if let Some((_, native)) = Self::AGGREGATION_NAMES.iter().find(|(n, _)| *n == neutral) {
            return Some(*native);
        }
        AggFunc::ALL
            .iter()
            .map(AggFunc::name)
            .find(|name| *name == neutral)
    }

    /// Build the native aggregation of column `input` into `output`.
    fn aggregation(func: AggFunc, input: &str, output: &str) -> TesseraResult<Self::AggExpr>;

    /// Build a native aggregation from an already-compiled series; only
    /// backends with [`AggregationStrategy::NativeExpressions`] support it.
    fn aggregation_from_series(series: Self::Series, output: &str) -> TesseraResult<Self::AggExpr> {
        let _ = series;
        Err(TesseraError::not_implemented(format!(
            "complex aggregation `{output}` on the {} backend",
            Self::KIND
        )))
    }

    /// Wrap an Arrow array as a native series.
    fn series_from_array(name: &str, array: ArrayRef) -> TesseraResult<Self::Series>;
}

/// A native column.
pub trait CompliantSeries<B: Backend<Series = Self>>:
    Clone + Debug + Send + Sync + Sized + 'static
{
    fn name(&self) -> &str;

    /// A copy of this series under another name.
    #[must_use]
    fn rename(&self, name: &str) -> Self;

    /// Number of rows, when it is known without computing anything.
    fn len_hint(&self) -> Option<usize>;

    /// Whether this series is known to hold a single broadcastable value.
    fn is_scalar(&self) -> bool;

    fn dtype(&self) -> TesseraResult<B::Dtype>;

    /// Validate and convert a right-hand operand for a binary operation
    /// against `self`.
    fn reconcile(&self, other: &Comparand<B>) -> TesseraResult<Reconciled<Self>> {
        match other {
            Comparand::Frame(_) => Ok(Reconciled::Unsupported),
            Comparand::Scalar(value) => Ok(Reconciled::Scalar(value.clone())),
            Comparand::Series(series) => self.reconcile_series(series),
            Comparand::Exprs(_) => self.reconcile_series(other.single_output()?),
        }
    }

    /// Broadcast or realign a single native series against `self`.
    fn reconcile_series(&self, other: &Self) -> TesseraResult<Reconciled<Self>>;

    /// Apply `op` with `self` on the left, or on the right when `reflected`.
    fn binary(&self, op: BinaryOp, other: &Reconciled<Self>, reflected: bool)
        -> TesseraResult<Self>;

    fn elementwise(&self, op: &Elementwise) -> TesseraResult<Self>;

    fn reduce(&self, func: AggFunc) -> TesseraResult<Reduced<Self>>;

    /// Turn a reduction result back into a one-value series named like
    /// `like`, so that chaining can continue.
    fn from_scalar(value: Reduced<Self>, like: &Self) -> TesseraResult<Self>;

    fn fill_null(&self, value: &Reconciled<Self>) -> TesseraResult<Self>;

    /// Keep the values where `mask` is true.
    fn filter(&self, mask: &Self) -> TesseraResult<Self>;

    /// `self` where `mask` is true and `other` elsewhere; a null in `mask`
    /// counts as false. One-value sides broadcast against the others.
    fn zip_with(&self, mask: &Self, other: &Reconciled<Self>) -> TesseraResult<Self>;

    fn reshape(&self, op: Reshape) -> TesseraResult<Self>;

    /// Row-wise string concatenation with `separator`; nulls propagate.
    fn str_concat(&self, other: &Self, separator: &str) -> TesseraResult<Self>;
}

/// A native frame.
pub trait CompliantFrame<B: Backend<Frame = Self>>:
    Clone + Debug + Send + Sync + Sized + 'static
{
    fn columns(&self) -> Vec<String>;

    fn column(&self, name: &str) -> TesseraResult<B::Series>;

    fn dtype_of(&self, name: &str) -> TesseraResult<B::Dtype>;

    /// Number of rows as a scalar series named `len`.
    fn len_series(&self) -> TesseraResult<B::Series>;

    /// A literal as a scalar series named `literal`.
    fn literal(&self, value: &Value, dtype: Option<&DType>) -> TesseraResult<B::Series>;

    /// A new frame holding exactly `series`; one-value series broadcast to
    /// the length of the others.
    fn from_series(&self, series: Vec<B::Series>) -> TesseraResult<Self>;

    /// This frame with `series` replacing same-named columns in place and
    /// the rest appended in order.
    fn with_series(&self, series: Vec<B::Series>) -> TesseraResult<Self>;

    /// Keep the rows where `mask` is true.
    fn filter_mask(&self, mask: &B::Series) -> TesseraResult<Self>;

    /// Validate and convert an operand against this frame (frame context).
    fn reconcile(&self, other: &Comparand<B>) -> TesseraResult<Reconciled<B::Series>> {
        match other {
            Comparand::Frame(_) => Ok(Reconciled::Unsupported),
            Comparand::Scalar(value) => Ok(Reconciled::Scalar(value.clone())),
            Comparand::Series(series) => self.reconcile_series(series),
            Comparand::Exprs(_) => self.reconcile_series(other.single_output()?),
        }
    }

    /// Broadcast or realign a single series against this frame's rows.
    fn reconcile_series(&self, series: &B::Series) -> TesseraResult<Reconciled<B::Series>>;

    fn select_by_expression(&self, expr: &CompliantExpr<B>) -> TesseraResult<Self> {
        self.from_series(expr.evaluate(self)?)
    }

    fn filter_by_boolean_expression(&self, expr: &CompliantExpr<B>) -> TesseraResult<Self> {
        let masks: Comparand<B> = Comparand::Exprs(expr.evaluate(self)?);
        self.filter_mask(masks.single_output()?)
    }

    /// Group by `keys` and run the native aggregations. Keys come first in
    /// the result, groups in first-appearance order.
    fn group_and_aggregate(
        &self,
        keys: &[String],
        aggs: &[B::AggExpr],
        drop_null_keys: bool,
    ) -> TesseraResult<Self>;

    /// Group by `keys` and evaluate arbitrary expressions group by group.
    fn group_and_evaluate(
        &self,
        keys: &[String],
        exprs: &[CompliantExpr<B>],
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        let _ = (keys, exprs, drop_null_keys);
        Err(TesseraError::not_implemented(format!(
            "per-group evaluation on the {} backend",
            B::KIND
        )))
    }

    fn concat_horizontal(frames: &[Self]) -> TesseraResult<Self>;

    /// Stack frames; the column-name sets must match.
    fn concat_vertical(frames: &[Self]) -> TesseraResult<Self>;

    fn sort(&self, by: &[String], descending: &[bool]) -> TesseraResult<Self>;

    fn head(&self, n: usize) -> TesseraResult<Self>;

    fn rename(&self, mapping: &BTreeMap<String, String>) -> TesseraResult<Self>;

    fn drop(&self, names: &[String]) -> TesseraResult<Self>;

    /// Materialize as an Arrow record batch.
    fn to_batch(&self) -> TesseraResult<RecordBatch>;
}
