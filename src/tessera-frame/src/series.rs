//! Neutral eager series.

use arrow::array::ArrayRef;
use common_config::BackendKind;
use common_error::{TesseraError, TesseraResult};
use tessera_backends::{ArrowSeries, Columnar, Indexed, IndexedSeries};
use tessera_core::{DType, Value};
use tessera_expr::compliant::{
    native_series, Backend, Comparand, CompliantSeries, Reduced,
};
use tessera_expr::expr::{AggFunc, BinaryOp, Operand, SeriesRef};
use tessera_expr::{Expr, IntoExpr};

use crate::any_frame::{AnyFrame, FrameOperand};
use crate::dataframe::DataFrame;

macro_rules! dispatch_series {
    ($series:expr, |$native:ident: $B:ident| $body:expr) => {
        match $series {
            AnySeries::Columnar($native) => {
                type $B = Columnar;
                $body
            }
            AnySeries::Indexed($native) => {
                type $B = Indexed;
                $body
            }
        }
    };
}

/// A native series of one of the eager backends.
#[derive(Debug, Clone)]
pub enum AnySeries {
    Columnar(ArrowSeries),
    Indexed(IndexedSeries),
}

impl From<ArrowSeries> for AnySeries {
    fn from(series: ArrowSeries) -> Self {
        Self::Columnar(series)
    }
}

impl From<IndexedSeries> for AnySeries {
    fn from(series: IndexedSeries) -> Self {
        Self::Indexed(series)
    }
}

/// Right-hand side of a series operation.
#[derive(Debug, Clone)]
pub enum SeriesOperand {
    Scalar(Value),
    Series(Series),
}

impl From<Series> for SeriesOperand {
    fn from(series: Series) -> Self {
        Self::Series(series)
    }
}

impl From<&Series> for SeriesOperand {
    fn from(series: &Series) -> Self {
        Self::Series(series.clone())
    }
}

macro_rules! scalar_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SeriesOperand {
                fn from(v: $t) -> Self {
                    Self::Scalar(Value::from(v))
                }
            }
        )*
    };
}

scalar_operand!(bool, i64, i32, f64, &str, String, Value);

impl SeriesOperand {
    fn comparand<B: Backend>(&self) -> TesseraResult<Comparand<B>> {
        Ok(match self {
            Self::Scalar(value) => Comparand::Scalar(value.clone()),
            Self::Series(series) => Comparand::Series(native_series::<B>(&series.handle())?),
        })
    }
}

/// A named column of an eager frame.
#[derive(Debug, Clone)]
pub struct Series {
    inner: AnySeries,
}

impl Series {
    pub(crate) fn from_native(inner: impl Into<AnySeries>) -> Self {
        Self {
            inner: inner.into(),
        }
    }

    /// Wrap `array` as a series of the eager backend `kind`.
    pub fn from_array(kind: BackendKind, name: &str, array: ArrayRef) -> TesseraResult<Self> {
        match kind {
            BackendKind::Columnar => {
                Ok(Self::from_native(Columnar::series_from_array(name, array)?))
            }
            BackendKind::Indexed => {
                Ok(Self::from_native(Indexed::series_from_array(name, array)?))
            }
            lazy => Err(TesseraError::value_error(format!(
                "the {lazy} backend is lazy and has no standalone series"
            ))),
        }
    }

    pub fn native(&self) -> &AnySeries {
        &self.inner
    }

    pub fn kind(&self) -> BackendKind {
        dispatch_series!(&self.inner, |_s: B| B::KIND)
    }

    pub fn name(&self) -> &str {
        dispatch_series!(&self.inner, |s: B| CompliantSeries::<B>::name(s))
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            AnySeries::Columnar(s) => s.len(),
            AnySeries::Indexed(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> TesseraResult<DType> {
        dispatch_series!(&self.inner, |s: B| Ok(B::to_logical(&s.dtype()?)))
    }

    #[must_use]
    pub fn alias(&self, name: &str) -> Self {
        dispatch_series!(&self.inner, |s: B| Self::from_native(s.rename(name)))
    }

    pub fn to_array(&self) -> ArrayRef {
        match &self.inner {
            AnySeries::Columnar(s) => s.array().clone(),
            AnySeries::Indexed(s) => s.values().clone(),
        }
    }

    /// Type-erased handle, for use inside expressions.
    pub fn handle(&self) -> SeriesRef {
        dispatch_series!(&self.inner, |s: B| SeriesRef::new(B::KIND, s.name(), s.clone()))
    }

    /// Use this series as a literal column inside an expression.
    pub fn to_expr(&self) -> Expr {
        Expr::Series(self.handle())
    }

    /// `self <op> other`, against a scalar or a series of the same backend.
    pub fn binary(&self, op: BinaryOp, other: impl Into<SeriesOperand>) -> TesseraResult<Self> {
        let other = other.into();
        dispatch_series!(&self.inner, |s: B| {
            let rhs = s.reconcile(&other.comparand::<B>()?)?;
            Ok(Self::from_native(s.binary(op, &rhs, false)?))
        })
    }

    /// `self <op> frame`. A series cannot take a frame operand, so the
    /// frame applies the reflected operation column by column.
    pub fn binary_frame(&self, op: BinaryOp, frame: &DataFrame) -> TesseraResult<DataFrame> {
        let unsupported = match (&self.inner, frame.native()) {
            (AnySeries::Columnar(s), AnyFrame::Columnar(f)) => {
                s.reconcile(&Comparand::<Columnar>::Frame(f.clone()))?.is_unsupported()
            }
            (AnySeries::Indexed(s), AnyFrame::Indexed(f)) => {
                s.reconcile(&Comparand::<Indexed>::Frame(f.clone()))?.is_unsupported()
            }
            (_, other) => {
                return Err(TesseraError::type_error(format!(
                    "cannot combine a {} series with a {} frame",
                    self.kind(),
                    other.kind()
                )))
            }
        };
        if !unsupported {
            return Err(TesseraError::consistency(
                "a frame operand was accepted by a series",
            ));
        }
        frame.reflected(op, &FrameOperand::Series(self.handle()))
    }

    /// Reduce to one value.
    pub fn reduce(&self, func: AggFunc) -> TesseraResult<Value> {
        dispatch_series!(&self.inner, |s: B| match s.reduce(func)? {
            Reduced::Value(value) => Ok(value),
            Reduced::Deferred(series) => {
                let array = Self::from_native(series).to_array();
                if array.len() == 1 {
                    tessera_backends::compute::scalar::value_at(array.as_ref(), 0)
                } else {
                    Err(TesseraError::consistency(format!(
                        "`{}` produced {} values",
                        func.name(),
                        array.len()
                    )))
                }
            }
        })
    }

    pub fn sum(&self) -> TesseraResult<Value> {
        self.reduce(AggFunc::Sum)
    }

    pub fn mean(&self) -> TesseraResult<Value> {
        self.reduce(AggFunc::Mean)
    }

    pub fn min(&self) -> TesseraResult<Value> {
        self.reduce(AggFunc::Min)
    }

    pub fn max(&self) -> TesseraResult<Value> {
        self.reduce(AggFunc::Max)
    }

    pub fn std(&self, ddof: u8) -> TesseraResult<Value> {
        self.reduce(AggFunc::Std { ddof })
    }

    pub fn count(&self) -> TesseraResult<Value> {
        self.reduce(AggFunc::Count)
    }
}

impl From<Series> for IntoExpr {
    fn from(series: Series) -> Self {
        Self::Series(series.handle())
    }
}

impl From<Series> for Operand {
    fn from(series: Series) -> Self {
        Self::Series(series.handle())
    }
}

impl From<&Series> for Operand {
    fn from(series: &Series) -> Self {
        Self::Series(series.handle())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, BooleanArray, Int64Array};

    use super::*;

    fn ints(kind: BackendKind, name: &str, values: &[i64]) -> Series {
        Series::from_array(kind, name, Arc::new(Int64Array::from(values.to_vec()))).unwrap()
    }

    #[test]
    fn test_series_basics() {
        for kind in [BackendKind::Columnar, BackendKind::Indexed] {
            let a = ints(kind, "a", &[0, 1, 2]);
            assert_eq!(a.len(), 3);
            assert_eq!(a.dtype().unwrap(), DType::Int64);
            assert_eq!(a.alias("b").name(), "b");
            assert_eq!(a.sum().unwrap(), Value::Int64(3));
            assert_eq!(a.mean().unwrap(), Value::Float64(1.0));

            let gt = a.binary(BinaryOp::Gt, 1_i64).unwrap();
            assert_eq!(gt.name(), "a");
            assert_eq!(
                gt.to_array().as_ref(),
                &BooleanArray::from(vec![false, false, true]) as &dyn Array
            );
            let plus = a.binary(BinaryOp::Add, &ints(kind, "x", &[10])).unwrap();
            assert_eq!(
                plus.to_array().as_ref(),
                &Int64Array::from(vec![10, 11, 12]) as &dyn Array
            );
        }
    }

    #[test]
    fn test_lazy_kinds_have_no_series() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        assert!(Series::from_array(BackendKind::Sql, "a", array).is_err());
    }

    #[test]
    fn test_mixed_backends_rejected() {
        let a = ints(BackendKind::Columnar, "a", &[1, 2]);
        let b = ints(BackendKind::Indexed, "b", &[1, 2]);
        assert!(matches!(
            a.binary(BinaryOp::Add, &b),
            Err(TesseraError::TypeError(_))
        ));
    }
}
