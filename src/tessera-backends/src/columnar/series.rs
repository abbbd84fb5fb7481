//! Eager Arrow column.

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;
use tessera_expr::compliant::{CompliantSeries, Reconciled, Reduced};
use tessera_expr::expr::{AggFunc, BinaryOp, Elementwise, Reshape};

use super::Columnar;
use crate::compute::scalar::{to_array, value_at};
use crate::compute::{aggregate, arithmetic, elementwise, selection};

/// A named Arrow array.
#[derive(Debug, Clone)]
pub struct ArrowSeries {
    name: String,
    array: ArrayRef,
}

impl ArrowSeries {
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Self {
            name: name.into(),
            array,
        }
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn into_array(self) -> ArrayRef {
        self.array
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// Value at row `i`.
    pub fn get(&self, i: usize) -> TesseraResult<Value> {
        value_at(self.array.as_ref(), i)
    }

    fn with_array(&self, array: ArrayRef) -> Self {
        Self::new(self.name.clone(), array)
    }
}

/// The Arrow array behind a reconciled operand.
pub(crate) fn operand_array<S>(
    operand: &Reconciled<S>,
    array_of: impl Fn(&S) -> ArrayRef,
    what: &str,
) -> TesseraResult<ArrayRef> {
    match operand {
        Reconciled::Scalar(value) => to_array(value, None),
        Reconciled::Broadcast(series) | Reconciled::Column(series) => Ok(array_of(series)),
        Reconciled::Unsupported => Err(TesseraError::type_error(format!(
            "unsupported operand for `{what}`"
        ))),
    }
}

/// Apply `op` to two arrays, swapping them when `reflected`.
pub(crate) fn apply_binary(
    op: BinaryOp,
    left: &ArrayRef,
    right: &ArrayRef,
    reflected: bool,
) -> TesseraResult<ArrayRef> {
    if reflected {
        arithmetic::binary(op, right, left)
    } else {
        arithmetic::binary(op, left, right)
    }
}

impl CompliantSeries<Columnar> for ArrowSeries {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&self, name: &str) -> Self {
        Self::new(name, self.array.clone())
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn is_scalar(&self) -> bool {
        self.len() == 1
    }

    fn dtype(&self) -> TesseraResult<DataType> {
        Ok(self.data_type().clone())
    }

    fn reconcile_series(&self, other: &Self) -> TesseraResult<Reconciled<Self>> {
        if other.len() == 1 {
            return Ok(Reconciled::Scalar(other.get(0)?));
        }
        Ok(Reconciled::Column(other.clone()))
    }

    fn binary(&self, op: BinaryOp, other: &Reconciled<Self>, reflected: bool) -> TesseraResult<Self> {
        let rhs = operand_array(other, |s| s.array.clone(), op.label())?;
        Ok(self.with_array(apply_binary(op, &self.array, &rhs, reflected)?))
    }

    fn elementwise(&self, op: &Elementwise) -> TesseraResult<Self> {
        Ok(self.with_array(elementwise::apply(&self.array, op)?))
    }

    fn reduce(&self, func: AggFunc) -> TesseraResult<Reduced<Self>> {
        Ok(Reduced::Value(aggregate::reduce(func, &self.array)?))
    }

    fn from_scalar(value: Reduced<Self>, like: &Self) -> TesseraResult<Self> {
        match value {
            Reduced::Value(value) => Ok(Self::new(like.name.clone(), to_array(&value, None)?)),
            Reduced::Deferred(series) => Ok(series.rename(&like.name)),
        }
    }

    fn fill_null(&self, value: &Reconciled<Self>) -> TesseraResult<Self> {
        let fill = operand_array(value, |s| s.array.clone(), "fill_null")?;
        Ok(self.with_array(elementwise::fill_null(&self.array, &fill)?))
    }

    fn filter(&self, mask: &Self) -> TesseraResult<Self> {
        Ok(self.with_array(selection::filter_array(&self.array, &mask.array)?))
    }

    fn zip_with(&self, mask: &Self, other: &Reconciled<Self>) -> TesseraResult<Self> {
        let otherwise = operand_array(other, |s| s.array.clone(), "when")?;
        Ok(self.with_array(elementwise::when_then(&mask.array, &self.array, &otherwise)?))
    }

    fn reshape(&self, op: Reshape) -> TesseraResult<Self> {
        Ok(self.with_array(selection::reshape(&self.array, op)?))
    }

    fn str_concat(&self, other: &Self, separator: &str) -> TesseraResult<Self> {
        Ok(self.with_array(elementwise::str_concat(
            &self.array,
            &other.array,
            separator,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{BooleanArray, Int64Array};
    use tessera_expr::compliant::Comparand;

    use super::*;

    fn ints(name: &str, values: &[i64]) -> ArrowSeries {
        ArrowSeries::new(name, Arc::new(Int64Array::from(values.to_vec())))
    }

    #[test]
    fn test_length_one_operand_becomes_scalar() {
        let left = ints("a", &[0, 1, 2]);
        let right = ints("b", &[1]);
        match left.reconcile(&Comparand::Series(right)).unwrap() {
            Reconciled::Scalar(value) => assert_eq!(value, Value::Int64(1)),
            other => panic!("expected a scalar, got {other:?}"),
        }
        let same = ints("c", &[5, 6, 7]);
        assert!(matches!(
            left.reconcile(&Comparand::Series(same)).unwrap(),
            Reconciled::Column(_)
        ));
    }

    #[test]
    fn test_binary_keeps_left_name() {
        let left = ints("a", &[0, 1, 2]);
        let out = left
            .binary(BinaryOp::Gt, &Reconciled::Scalar(Value::Int64(1)), false)
            .unwrap();
        assert_eq!(out.name(), "a");
        let expected: ArrayRef = Arc::new(BooleanArray::from(vec![false, false, true]));
        assert_eq!(out.array().as_ref(), expected.as_ref());

        let reflected = left
            .binary(BinaryOp::Sub, &Reconciled::Scalar(Value::Int64(10)), true)
            .unwrap();
        assert_eq!(reflected.get(2).unwrap(), Value::Int64(8));
    }

    #[test]
    fn test_reduce_and_wrap() {
        let a = ints("a", &[3, 1, 2]);
        let Reduced::Value(max) = a.reduce(AggFunc::Max).unwrap() else {
            panic!("eager reductions are values");
        };
        assert_eq!(max, Value::Int64(3));
        let wrapped = ArrowSeries::from_scalar(Reduced::Value(max), &a).unwrap();
        assert_eq!(wrapped.name(), "a");
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn test_zip_with_broadcasts_one_value_sides() {
        let mask = ArrowSeries::new(
            "m",
            Arc::new(BooleanArray::from(vec![Some(true), Some(false), None])),
        );
        let out = ints("a", &[1, 2, 3])
            .zip_with(&mask, &Reconciled::Scalar(Value::Int64(0)))
            .unwrap();
        assert_eq!(out.name(), "a");
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![1, 0, 0]));
        assert_eq!(out.array().as_ref(), expected.as_ref());

        let out = ints("lit", &[7])
            .zip_with(&mask, &Reconciled::Column(ints("b", &[4, 5, 6])))
            .unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![7, 5, 6]));
        assert_eq!(out.array().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_unsupported_operand() {
        let a = ints("a", &[1]);
        assert!(matches!(
            a.binary(BinaryOp::Add, &Reconciled::Unsupported, false),
            Err(TesseraError::TypeError(_))
        ));
    }
}
