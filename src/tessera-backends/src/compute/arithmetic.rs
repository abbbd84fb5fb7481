//! Binary operators over Arrow arrays.
//!
//! Operands are first brought to a common length (a one-value side is
//! broadcast) and, for numeric and string operands, to a common type:
//!
//! - any float operand promotes both sides to `Float64`
//! - two unsigned integers promote to `UInt64`, other integers to `Int64`
//! - string-like columns (views, large strings, dictionaries) become `Utf8`
//!
//! Temporal operands are passed to the Arrow kernels unchanged so that
//! `timestamp - timestamp` and `date + duration` keep their native meaning.
//! True division always produces floats.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::compute::kernels::boolean::{and_kleene, or_kleene};
use arrow::compute::kernels::{cmp, numeric};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use common_error::{TesseraError, TesseraResult};
use tessera_expr::expr::BinaryOp;

use super::elementwise::str_concat;
use super::selection::align_lengths;

/// Whether `dtype` holds strings.
pub fn is_string_like(dtype: &DataType) -> bool {
    match dtype {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => true,
        DataType::Dictionary(_, values) => is_string_like(values),
        _ => false,
    }
}

/// The type two operands are coerced to, if they need coercion at all.
pub fn supertype(left: &DataType, right: &DataType) -> Option<DataType> {
    if left == right {
        return Some(left.clone());
    }
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),
        (l, r) if l.is_numeric() && r.is_numeric() => {
            if l.is_floating() || r.is_floating() {
                Some(DataType::Float64)
            } else if l.is_unsigned_integer() && r.is_unsigned_integer() {
                Some(DataType::UInt64)
            } else if l.is_integer() && r.is_integer() {
                Some(DataType::Int64)
            } else {
                Some(DataType::Float64)
            }
        }
        (l, r) if is_string_like(l) && is_string_like(r) => Some(DataType::Utf8),
        _ => None,
    }
}

fn coerce(left: &ArrayRef, right: &ArrayRef) -> TesseraResult<(ArrayRef, ArrayRef)> {
    match supertype(left.data_type(), right.data_type()) {
        Some(target) => Ok((cast_to(left, &target)?, cast_to(right, &target)?)),
        None => Ok((Arc::clone(left), Arc::clone(right))),
    }
}

fn cast_to(array: &ArrayRef, target: &DataType) -> TesseraResult<ArrayRef> {
    if array.data_type() == target {
        return Ok(Arc::clone(array));
    }
    Ok(cast(array.as_ref(), target)?)
}

/// Apply `op` to `left` and `right`.
pub fn binary(op: BinaryOp, left: &ArrayRef, right: &ArrayRef) -> TesseraResult<ArrayRef> {
    let (left, right) = align_lengths(left, right)?;
    if op.is_logical() {
        return logical(op, &left, &right);
    }
    if op == BinaryOp::TrueDiv {
        let l = cast_to(&left, &DataType::Float64)?;
        let r = cast_to(&right, &DataType::Float64)?;
        return Ok(numeric::div(&l, &r)?);
    }

    let (left, right) = coerce(&left, &right)?;
    let out: ArrayRef = match op {
        BinaryOp::Add if is_string_like(left.data_type()) => str_concat(&left, &right, "")?,
        BinaryOp::Add => numeric::add(&left, &right)?,
        BinaryOp::Sub => numeric::sub(&left, &right)?,
        BinaryOp::Mul => numeric::mul(&left, &right)?,
        BinaryOp::Mod => floor_mod(&left, &right)?,
        BinaryOp::FloorDiv => floor_div(&left, &right)?,
        BinaryOp::Pow => pow(&left, &right)?,
        BinaryOp::Eq => Arc::new(cmp::eq(&left, &right)?),
        BinaryOp::NotEq => Arc::new(cmp::neq(&left, &right)?),
        BinaryOp::Lt => Arc::new(cmp::lt(&left, &right)?),
        BinaryOp::LtEq => Arc::new(cmp::lt_eq(&left, &right)?),
        BinaryOp::Gt => Arc::new(cmp::gt(&left, &right)?),
        BinaryOp::GtEq => Arc::new(cmp::gt_eq(&left, &right)?),
        BinaryOp::TrueDiv | BinaryOp::And | BinaryOp::Or => {
            return Err(TesseraError::internal(format!("`{op}` is dispatched above")))
        }
    };
    Ok(out)
}

fn as_boolean(array: &ArrayRef, op: BinaryOp) -> TesseraResult<ArrayRef> {
    match array.data_type() {
        DataType::Boolean => Ok(Arc::clone(array)),
        DataType::Null => Ok(cast(array.as_ref(), &DataType::Boolean)?),
        other => Err(TesseraError::type_error(format!(
            "`{}` expects boolean operands, got {other}",
            op.label()
        ))),
    }
}

fn logical(op: BinaryOp, left: &ArrayRef, right: &ArrayRef) -> TesseraResult<ArrayRef> {
    let l = as_boolean(left, op)?;
    let r = as_boolean(right, op)?;
    let out = match op {
        BinaryOp::And => and_kleene(l.as_boolean(), r.as_boolean())?,
        _ => or_kleene(l.as_boolean(), r.as_boolean())?,
    };
    Ok(Arc::new(out))
}

fn both_integer(left: &ArrayRef, right: &ArrayRef) -> bool {
    left.data_type().is_integer() && right.data_type().is_integer()
}

fn floor_div_i64(a: i64, b: i64) -> TesseraResult<i64> {
    if b == 0 {
        return Err(TesseraError::execution("integer division by zero"));
    }
    let quotient = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn floor_div(left: &ArrayRef, right: &ArrayRef) -> TesseraResult<ArrayRef> {
    if both_integer(left, right) {
        let l = cast_to(left, &DataType::Int64)?;
        let r = cast_to(right, &DataType::Int64)?;
        let out = l
            .as_primitive::<Int64Type>()
            .iter()
            .zip(r.as_primitive::<Int64Type>().iter())
            .map(|pair| match pair {
                (Some(a), Some(b)) => floor_div_i64(a, b).map(Some),
                _ => Ok(None),
            })
            .collect::<TesseraResult<Int64Array>>()?;
        return Ok(Arc::new(out));
    }
    let l = cast_to(left, &DataType::Float64)?;
    let r = cast_to(right, &DataType::Float64)?;
    let quotient = numeric::div(&l, &r)?;
    Ok(Arc::new(
        quotient
            .as_primitive::<Float64Type>()
            .unary::<_, Float64Type>(f64::floor),
    ))
}

fn floor_mod_i64(a: i64, b: i64) -> TesseraResult<i64> {
    if b == 0 {
        return Err(TesseraError::execution("integer modulo by zero"));
    }
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn floor_mod_f64(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

/// Remainder with the sign of the divisor, so that
/// `a == (a // b) * b + a % b` holds for every non-zero `b`.
fn floor_mod(left: &ArrayRef, right: &ArrayRef) -> TesseraResult<ArrayRef> {
    if both_integer(left, right) {
        let l = cast_to(left, &DataType::Int64)?;
        let r = cast_to(right, &DataType::Int64)?;
        let out = l
            .as_primitive::<Int64Type>()
            .iter()
            .zip(r.as_primitive::<Int64Type>().iter())
            .map(|pair| match pair {
                (Some(a), Some(b)) => floor_mod_i64(a, b).map(Some),
                _ => Ok(None),
            })
            .collect::<TesseraResult<Int64Array>>()?;
        return Ok(Arc::new(out));
    }
    let l = cast_to(left, &DataType::Float64)?;
    let r = cast_to(right, &DataType::Float64)?;
    let out: Float64Array = l
        .as_primitive::<Float64Type>()
        .iter()
        .zip(r.as_primitive::<Float64Type>().iter())
        .map(|pair| match pair {
            (Some(a), Some(b)) => Some(floor_mod_f64(a, b)),
            _ => None,
        })
        .collect();
    Ok(Arc::new(out))
}

fn pow(left: &ArrayRef, right: &ArrayRef) -> TesseraResult<ArrayRef> {
    if both_integer(left, right) {
        let l = cast_to(left, &DataType::Int64)?;
        let r = cast_to(right, &DataType::Int64)?;
        let out = l
            .as_primitive::<Int64Type>()
            .iter()
            .zip(r.as_primitive::<Int64Type>().iter())
            .map(|pair| match pair {
                (Some(base), Some(exp)) => {
                    let exp = u32::try_from(exp).map_err(|_| {
                        TesseraError::value_error(format!(
                            "integers cannot be raised to the negative power {exp}"
                        ))
                    })?;
                    base.checked_pow(exp).map(Some).ok_or_else(|| {
                        TesseraError::execution(format!("overflow computing {base} ** {exp}"))
                    })
                }
                _ => Ok(None),
            })
            .collect::<TesseraResult<Int64Array>>()?;
        return Ok(Arc::new(out));
    }
    let l = cast_to(left, &DataType::Float64)?;
    let r = cast_to(right, &DataType::Float64)?;
    let out: Float64Array = l
        .as_primitive::<Float64Type>()
        .iter()
        .zip(r.as_primitive::<Float64Type>().iter())
        .map(|pair| match pair {
            (Some(base), Some(exp)) => Some(base.powf(exp)),
            _ => None,
        })
        .collect();
    Ok(Arc::new(out))
}
