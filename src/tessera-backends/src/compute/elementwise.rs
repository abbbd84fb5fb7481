//! Length-preserving single-column kernels.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray, UInt32Array,
};
use arrow::compute::kernels::boolean::not;
use arrow::compute::kernels::numeric::neg;
use arrow::compute::kernels::temporal::{date_part, DatePart};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, is_not_null, is_null, prep_null_mask_filter};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit};
use arrow::row::{Row, RowConverter, SortField};
use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;
use tessera_expr::expr::{DtFunction, Elementwise, StrFunction};

use super::arithmetic::{is_string_like, supertype};
use super::scalar::array_values;
use super::selection::{align_lengths, as_mask, broadcast};
use crate::columnar::dtypes::from_logical;

/// Apply `op` to every value of `array`.
pub fn apply(array: &ArrayRef, op: &Elementwise) -> TesseraResult<ArrayRef> {
    Ok(match op {
        Elementwise::Not => match array.data_type() {
            DataType::Boolean => Arc::new(not(array.as_boolean())?),
            other => {
                return Err(TesseraError::type_error(format!(
                    "`~` expects a boolean column, got {other}"
                )))
            }
        },
        Elementwise::Neg => neg(array.as_ref())?,
        Elementwise::Abs => map_numeric(
            array,
            "abs",
            |v| {
                v.checked_abs()
                    .ok_or_else(|| TesseraError::execution(format!("overflow computing abs({v})")))
            },
            f64::abs,
        )?,
        Elementwise::Round(decimals) => {
            let factor = 10f64.powi(i32::try_from(*decimals).unwrap_or(i32::MAX));
            map_numeric(array, "round", Ok, move |v| (v * factor).round() / factor)?
        }
        Elementwise::Cast(dtype) => cast(array.as_ref(), &from_logical(dtype)?)?,
        Elementwise::IsNull => Arc::new(is_null(array.as_ref())?),
        Elementwise::IsNotNull => Arc::new(is_not_null(array.as_ref())?),
        Elementwise::IsNan => is_nan(array)?,
        Elementwise::IsIn(values) => is_in(array, values)?,
        Elementwise::CumSum => cum_sum(array)?,
        Elementwise::IsUnique | Elementwise::IsFirstDistinct | Elementwise::IsLastDistinct => {
            distinct_flags(array, op)?
        }
        Elementwise::Str(function) => string(array, function)?,
        Elementwise::Dt(function) => temporal(array, *function)?,
    })
}

fn map_numeric(
    array: &ArrayRef,
    label: &str,
    int_op: impl Fn(i64) -> TesseraResult<i64>,
    float_op: impl Fn(f64) -> f64,
) -> TesseraResult<ArrayRef> {
    let dtype = array.data_type();
    if dtype.is_integer() {
        let ints = cast(array.as_ref(), &DataType::Int64)?;
        let out = ints
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map(&int_op).transpose())
            .collect::<TesseraResult<Int64Array>>()?;
        return Ok(cast(&out, dtype)?);
    }
    if dtype.is_floating() {
        let floats = cast(array.as_ref(), &DataType::Float64)?;
        let out = floats
            .as_primitive::<Float64Type>()
            .unary::<_, Float64Type>(float_op);
        return Ok(cast(&out, dtype)?);
    }
    Err(TesseraError::type_error(format!(
        "`{label}` expects a numeric column, got {dtype}"
    )))
}

fn is_nan(array: &ArrayRef) -> TesseraResult<ArrayRef> {
    let dtype = array.data_type();
    if dtype.is_floating() {
        let floats = cast(array.as_ref(), &DataType::Float64)?;
        let out: BooleanArray = floats
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map(f64::is_nan))
            .collect();
        return Ok(Arc::new(out));
    }
    if dtype.is_integer() {
        let out: BooleanArray = (0..array.len())
            .map(|i| (!array.is_null(i)).then_some(false))
            .collect();
        return Ok(Arc::new(out));
    }
    Err(TesseraError::type_error(format!(
        "`is_nan` expects a numeric column, got {dtype}"
    )))
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left.as_float64(), right.as_float64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn is_in(array: &ArrayRef, candidates: &[Value]) -> TesseraResult<ArrayRef> {
    let out: BooleanArray = array_values(array.as_ref())?
        .iter()
        .map(|value| {
            (!value.is_null()).then(|| candidates.iter().any(|c| same_value(value, c)))
        })
        .collect();
    Ok(Arc::new(out))
}

fn cum_sum(array: &ArrayRef) -> TesseraResult<ArrayRef> {
    let dtype = array.data_type();
    if dtype.is_integer() || dtype == &DataType::Boolean {
        let ints = cast(array.as_ref(), &DataType::Int64)?;
        let mut total = 0_i64;
        let out = ints
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| {
                v.map(|v| {
                    total = total.checked_add(v).ok_or_else(|| {
                        TesseraError::execution("overflow in cumulative sum")
                    })?;
                    Ok(total)
                })
                .transpose()
            })
            .collect::<TesseraResult<Int64Array>>()?;
        return Ok(Arc::new(out));
    }
    if dtype.is_floating() {
        let floats = cast(array.as_ref(), &DataType::Float64)?;
        let mut total = 0_f64;
        let out: Float64Array = floats
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| {
                v.map(|v| {
                    total += v;
                    total
                })
            })
            .collect();
        return Ok(Arc::new(out));
    }
    Err(TesseraError::type_error(format!(
        "`cum_sum` expects a numeric column, got {dtype}"
    )))
}

/// Occurrence flags of every value, compared through the row format so
/// that any type (null included) hashes as bytes.
fn distinct_flags(array: &ArrayRef, op: &Elementwise) -> TesseraResult<ArrayRef> {
    let converter = RowConverter::new(vec![SortField::new(array.data_type().clone())])?;
    let rows = converter.convert_columns(std::slice::from_ref(array))?;
    let flags: Vec<bool> = match op {
        Elementwise::IsUnique => {
            let mut counts: HashMap<Row<'_>, usize> = HashMap::new();
            for row in rows.iter() {
                *counts.entry(row).or_default() += 1;
            }
            rows.iter().map(|row| counts[&row] == 1).collect()
        }
        Elementwise::IsFirstDistinct => {
            let mut seen: HashSet<Row<'_>> = HashSet::new();
            rows.iter().map(|row| seen.insert(row)).collect()
        }
        _ => {
            let mut seen: HashSet<Row<'_>> = HashSet::new();
            let mut flags: Vec<bool> = (0..rows.num_rows())
                .rev()
                .map(|i| seen.insert(rows.row(i)))
                .collect();
            flags.reverse();
            flags
        }
    };
    Ok(Arc::new(BooleanArray::from(flags)))
}

fn as_strings(array: &ArrayRef, label: &str) -> TesseraResult<ArrayRef> {
    if !is_string_like(array.data_type()) && array.data_type() != &DataType::Null {
        return Err(TesseraError::type_error(format!(
            "`{label}` expects a string column, got {}",
            array.data_type()
        )));
    }
    Ok(cast(array.as_ref(), &DataType::Utf8)?)
}

fn char_slice(s: &str, offset: i64, length: Option<usize>) -> String {
    let n = s.chars().count();
    let distance = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
    let start = if offset >= 0 {
        distance.min(n)
    } else {
        n.saturating_sub(distance)
    };
    s.chars()
        .skip(start)
        .take(length.unwrap_or(usize::MAX))
        .collect()
}

fn string(array: &ArrayRef, function: &StrFunction) -> TesseraResult<ArrayRef> {
    let utf8 = as_strings(array, function.label())?;
    let values = utf8.as_string::<i32>();
    let out: ArrayRef = match function {
        StrFunction::Contains(pattern) => Arc::new(
            values
                .iter()
                .map(|v| v.map(|s| s.contains(pattern.as_str())))
                .collect::<BooleanArray>(),
        ),
        StrFunction::StartsWith(prefix) => Arc::new(
            values
                .iter()
                .map(|v| v.map(|s| s.starts_with(prefix.as_str())))
                .collect::<BooleanArray>(),
        ),
        StrFunction::EndsWith(suffix) => Arc::new(
            values
                .iter()
                .map(|v| v.map(|s| s.ends_with(suffix.as_str())))
                .collect::<BooleanArray>(),
        ),
        StrFunction::ToUppercase => Arc::new(
            values
                .iter()
                .map(|v| v.map(str::to_uppercase))
                .collect::<StringArray>(),
        ),
        StrFunction::ToLowercase => Arc::new(
            values
                .iter()
                .map(|v| v.map(str::to_lowercase))
                .collect::<StringArray>(),
        ),
        StrFunction::LenChars => Arc::new(
            values
                .iter()
                .map(|v| v.map(|s| u32::try_from(s.chars().count()).unwrap_or(u32::MAX)))
                .collect::<UInt32Array>(),
        ),
        StrFunction::ReplaceAll { pattern, value } => Arc::new(
            values
                .iter()
                .map(|v| v.map(|s| s.replace(pattern.as_str(), value)))
                .collect::<StringArray>(),
        ),
        StrFunction::Slice { offset, length } => Arc::new(
            values
                .iter()
                .map(|v| v.map(|s| char_slice(s, *offset, *length)))
                .collect::<StringArray>(),
        ),
    };
    Ok(out)
}

fn unit_nanos(unit: TimeUnit) -> i128 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

/// Whole `target_nanos` units in each duration, truncated toward zero.
fn duration_total(
    array: &ArrayRef,
    function: DtFunction,
    target_nanos: i64,
) -> TesseraResult<ArrayRef> {
    let DataType::Duration(unit) = array.data_type() else {
        return Err(TesseraError::type_error(format!(
            "`{}` expects a duration column, got {}",
            function.label(),
            array.data_type()
        )));
    };
    let scale = unit_nanos(*unit);
    let counts = cast(array.as_ref(), &DataType::Int64)?;
    let out = counts
        .as_primitive::<Int64Type>()
        .iter()
        .map(|v| {
            v.map(|v| {
                let total = i128::from(v) * scale / i128::from(target_nanos);
                i64::try_from(total).map_err(|_| {
                    TesseraError::execution(format!("overflow computing `{}`", function.label()))
                })
            })
            .transpose()
        })
        .collect::<TesseraResult<Int64Array>>()?;
    Ok(Arc::new(out))
}

fn temporal(array: &ArrayRef, function: DtFunction) -> TesseraResult<ArrayRef> {
    if let Some(target_nanos) = function.total_unit_nanos() {
        return duration_total(array, function, target_nanos);
    }
    if !array.data_type().is_temporal() {
        return Err(TesseraError::type_error(format!(
            "`{}` expects a temporal column, got {}",
            function.label(),
            array.data_type()
        )));
    }
    let part = match function {
        DtFunction::Year => DatePart::Year,
        DtFunction::Month => DatePart::Month,
        DtFunction::Day => DatePart::Day,
        DtFunction::Hour => DatePart::Hour,
        DtFunction::Minute => DatePart::Minute,
        DtFunction::Second => DatePart::Second,
        _ => {
            return Err(TesseraError::internal(format!(
                "`{}` is not a date part",
                function.label()
            )))
        }
    };
    Ok(date_part(array.as_ref(), part)?)
}

/// Replace the nulls of `array` with the values of `fill`; a one-value
/// `fill` is broadcast.
pub fn fill_null(array: &ArrayRef, fill: &ArrayRef) -> TesseraResult<ArrayRef> {
    if array.null_count() == 0 {
        return Ok(Arc::clone(array));
    }
    let target = supertype(array.data_type(), fill.data_type())
        .unwrap_or_else(|| array.data_type().clone());
    let values = cast(array.as_ref(), &target)?;
    let fill = broadcast(&cast(fill.as_ref(), &target)?, values.len())?;
    let valid = is_not_null(values.as_ref())?;
    Ok(zip(&valid, &values, &fill)?)
}

/// `truthy` where `mask` is true and `falsy` elsewhere; a null in `mask`
/// picks `falsy`. One-value inputs broadcast and both branches are brought
/// to their common type.
pub fn when_then(mask: &ArrayRef, truthy: &ArrayRef, falsy: &ArrayRef) -> TesseraResult<ArrayRef> {
    let len = [mask, truthy, falsy]
        .iter()
        .map(|a| a.len())
        .find(|n| *n != 1)
        .unwrap_or(1);
    let target = supertype(truthy.data_type(), falsy.data_type()).ok_or_else(|| {
        TesseraError::type_error(format!(
            "`when` branches have incompatible types {} and {}",
            truthy.data_type(),
            falsy.data_type()
        ))
    })?;
    let mask = broadcast(mask, len)?;
    let mask = prep_null_mask_filter(as_mask(&mask)?);
    let truthy = broadcast(&cast(truthy.as_ref(), &target)?, len)?;
    let falsy = broadcast(&cast(falsy.as_ref(), &target)?, len)?;
    Ok(zip(&mask, &truthy, &falsy)?)
}

/// Row-wise `left + separator + right` over the string forms of both
/// columns; a null on either side gives null.
pub fn str_concat(left: &ArrayRef, right: &ArrayRef, separator: &str) -> TesseraResult<ArrayRef> {
    let (left, right) = align_lengths(left, right)?;
    let left = cast(left.as_ref(), &DataType::Utf8)?;
    let right = cast(right.as_ref(), &DataType::Utf8)?;
    let out: StringArray = left
        .as_string::<i32>()
        .iter()
        .zip(right.as_string::<i32>().iter())
        .map(|pair| match pair {
            (Some(l), Some(r)) => Some(format!("{l}{separator}{r}")),
            _ => None,
        })
        .collect();
    Ok(Arc::new(out))
}

#[cfg(test)]
mod tests {
    use arrow::array::{Date32Array, Int32Array};
    use tessera_core::DType;

    use super::*;

    fn strings(values: &[Option<&str>]) -> ArrayRef {
        Arc::new(StringArray::from(values.to_vec()))
    }

    #[test]
    fn test_round_and_abs() {
        let floats: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.234), None, Some(-2.5)]));
        let rounded = apply(&floats, &Elementwise::Round(1)).unwrap();
        let expected: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.2), None, Some(-2.5)]));
        assert_eq!(rounded.as_ref(), expected.as_ref());

        let ints: ArrayRef = Arc::new(Int32Array::from(vec![-3, 4]));
        let abs = apply(&ints, &Elementwise::Abs).unwrap();
        let expected: ArrayRef = Arc::new(Int32Array::from(vec![3, 4]));
        assert_eq!(abs.as_ref(), expected.as_ref());

        assert!(apply(&strings(&[Some("a")]), &Elementwise::Abs).is_err());
    }

    #[test]
    fn test_is_in_keeps_nulls() {
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3)]));
        let out = apply(&ints, &Elementwise::IsIn(vec![Value::Float64(3.0), Value::Int64(7)]))
            .unwrap();
        let expected: ArrayRef = Arc::new(BooleanArray::from(vec![Some(false), None, Some(true)]));
        assert_eq!(out.as_ref(), expected.as_ref());
    }

    #[test]
    fn test_cum_sum_skips_nulls() {
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(2)]));
        let out = apply(&ints, &Elementwise::CumSum).unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3)]));
        assert_eq!(out.as_ref(), expected.as_ref());
    }

    #[test]
    fn test_string_functions() {
        let input = strings(&[Some("Hello"), None, Some("wörld")]);
        let upper = apply(&input, &Elementwise::Str(StrFunction::ToUppercase)).unwrap();
        assert_eq!(upper.as_ref(), strings(&[Some("HELLO"), None, Some("WÖRLD")]).as_ref());

        let len = apply(&input, &Elementwise::Str(StrFunction::LenChars)).unwrap();
        let expected: ArrayRef = Arc::new(UInt32Array::from(vec![Some(5), None, Some(5)]));
        assert_eq!(len.as_ref(), expected.as_ref());

        let tail = apply(
            &input,
            &Elementwise::Str(StrFunction::Slice {
                offset: -3,
                length: Some(2),
            }),
        )
        .unwrap();
        assert_eq!(tail.as_ref(), strings(&[Some("ll"), None, Some("rl")]).as_ref());
    }

    #[test]
    fn test_dt_year() {
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![0, 365]));
        let years = apply(&dates, &Elementwise::Dt(DtFunction::Year)).unwrap();
        let expected: ArrayRef = Arc::new(Int32Array::from(vec![1970, 1971]));
        assert_eq!(years.as_ref(), expected.as_ref());
    }

    #[test]
    fn test_distinct_flags() {
        let a: ArrayRef = Arc::new(Int64Array::from(vec![1, 1, 2, 3, 2]));
        let b: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None, Some(3), None, Some(1)]));
        let flags = |array: &ArrayRef, op: Elementwise| {
            let out = apply(array, &op).unwrap();
            out.as_boolean().iter().map(Option::unwrap).collect::<Vec<_>>()
        };
        assert_eq!(flags(&a, Elementwise::IsUnique), [false, false, false, true, false]);
        assert_eq!(
            flags(&a, Elementwise::IsFirstDistinct),
            [true, false, true, true, false]
        );
        assert_eq!(
            flags(&a, Elementwise::IsLastDistinct),
            [false, true, false, true, true]
        );
        assert_eq!(flags(&b, Elementwise::IsUnique), [false, false, true, false, false]);
        assert_eq!(
            flags(&b, Elementwise::IsFirstDistinct),
            [true, true, true, false, false]
        );
    }

    #[test]
    fn test_duration_totals_truncate_toward_zero() {
        use arrow::array::{DurationMillisecondArray, DurationSecondArray};

        let seconds: ArrayRef = Arc::new(DurationSecondArray::from(vec![
            Some(-4_210),
            Some(150),
            None,
            Some(59),
        ]));
        let minutes = apply(&seconds, &Elementwise::Dt(DtFunction::TotalMinutes)).unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![Some(-70), Some(2), None, Some(0)]));
        assert_eq!(minutes.as_ref(), expected.as_ref());

        let millis: ArrayRef = Arc::new(DurationMillisecondArray::from(vec![1_500, -1_500]));
        let out = apply(&millis, &Elementwise::Dt(DtFunction::TotalSeconds)).unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![1, -1]));
        assert_eq!(out.as_ref(), expected.as_ref());
        let out = apply(&millis, &Elementwise::Dt(DtFunction::TotalMicroseconds)).unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![1_500_000, -1_500_000]));
        assert_eq!(out.as_ref(), expected.as_ref());

        let dates: ArrayRef = Arc::new(Date32Array::from(vec![0]));
        assert!(apply(&dates, &Elementwise::Dt(DtFunction::TotalSeconds)).is_err());
    }

    #[test]
    fn test_when_then() {
        let mask: ArrayRef = Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)]));
        let three: ArrayRef = Arc::new(Int64Array::from(vec![3]));
        let other: ArrayRef = Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5]));
        let out = when_then(&mask, &three, &other).unwrap();
        let expected: ArrayRef = Arc::new(Float64Array::from(vec![3.0, 1.5, 2.5]));
        assert_eq!(out.as_ref(), expected.as_ref());

        let null: ArrayRef = Arc::new(arrow::array::NullArray::new(1));
        let out = when_then(&mask, &three, &null).unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![Some(3), None, None]));
        assert_eq!(out.as_ref(), expected.as_ref());

        assert!(when_then(&mask, &three, &strings(&[Some("x")])).is_err());
    }

    #[test]
    fn test_cast_uses_logical_dtypes() {
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        let out = apply(&ints, &Elementwise::Cast(DType::Float32)).unwrap();
        assert_eq!(out.data_type(), &DataType::Float32);
        assert!(apply(&ints, &Elementwise::Cast(DType::Object)).is_err());
    }

    #[test]
    fn test_fill_null_and_concat() {
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
        let zero: ArrayRef = Arc::new(Int64Array::from(vec![0]));
        let filled = fill_null(&ints, &zero).unwrap();
        let expected: ArrayRef = Arc::new(Int64Array::from(vec![1, 0]));
        assert_eq!(filled.as_ref(), expected.as_ref());

        let joined = str_concat(
            &strings(&[Some("a"), None]),
            &strings(&[Some("b"), Some("c")]),
            "-",
        )
        .unwrap();
        assert_eq!(joined.as_ref(), strings(&[Some("a-b"), None]).as_ref());
    }
}
