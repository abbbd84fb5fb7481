//! Conversion between scalar [`Value`]s and Arrow arrays.

use std::mem::discriminant;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array,
    StringArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Float64Type, Int64Type, UInt64Type};
use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;

use crate::columnar::dtypes::{arrow_unit, logical_unit};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Build an array from `values`, cast to `target` when given.
///
/// All non-null values must be of one kind; integers mixed with floats
/// widen to floats.
pub fn values_to_array(values: &[Value], target: Option<&DataType>) -> TesseraResult<ArrayRef> {
    let Some(first) = values.iter().find(|v| !v.is_null()) else {
        return Ok(new_null_array(target.unwrap_or(&DataType::Null), values.len()));
    };
    let has_float = values.iter().any(|v| matches!(v, Value::Float64(_)));
    let natural: ArrayRef = match first {
        Value::Null => return Ok(new_null_array(target.unwrap_or(&DataType::Null), values.len())),
        Value::Float64(_) => floats(values)?,
        Value::Int64(_) | Value::UInt64(_) if has_float => floats(values)?,
        Value::Bool(_) => {
            check_kinds(values, |v| discriminant(v) == discriminant(first))?;
            Arc::new(values.iter().map(Value::as_bool).collect::<BooleanArray>())
        }
        Value::Int64(_) => {
            check_kinds(values, |v| discriminant(v) == discriminant(first))?;
            Arc::new(values.iter().map(Value::as_int64).collect::<Int64Array>())
        }
        Value::UInt64(_) => {
            check_kinds(values, |v| discriminant(v) == discriminant(first))?;
            Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::UInt64(u) => Some(*u),
                        _ => None,
                    })
                    .collect::<UInt64Array>(),
            )
        }
        Value::String(_) => {
            check_kinds(values, |v| discriminant(v) == discriminant(first))?;
            Arc::new(values.iter().map(Value::as_str).collect::<StringArray>())
        }
        Value::Date(_) => {
            check_kinds(values, |v| discriminant(v) == discriminant(first))?;
            Arc::new(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Date(d) => Some(*d),
                        _ => None,
                    })
                    .collect::<Date32Array>(),
            )
        }
        Value::Datetime { unit, tz, .. } => {
            check_kinds(values, |v| match v {
                Value::Datetime { unit: u, tz: z, .. } => u == unit && z == tz,
                _ => false,
            })?;
            let raw: Int64Array = values
                .iter()
                .map(|v| match v {
                    Value::Datetime { value, .. } => Some(*value),
                    _ => None,
                })
                .collect();
            let dtype = DataType::Timestamp(arrow_unit(*unit), tz.as_deref().map(Arc::from));
            cast(&raw, &dtype)?
        }
        Value::Duration { unit, .. } => {
            check_kinds(values, |v| matches!(v, Value::Duration { unit: u, .. } if u == unit))?;
            let raw: Int64Array = values
                .iter()
                .map(|v| match v {
                    Value::Duration { value, .. } => Some(*value),
                    _ => None,
                })
                .collect();
            cast(&raw, &DataType::Duration(arrow_unit(*unit)))?
        }
    };
    match target {
        Some(target) if target != natural.data_type() => Ok(cast(&natural, target)?),
        _ => Ok(natural),
    }
}

fn floats(values: &[Value]) -> TesseraResult<ArrayRef> {
    check_kinds(values, |v| {
        matches!(v, Value::Int64(_) | Value::UInt64(_) | Value::Float64(_))
    })?;
    Ok(Arc::new(values.iter().map(Value::as_float64).collect::<Float64Array>()))
}

fn check_kinds(values: &[Value], accept: impl Fn(&Value) -> bool) -> TesseraResult<()> {
    match values.iter().find(|v| !v.is_null() && !accept(v)) {
        Some(v) => Err(TesseraError::type_error(format!(
            "cannot mix {} with {} values in one column",
            v.type_name(),
            values
                .iter()
                .find(|v| !v.is_null())
                .map_or("null", Value::type_name)
        ))),
        None => Ok(()),
    }
}

/// A one-value array holding `value`.
pub fn to_array(value: &Value, target: Option<&DataType>) -> TesseraResult<ArrayRef> {
    values_to_array(std::slice::from_ref(value), target)
}

/// The value at row `i`.
pub fn value_at(array: &dyn Array, i: usize) -> TesseraResult<Value> {
    if i >= array.len() {
        return Err(TesseraError::internal(format!(
            "row {i} out of bounds for an array of length {}",
            array.len()
        )));
    }
    if array.is_null(i) || array.data_type() == &DataType::Null {
        return Ok(Value::Null);
    }
    let single = array.slice(i, 1);
    Ok(match array.data_type() {
        DataType::Boolean => Value::Bool(single.as_boolean().value(0)),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            Value::Int64(cast(&single, &DataType::Int64)?.as_primitive::<Int64Type>().value(0))
        }
        DataType::UInt64 => Value::UInt64(single.as_primitive::<UInt64Type>().value(0)),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Value::Float64(
            cast(&single, &DataType::Float64)?
                .as_primitive::<Float64Type>()
                .value(0),
        ),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            Value::String(cast(&single, &DataType::Utf8)?.as_string::<i32>().value(0).to_string())
        }
        DataType::Date32 => Value::Date(single.as_primitive::<Date32Type>().value(0)),
        DataType::Date64 => {
            let millis = cast(&single, &DataType::Int64)?
                .as_primitive::<Int64Type>()
                .value(0);
            let days = i32::try_from(millis.div_euclid(MILLIS_PER_DAY))
                .map_err(|_| TesseraError::value_error(format!("date {millis}ms out of range")))?;
            Value::Date(days)
        }
        DataType::Timestamp(unit, tz) => Value::Datetime {
            value: cast(&single, &DataType::Int64)?
                .as_primitive::<Int64Type>()
                .value(0),
            unit: logical_unit(unit),
            tz: tz.as_ref().map(|tz| tz.to_string()),
        },
        DataType::Duration(unit) => Value::Duration {
            value: cast(&single, &DataType::Int64)?
                .as_primitive::<Int64Type>()
                .value(0),
            unit: logical_unit(unit),
        },
        other => {
            return Err(TesseraError::not_implemented(format!(
                "scalar values of type {other}"
            )))
        }
    })
}

/// Every value of `array`, in order.
pub fn array_values(array: &dyn Array) -> TesseraResult<Vec<Value>> {
    (0..array.len()).map(|i| value_at(array, i)).collect()
}

#[cfg(test)]
mod tests {
    use tessera_core::TimeUnit;

    use super::*;

    #[test]
    fn test_values_to_array_widens_ints() {
        let array = values_to_array(&[Value::Int64(1), Value::Null, Value::Float64(2.5)], None)
            .unwrap();
        assert_eq!(array.data_type(), &DataType::Float64);
        assert_eq!(array.null_count(), 1);
        assert_eq!(value_at(&array, 2).unwrap(), Value::Float64(2.5));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let err = values_to_array(&[Value::Int64(1), Value::from("a")], None).unwrap_err();
        assert!(matches!(err, TesseraError::TypeError(_)));
    }

    #[test]
    fn test_all_null_takes_target() {
        let array = values_to_array(&[Value::Null, Value::Null], Some(&DataType::Utf8)).unwrap();
        assert_eq!(array.data_type(), &DataType::Utf8);
        assert_eq!(array.null_count(), 2);
    }

    #[test]
    fn test_temporal_values() {
        let ts = Value::Datetime {
            value: 1_000,
            unit: TimeUnit::Millisecond,
            tz: Some("UTC".into()),
        };
        let array = to_array(&ts, None).unwrap();
        assert!(matches!(array.data_type(), DataType::Timestamp(_, Some(_))));
        assert_eq!(value_at(&array, 0).unwrap(), ts);

        let int32 = to_array(&Value::Int64(7), Some(&DataType::Int32)).unwrap();
        assert_eq!(int32.data_type(), &DataType::Int32);
        assert_eq!(value_at(&int32, 0).unwrap(), Value::Int64(7));
    }
}
