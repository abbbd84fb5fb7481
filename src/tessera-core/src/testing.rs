//! Property-based testing utilities for tessera-core.
//!
//! Strategies for the core types, shared with the other crates' tests
//! through the `testing` feature.

use proptest::prelude::*;

use crate::types::{DType, Field, TimeUnit, Value};

/// Strategy for time units.
pub fn arb_time_unit() -> impl Strategy<Value = TimeUnit> {
    prop::sample::select(TimeUnit::ALL.to_vec())
}

/// Strategy for time zones, including the naive case.
pub fn arb_time_zone() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("UTC".to_string())),
        Just(Some("Europe/Rome".to_string())),
        Just(Some("Asia/Kathmandu".to_string())),
    ]
}

/// Strategy for dtypes that carry no nested types.
pub fn arb_flat_dtype() -> impl Strategy<Value = DType> {
    prop_oneof![
        Just(DType::Int8),
        Just(DType::Int16),
        Just(DType::Int32),
        Just(DType::Int64),
        Just(DType::UInt8),
        Just(DType::UInt16),
        Just(DType::UInt32),
        Just(DType::UInt64),
        Just(DType::Float32),
        Just(DType::Float64),
        Just(DType::Boolean),
        Just(DType::String),
        Just(DType::Categorical),
        Just(DType::Enum),
        Just(DType::Date),
        Just(DType::Decimal),
        Just(DType::Object),
        Just(DType::Unknown),
        (arb_time_unit(), arb_time_zone()).prop_map(|(time_unit, time_zone)| DType::Datetime {
            time_unit,
            time_zone
        }),
        arb_time_unit().prop_map(DType::duration),
    ]
}

/// Strategy for arbitrary dtypes, nesting up to three levels.
pub fn arb_dtype() -> impl Strategy<Value = DType> {
    arb_flat_dtype().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(DType::list),
            (inner.clone(), 1usize..5).prop_map(|(dt, size)| DType::array(dt, size)),
            prop::collection::vec(inner, 1..4).prop_map(|dtypes| {
                DType::structure(
                    dtypes
                        .into_iter()
                        .enumerate()
                        .map(|(i, dt)| Field::new(format!("f{i}"), dt)),
                )
            }),
        ]
    })
}

/// Strategy for simple scalar values that roundtrip through JSON.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int64),
        // integer-representable floats avoid JSON precision issues
        any::<i32>().prop_map(|i| Value::Float64(f64::from(i))),
        "[a-zA-Z0-9]{0,20}".prop_map(Value::String),
        any::<i32>().prop_map(Value::Date),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_dtype_json_roundtrip(dtype in arb_dtype()) {
            let json = serde_json::to_string(&dtype).unwrap();
            let back: DType = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, dtype);
        }

        #[test]
        fn prop_dtype_equals_own_class(dtype in arb_dtype()) {
            prop_assert!(dtype == dtype.class());
        }

        #[test]
        fn prop_value_json_roundtrip(value in arb_value()) {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}
