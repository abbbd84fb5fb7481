//! Dtype spellings of the partitioned engine.
//!
//! The write path is a fixed table with no storage context: numbers and
//! booleans use numpy spellings, strings are always arrow-backed. The read
//! path accepts every spelling the row-labelled engine knows.

use arrow::datatypes::DataType;
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, DTypeClass};

use crate::columnar;
use crate::indexed::dtypes::parse;

const BACKEND: &str = "partitioned";

const FLAT: &[(DTypeClass, &str)] = &[
    (DTypeClass::Int8, "int8"),
    (DTypeClass::Int16, "int16"),
    (DTypeClass::Int32, "int32"),
    (DTypeClass::Int64, "int64"),
    (DTypeClass::UInt8, "uint8"),
    (DTypeClass::UInt16, "uint16"),
    (DTypeClass::UInt32, "uint32"),
    (DTypeClass::UInt64, "uint64"),
    (DTypeClass::Float32, "float32"),
    (DTypeClass::Float64, "float64"),
    (DTypeClass::Boolean, "bool"),
    (DTypeClass::String, "string[pyarrow]"),
    (DTypeClass::Date, "date32[day][pyarrow]"),
    (DTypeClass::Categorical, "category"),
    (DTypeClass::Object, "object"),
];

pub fn to_logical(spelling: &str) -> DType {
    parse(spelling)
}

pub fn from_logical(dtype: &DType) -> TesseraResult<String> {
    if let Some((_, spelling)) = FLAT.iter().find(|(class, _)| *dtype == *class) {
        return Ok((*spelling).to_string());
    }
    match dtype {
        DType::Datetime {
            time_unit,
            time_zone: Some(tz),
        } => Ok(format!("datetime64[{time_unit}, {tz}]")),
        DType::Datetime { time_unit, .. } => Ok(format!("datetime64[{time_unit}]")),
        DType::Duration { time_unit } => Ok(format!("timedelta64[{time_unit}]")),
        DType::Decimal => Ok(format!(
            "decimal128({}, {})[pyarrow]",
            columnar::dtypes::DECIMAL_PRECISION,
            columnar::dtypes::DECIMAL_SCALE
        )),
        other => Err(TesseraError::unsupported_dtype(other, BACKEND)),
    }
}

/// Spelling of the partitions' Arrow type, `object` when it has none.
pub fn spelling_of(data_type: &DataType) -> String {
    from_logical(&columnar::dtypes::to_logical(data_type)).unwrap_or_else(|_| "object".to_string())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tessera_core::testing::arb_dtype;
    use tessera_core::TimeUnit;

    use super::*;

    #[test]
    fn test_fixed_table() {
        assert_eq!(from_logical(&DType::String).unwrap(), "string[pyarrow]");
        assert_eq!(from_logical(&DType::Boolean).unwrap(), "bool");
        assert_eq!(
            from_logical(&DType::duration(TimeUnit::Second)).unwrap(),
            "timedelta64[s]"
        );
        for nested in [
            DType::list(DType::Int64),
            DType::array(DType::Int64, 2),
            DType::structure([tessera_core::Field::new("a", DType::Int64)]),
        ] {
            assert!(matches!(
                from_logical(&nested),
                Err(TesseraError::UnknownDtype(_))
            ));
        }
    }

    #[test]
    fn test_reads_row_labelled_spellings() {
        assert_eq!(to_logical("Int64"), DType::Int64);
        assert_eq!(to_logical("large_string[pyarrow]"), DType::String);
        assert_eq!(spelling_of(&DataType::LargeUtf8), "string[pyarrow]");
        assert_eq!(spelling_of(&DataType::Float16), "object");
    }

    proptest! {
        #[test]
        fn prop_roundtrip(dtype in arb_dtype()) {
            if let Ok(native) = from_logical(&dtype) {
                prop_assert_eq!(to_logical(&native), dtype);
            }
        }
    }
}
