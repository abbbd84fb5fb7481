//! Logical dtype <-> Arrow `DataType` table.
//!
//! Every engine in this crate stores its data as Arrow arrays, so besides
//! being the columnar backend's dtype table this module is also how the
//! other backends turn a logical dtype into something a kernel can cast to.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field as ArrowField, Fields, TimeUnit as ArrowTimeUnit};
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, DTypeClass, Field, TimeUnit};

const BACKEND: &str = "columnar";

/// Classes that map to exactly one Arrow type, in both directions.
const FLAT_ROWS: &[(DTypeClass, DataType)] = &[
    (DTypeClass::Int8, DataType::Int8),
    (DTypeClass::Int16, DataType::Int16),
    (DTypeClass::Int32, DataType::Int32),
    (DTypeClass::Int64, DataType::Int64),
    (DTypeClass::UInt8, DataType::UInt8),
    (DTypeClass::UInt16, DataType::UInt16),
    (DTypeClass::UInt32, DataType::UInt32),
    (DTypeClass::UInt64, DataType::UInt64),
    (DTypeClass::Float32, DataType::Float32),
    (DTypeClass::Float64, DataType::Float64),
    (DTypeClass::Boolean, DataType::Boolean),
    (DTypeClass::String, DataType::Utf8),
    (DTypeClass::Date, DataType::Date32),
];

/// Precision and scale decimals are written with.
pub const DECIMAL_PRECISION: u8 = 38;
pub const DECIMAL_SCALE: i8 = 10;

pub fn arrow_unit(unit: TimeUnit) -> ArrowTimeUnit {
    match unit {
        TimeUnit::Nanosecond => ArrowTimeUnit::Nanosecond,
        TimeUnit::Microsecond => ArrowTimeUnit::Microsecond,
        TimeUnit::Millisecond => ArrowTimeUnit::Millisecond,
        TimeUnit::Second => ArrowTimeUnit::Second,
    }
}

pub fn logical_unit(unit: &ArrowTimeUnit) -> TimeUnit {
    match unit {
        ArrowTimeUnit::Nanosecond => TimeUnit::Nanosecond,
        ArrowTimeUnit::Microsecond => TimeUnit::Microsecond,
        ArrowTimeUnit::Millisecond => TimeUnit::Millisecond,
        ArrowTimeUnit::Second => TimeUnit::Second,
    }
}

/// Read path. Never fails.
pub fn to_logical(native: &DataType) -> DType {
    if let Some((class, _)) = FLAT_ROWS.iter().find(|(_, dt)| dt == native) {
        if let Some(dtype) = class.default_dtype() {
            return dtype;
        }
    }
    match native {
        DataType::LargeUtf8 | DataType::Utf8View => DType::String,
        DataType::Date64 => DType::Date,
        DataType::Dictionary(_, _) => DType::Categorical,
        DataType::Timestamp(unit, tz) => DType::Datetime {
            time_unit: logical_unit(unit),
            time_zone: tz.as_ref().map(|tz| tz.to_string()),
        },
        DataType::Duration(unit) => DType::duration(logical_unit(unit)),
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => DType::Decimal,
        DataType::List(field) | DataType::LargeList(field) => {
            DType::list(to_logical(field.data_type()))
        }
        DataType::FixedSizeList(field, size) => match usize::try_from(*size) {
            Ok(size) => DType::array(to_logical(field.data_type()), size),
            Err(_) => DType::Unknown,
        },
        DataType::Struct(fields) => DType::structure(
            fields
                .iter()
                .map(|f| Field::new(f.name(), to_logical(f.data_type()))),
        ),
        _ => DType::Unknown,
    }
}

/// Write path.
pub fn from_logical(dtype: &DType) -> TesseraResult<DataType> {
    if let Some((_, native)) = FLAT_ROWS.iter().find(|(class, _)| *dtype == *class) {
        return Ok(native.clone());
    }
    Ok(match dtype {
        DType::Categorical => {
            DataType::Dictionary(Box::new(DataType::UInt32), Box::new(DataType::Utf8))
        }
        DType::Datetime {
            time_unit,
            time_zone,
        } => DataType::Timestamp(arrow_unit(*time_unit), time_zone.as_deref().map(Arc::from)),
        DType::Duration { time_unit } => DataType::Duration(arrow_unit(*time_unit)),
        DType::Decimal => DataType::Decimal128(DECIMAL_PRECISION, DECIMAL_SCALE),
        DType::List(inner) => DataType::List(Arc::new(item_field(inner)?)),
        DType::Array { inner, size } => {
            let size = i32::try_from(*size).map_err(|_| {
                TesseraError::value_error(format!("array size {size} does not fit Arrow"))
            })?;
            DataType::FixedSizeList(Arc::new(item_field(inner)?), size)
        }
        DType::Struct(fields) => DataType::Struct(
            fields
                .iter()
                .map(|f| Ok(ArrowField::new(&f.name, from_logical(&f.dtype)?, true)))
                .collect::<TesseraResult<Fields>>()?,
        ),
        other => return Err(TesseraError::unsupported_dtype(other, BACKEND)),
    })
}

fn item_field(inner: &DType) -> TesseraResult<ArrowField> {
    Ok(ArrowField::new("item", from_logical(inner)?, true))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tessera_core::testing::arb_dtype;

    use super::*;

    #[test]
    fn test_read_path_variants() {
        assert_eq!(to_logical(&DataType::Utf8View), DType::String);
        assert_eq!(to_logical(&DataType::LargeUtf8), DType::String);
        assert_eq!(to_logical(&DataType::Date64), DType::Date);
        assert_eq!(
            to_logical(&DataType::Dictionary(
                Box::new(DataType::Int8),
                Box::new(DataType::Utf8)
            )),
            DType::Categorical
        );
        assert_eq!(to_logical(&DataType::Decimal256(50, 2)), DType::Decimal);
        assert_eq!(to_logical(&DataType::Float16), DType::Unknown);
    }

    #[test]
    fn test_unwritable() {
        for dtype in [DType::Enum, DType::Object, DType::Unknown] {
            let err = from_logical(&dtype).unwrap_err();
            assert!(matches!(err, TesseraError::UnknownDtype(_)), "{dtype}");
        }
        assert!(from_logical(&DType::list(DType::Enum)).is_err());
    }

    #[test]
    fn test_parameterized() {
        let dt = DType::datetime(TimeUnit::Millisecond, Some("Asia/Kathmandu"));
        assert_eq!(
            from_logical(&dt).unwrap(),
            DataType::Timestamp(ArrowTimeUnit::Millisecond, Some("Asia/Kathmandu".into()))
        );
        assert_eq!(
            from_logical(&DType::Categorical).unwrap(),
            DataType::Dictionary(Box::new(DataType::UInt32), Box::new(DataType::Utf8))
        );
    }

    proptest! {
        #[test]
        fn prop_writable_dtypes_roundtrip(dtype in arb_dtype()) {
            if let Ok(native) = from_logical(&dtype) {
                prop_assert_eq!(to_logical(&native), dtype);
            }
        }
    }
}
