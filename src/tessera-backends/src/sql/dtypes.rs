//! SQL type names.

use arrow::datatypes::DataType;
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, DTypeClass, Field, TimeUnit};

use crate::columnar;

const BACKEND: &str = "sql";
const TIMESTAMP_TZ: &str = "TIMESTAMP WITH TIME ZONE";
const UTC: &str = "UTC";

const FLAT: &[(DTypeClass, &str)] = &[
    (DTypeClass::Int8, "TINYINT"),
    (DTypeClass::Int16, "SMALLINT"),
    (DTypeClass::Int32, "INTEGER"),
    (DTypeClass::Int64, "BIGINT"),
    (DTypeClass::UInt8, "UTINYINT"),
    (DTypeClass::UInt16, "USMALLINT"),
    (DTypeClass::UInt32, "UINTEGER"),
    (DTypeClass::UInt64, "UBIGINT"),
    (DTypeClass::Float32, "FLOAT"),
    (DTypeClass::Float64, "DOUBLE"),
    (DTypeClass::Boolean, "BOOLEAN"),
    (DTypeClass::String, "VARCHAR"),
    (DTypeClass::Date, "DATE"),
];

const TIMESTAMPS: &[(TimeUnit, &str)] = &[
    (TimeUnit::Nanosecond, "TIMESTAMP_NS"),
    (TimeUnit::Microsecond, "TIMESTAMP"),
    (TimeUnit::Millisecond, "TIMESTAMP_MS"),
    (TimeUnit::Second, "TIMESTAMP_S"),
];

/// Split at commas outside parentheses and brackets.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// Read path. Never fails.
pub fn to_logical(name: &str) -> DType {
    let name = name.trim();
    let upper = name.to_ascii_uppercase();
    if let Some((class, _)) = FLAT.iter().find(|(_, n)| *n == upper) {
        return class.default_dtype().unwrap_or(DType::Unknown);
    }
    if let Some((unit, _)) = TIMESTAMPS.iter().find(|(_, n)| *n == upper) {
        return DType::datetime(*unit, None);
    }
    match upper.as_str() {
        TIMESTAMP_TZ | "TIMESTAMPTZ" => return DType::datetime(TimeUnit::Microsecond, Some(UTC)),
        "INTERVAL" => return DType::duration(TimeUnit::Microsecond),
        _ => {}
    }
    // Suffixes bind last, so `DECIMAL(38,10)[]` is a list.
    if let Some(inner) = name.strip_suffix("[]") {
        return DType::list(to_logical(inner));
    }
    if let (Some(open), true) = (name.rfind('['), name.ends_with(']')) {
        return name[open + 1..name.len() - 1]
            .parse::<usize>()
            .map_or(DType::Unknown, |size| DType::array(to_logical(&name[..open]), size));
    }
    if upper.starts_with("DECIMAL(") || upper == "DECIMAL" {
        return DType::Decimal;
    }
    if upper.starts_with("ENUM(") {
        return DType::Enum;
    }
    if upper.starts_with("STRUCT(") && name.ends_with(')') {
        let body = &name["STRUCT(".len()..name.len() - 1];
        let fields: Option<Vec<Field>> = split_top_level(body)
            .into_iter()
            .map(|field| {
                let (field_name, dtype) = field.split_once(' ')?;
                Some(Field::new(field_name.trim_matches('"'), to_logical(dtype)))
            })
            .collect();
        return fields.map_or(DType::Unknown, DType::structure);
    }
    DType::Unknown
}

/// Write path.
pub fn from_logical(dtype: &DType) -> TesseraResult<String> {
    if let Some((_, name)) = FLAT.iter().find(|(class, _)| *dtype == *class) {
        return Ok((*name).to_string());
    }
    let unsupported = || TesseraError::unsupported_dtype(dtype, BACKEND);
    Ok(match dtype {
        DType::Datetime {
            time_unit,
            time_zone: None,
        } => TIMESTAMPS
            .iter()
            .find(|(unit, _)| unit == time_unit)
            .map(|(_, name)| (*name).to_string())
            .ok_or_else(unsupported)?,
        DType::Datetime {
            time_unit: TimeUnit::Microsecond,
            time_zone: Some(tz),
        } if tz == UTC => TIMESTAMP_TZ.to_string(),
        DType::Duration {
            time_unit: TimeUnit::Microsecond,
        } => "INTERVAL".to_string(),
        DType::Decimal => format!(
            "DECIMAL({},{})",
            columnar::dtypes::DECIMAL_PRECISION,
            columnar::dtypes::DECIMAL_SCALE
        ),
        DType::List(inner) => format!("{}[]", from_logical(inner)?),
        DType::Array { inner, size } => format!("{}[{size}]", from_logical(inner)?),
        DType::Struct(fields) => format!(
            "STRUCT({})",
            fields
                .iter()
                .map(|f| Ok(format!("{} {}", f.name, from_logical(&f.dtype)?)))
                .collect::<TesseraResult<Vec<_>>>()?
                .join(", ")
        ),
        _ => return Err(unsupported()),
    })
}

/// SQL type name of an Arrow type.
pub fn name_of(data_type: &DataType) -> TesseraResult<String> {
    from_logical(&columnar::dtypes::to_logical(data_type))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tessera_core::testing::arb_dtype;

    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(from_logical(&DType::Int64).unwrap(), "BIGINT");
        assert_eq!(
            from_logical(&DType::datetime(TimeUnit::Nanosecond, None)).unwrap(),
            "TIMESTAMP_NS"
        );
        assert_eq!(
            from_logical(&DType::datetime(TimeUnit::Microsecond, Some("UTC"))).unwrap(),
            TIMESTAMP_TZ
        );
        assert_eq!(
            from_logical(&DType::structure([
                Field::new("a", DType::list(DType::Int32)),
                Field::new("b", DType::array(DType::Float64, 2)),
            ]))
            .unwrap(),
            "STRUCT(a INTEGER[], b DOUBLE[2])"
        );
    }

    #[test]
    fn test_nested_decimals_roundtrip() {
        for dtype in [
            DType::list(DType::Decimal),
            DType::array(DType::Decimal, 2),
            DType::structure([Field::new("d", DType::list(DType::Decimal))]),
        ] {
            let native = from_logical(&dtype).unwrap();
            assert_eq!(to_logical(&native), dtype, "{native}");
        }
    }

    #[test]
    fn test_not_writable() {
        for dtype in [
            DType::Categorical,
            DType::Enum,
            DType::Object,
            DType::Unknown,
            DType::datetime(TimeUnit::Microsecond, Some("Europe/Rome")),
            DType::duration(TimeUnit::Second),
        ] {
            assert!(matches!(
                from_logical(&dtype),
                Err(TesseraError::UnknownDtype(_))
            ));
        }
    }

    #[test]
    fn test_read_only_names() {
        assert_eq!(to_logical("ENUM('a', 'b')"), DType::Enum);
        assert_eq!(to_logical("HUGEINT"), DType::Unknown);
        assert_eq!(to_logical("decimal(18,3)"), DType::Decimal);
        assert_eq!(to_logical("BIGINT[3][]"), DType::list(DType::array(DType::Int64, 3)));
        assert_eq!(to_logical("DECIMAL(38,10)[]"), DType::list(DType::Decimal));
        assert_eq!(to_logical("DECIMAL(38,10)[4]"), DType::array(DType::Decimal, 4));
        assert_eq!(to_logical("ENUM('a', 'b')[]"), DType::list(DType::Enum));
        assert_eq!(
            to_logical("STRUCT(x TIMESTAMP WITH TIME ZONE)"),
            DType::structure([Field::new(
                "x",
                DType::datetime(TimeUnit::Microsecond, Some("UTC"))
            )])
        );
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
