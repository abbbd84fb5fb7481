//! Dtype spellings of the row-labelled engine.
//!
//! A dtype is identified by its spelling, and the same logical dtype has up
//! to three spellings depending on the storage flavor of the column:
//!
//! | logical  | numpy            | nullable         | arrow-backed                  |
//! |----------|------------------|------------------|-------------------------------|
//! | Int64    | `int64`          | `Int64`          | `Int64[pyarrow]`              |
//! | String   | `str`            | `string`         | `string[pyarrow]`             |
//! | Boolean  | `bool`           | `boolean`        | `boolean[pyarrow]`            |
//! | Datetime | `datetime64[us]` | `datetime64[us]` | `timestamp[us][pyarrow]`      |
//! | Date     | -                | -                | `date32[day][pyarrow]`        |
//!
//! Nested types and decimals exist only in the arrow-backed flavor, spelled
//! with the Arrow type grammar (`list<item: int64>[pyarrow]`).

use std::fmt;

use arrow::array::{Array, ArrayRef};
use common_config::IndexedStorage;
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, DTypeClass, Field, TimeUnit, Value};

use crate::columnar;
use crate::compute::scalar::value_at;

const BACKEND: &str = "indexed";
const ARROW_SUFFIX: &str = "[pyarrow]";
const OBJECT: &str = "object";
const CATEGORY: &str = "category";

/// A dtype spelling, plus the first non-null value of the column when the
/// spelling is `object` (its logical dtype depends on what it holds).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDtype {
    pub spelling: String,
    pub first_valid: Option<Value>,
}

impl IndexedDtype {
    pub fn new(spelling: impl Into<String>) -> Self {
        Self {
            spelling: spelling.into(),
            first_valid: None,
        }
    }

    /// The spelling of a column holding `array` in `storage`.
    pub fn of(array: &ArrayRef, storage: IndexedStorage) -> Self {
        let logical = columnar::dtypes::to_logical(array.data_type());
        match from_logical(&logical, storage) {
            Ok(dtype) => dtype,
            Err(_) => Self {
                spelling: OBJECT.to_string(),
                first_valid: (0..array.len())
                    .find(|i| array.is_valid(*i))
                    .and_then(|i| value_at(array.as_ref(), i).ok()),
            },
        }
    }

    /// Storage flavor implied by the spelling.
    pub fn storage(&self) -> IndexedStorage {
        storage_of(&self.spelling)
    }
}

impl fmt::Display for IndexedDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling)
    }
}

/// Flat classes and their (numpy, nullable, arrow-backed) spellings.
const ROWS: &[(DTypeClass, &str, &str, &str)] = &[
    (DTypeClass::Int8, "int8", "Int8", "Int8[pyarrow]"),
    (DTypeClass::Int16, "int16", "Int16", "Int16[pyarrow]"),
    (DTypeClass::Int32, "int32", "Int32", "Int32[pyarrow]"),
    (DTypeClass::Int64, "int64", "Int64", "Int64[pyarrow]"),
    (DTypeClass::UInt8, "uint8", "UInt8", "UInt8[pyarrow]"),
    (DTypeClass::UInt16, "uint16", "UInt16", "UInt16[pyarrow]"),
    (DTypeClass::UInt32, "uint32", "UInt32", "UInt32[pyarrow]"),
    (DTypeClass::UInt64, "uint64", "UInt64", "UInt64[pyarrow]"),
    (DTypeClass::Float32, "float32", "Float32", "Float32[pyarrow]"),
    (DTypeClass::Float64, "float64", "Float64", "Float64[pyarrow]"),
    (DTypeClass::Boolean, "bool", "boolean", "boolean[pyarrow]"),
    (DTypeClass::String, "str", "string", "string[pyarrow]"),
];

/// Flat spellings of the Arrow type grammar.
const ARROW_FLAT: &[(&str, DTypeClass)] = &[
    ("int8", DTypeClass::Int8),
    ("int16", DTypeClass::Int16),
    ("int32", DTypeClass::Int32),
    ("int64", DTypeClass::Int64),
    ("uint8", DTypeClass::UInt8),
    ("uint16", DTypeClass::UInt16),
    ("uint32", DTypeClass::UInt32),
    ("uint64", DTypeClass::UInt64),
    ("float", DTypeClass::Float32),
    ("double", DTypeClass::Float64),
    ("bool", DTypeClass::Boolean),
    ("string", DTypeClass::String),
    ("large_string", DTypeClass::String),
    ("utf8", DTypeClass::String),
    ("large_utf8", DTypeClass::String),
    ("string_view", DTypeClass::String),
    ("date32[day]", DTypeClass::Date),
    ("date64[ms]", DTypeClass::Date),
];

/// Storage flavor of a spelling: `[pyarrow]` suffix, capitalized or
/// `string`/`boolean`, otherwise numpy.
pub fn storage_of(spelling: &str) -> IndexedStorage {
    if spelling.ends_with(ARROW_SUFFIX) {
        IndexedStorage::ArrowBacked
    } else if spelling.starts_with(|c: char| c.is_ascii_uppercase())
        || matches!(spelling, "string" | "boolean")
    {
        IndexedStorage::Nullable
    } else {
        IndexedStorage::Numpy
    }
}

/// Read path. Never fails.
pub fn to_logical(dtype: &IndexedDtype) -> DType {
    if dtype.spelling == OBJECT {
        return match &dtype.first_valid {
            Some(Value::String(_)) => DType::String,
            _ => DType::Object,
        };
    }
    parse(&dtype.spelling)
}

/// Logical dtype of a spelling; `object` reads as [`DType::Object`].
pub fn parse(spelling: &str) -> DType {
    let spelling = spelling.trim();
    if let Some((class, ..)) = ROWS
        .iter()
        .find(|(_, numpy, nullable, arrow)| [*numpy, *nullable, *arrow].contains(&spelling))
    {
        return class.default_dtype().unwrap_or(DType::Unknown);
    }
    match spelling {
        OBJECT => return DType::Object,
        CATEGORY => return DType::Categorical,
        "string[python]" => return DType::String,
        _ => {}
    }
    if let Some(inner) = bracketed(spelling, "datetime64[") {
        return match inner.split_once(',') {
            Some((unit, tz)) => datetime(unit, Some(tz.trim())),
            None => datetime(inner, None),
        };
    }
    if let Some(unit) = bracketed(spelling, "timedelta64[") {
        return unit
            .parse::<TimeUnit>()
            .map_or(DType::Unknown, DType::duration);
    }
    parse_arrow(spelling.strip_suffix(ARROW_SUFFIX).unwrap_or(spelling))
}

/// `rest` of `s` between `prefix` and a closing `]`.
fn bracketed<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?.strip_suffix(']')
}

fn datetime(unit: &str, tz: Option<&str>) -> DType {
    match unit.trim().parse::<TimeUnit>() {
        Ok(unit) => DType::datetime(unit, tz),
        Err(_) => DType::Unknown,
    }
}

/// Split `s` at commas that are not nested inside `<>`, `[]` or `()`.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth -= 1,
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

fn parse_field(s: &str) -> Option<Field> {
    let (name, dtype) = s.split_once(": ")?;
    Some(Field::new(name.trim(), parse_arrow(dtype)))
}

fn parse_arrow(s: &str) -> DType {
    let s = s.trim();
    if let Some((_, class)) = ARROW_FLAT.iter().find(|(spelling, _)| *spelling == s) {
        return class.default_dtype().unwrap_or(DType::Unknown);
    }
    if s.starts_with("dictionary<") {
        return DType::Categorical;
    }
    if s.starts_with("decimal128(") || s.starts_with("decimal256(") {
        return DType::Decimal;
    }
    if let Some(inner) = bracketed(s, "timestamp[") {
        return match inner.split_once(", tz=") {
            Some((unit, tz)) => datetime(unit, Some(tz)),
            None => datetime(inner, None),
        };
    }
    if let Some(unit) = bracketed(s, "duration[") {
        return unit
            .parse::<TimeUnit>()
            .map_or(DType::Unknown, DType::duration);
    }
    if let Some(field) = s
        .strip_prefix("list<")
        .or_else(|| s.strip_prefix("large_list<"))
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return parse_field(field).map_or(DType::Unknown, |f| DType::list(f.dtype));
    }
    if let Some(rest) = s.strip_prefix("fixed_size_list<") {
        let Some(open) = rest.rfind(">[") else {
            return DType::Unknown;
        };
        let size = rest[open + 2..]
            .strip_suffix(']')
            .and_then(|n| n.parse::<usize>().ok());
        return match (parse_field(&rest[..open]), size) {
            (Some(field), Some(size)) => DType::array(field.dtype, size),
            _ => DType::Unknown,
        };
    }
    if let Some(body) = s.strip_prefix("struct<").and_then(|rest| rest.strip_suffix('>')) {
        let fields: Option<Vec<Field>> = split_top_level(body).into_iter().map(parse_field).collect();
        return fields.map_or(DType::Unknown, DType::structure);
    }
    DType::Unknown
}

/// The Arrow type grammar spelling of `dtype`, without the suffix.
fn arrow_spelling(dtype: &DType) -> TesseraResult<String> {
    if let Some((spelling, _)) = ARROW_FLAT.iter().find(|(_, class)| *dtype == *class) {
        return Ok((*spelling).to_string());
    }
    Ok(match dtype {
        DType::Categorical => "dictionary<values=string, indices=int32, ordered=0>".to_string(),
        DType::Datetime {
            time_unit,
            time_zone: Some(tz),
        } => format!("timestamp[{time_unit}, tz={tz}]"),
        DType::Datetime { time_unit, .. } => format!("timestamp[{time_unit}]"),
        DType::Duration { time_unit } => format!("duration[{time_unit}]"),
        DType::Decimal => format!(
            "decimal128({}, {})",
            columnar::dtypes::DECIMAL_PRECISION,
            columnar::dtypes::DECIMAL_SCALE
        ),
        DType::List(inner) => format!("list<item: {}>", arrow_spelling(inner)?),
        DType::Array { inner, size } => {
            format!("fixed_size_list<item: {}>[{size}]", arrow_spelling(inner)?)
        }
        DType::Struct(fields) => format!(
            "struct<{}>",
            fields
                .iter()
                .map(|f| Ok(format!("{}: {}", f.name, arrow_spelling(&f.dtype)?)))
                .collect::<TesseraResult<Vec<_>>>()?
                .join(", ")
        ),
        other => return Err(TesseraError::unsupported_dtype(other, BACKEND)),
    })
}

/// Write path: the spelling of `dtype` in `storage`.
pub fn from_logical(dtype: &DType, storage: IndexedStorage) -> TesseraResult<IndexedDtype> {
    if let Some((_, numpy, nullable, arrow)) = ROWS.iter().find(|(class, ..)| *dtype == *class) {
        return Ok(IndexedDtype::new(match storage {
            IndexedStorage::Numpy => *numpy,
            IndexedStorage::Nullable => *nullable,
            IndexedStorage::ArrowBacked => *arrow,
        }));
    }
    let arrow = storage == IndexedStorage::ArrowBacked;
    let spelling = match dtype {
        DType::Object => OBJECT.to_string(),
        DType::Categorical => CATEGORY.to_string(),
        DType::Datetime { .. } | DType::Duration { .. } if arrow => {
            format!("{}{ARROW_SUFFIX}", arrow_spelling(dtype)?)
        }
        DType::Datetime {
            time_unit,
            time_zone: Some(tz),
        } => format!("datetime64[{time_unit}, {tz}]"),
        DType::Datetime { time_unit, .. } => format!("datetime64[{time_unit}]"),
        DType::Duration { time_unit } => format!("timedelta64[{time_unit}]"),
        DType::Date | DType::Decimal | DType::List(_) | DType::Array { .. } | DType::Struct(_)
            if arrow =>
        {
            format!("{}{ARROW_SUFFIX}", arrow_spelling(dtype)?)
        }
        other => return Err(TesseraError::unsupported_dtype(other, BACKEND)),
    };
    Ok(IndexedDtype::new(spelling))
}
