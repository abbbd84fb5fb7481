//! Logical dtype definitions.

use std::fmt;
use std::str::FromStr;

use common_error::{TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};

/// Resolution of a datetime or duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeUnit {
    /// Nanoseconds.
    #[serde(rename = "ns")]
    Nanosecond,
    /// Microseconds.
    #[default]
    #[serde(rename = "us")]
    Microsecond,
    /// Milliseconds.
    #[serde(rename = "ms")]
    Millisecond,
    /// Seconds.
    #[serde(rename = "s")]
    Second,
}

impl TimeUnit {
    /// All units, finest first.
    pub const ALL: [TimeUnit; 4] = [
        TimeUnit::Nanosecond,
        TimeUnit::Microsecond,
        TimeUnit::Millisecond,
        TimeUnit::Second,
    ];

    /// Short spelling (`ns`, `us`, `ms`, `s`).
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Nanosecond => "ns",
            TimeUnit::Microsecond => "us",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = TesseraError;

    fn from_str(s: &str) -> TesseraResult<Self> {
        match s {
            "ns" => Ok(TimeUnit::Nanosecond),
            "us" => Ok(TimeUnit::Microsecond),
            "ms" => Ok(TimeUnit::Millisecond),
            "s" => Ok(TimeUnit::Second),
            other => Err(TesseraError::invalid_parameter(format!(
                "invalid `time_unit`: expected one of {{'ns', 'us', 'ms', 's'}}, got '{other}'"
            ))),
        }
    }
}

/// A named field of a struct dtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field dtype.
    pub dtype: DType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Logical column type, shared by every backend.
///
/// Equality is structural. A parameterized variant additionally compares
/// equal to its bare [`DTypeClass`], so `DType::datetime(Nanosecond, None) ==
/// DTypeClass::Datetime` holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    String,
    Categorical,
    Enum,
    Date,
    Datetime {
        time_unit: TimeUnit,
        time_zone: Option<String>,
    },
    Duration {
        time_unit: TimeUnit,
    },
    List(Box<DType>),
    Struct(Vec<Field>),
    Array {
        inner: Box<DType>,
        size: usize,
    },
    Decimal,
    Object,
    Unknown,
}

impl DType {
    /// Datetime with the given unit and optional time zone.
    pub fn datetime(time_unit: TimeUnit, time_zone: Option<&str>) -> Self {
        Self::Datetime {
            time_unit,
            time_zone: time_zone.map(str::to_string),
        }
    }

    /// Duration with the given unit.
    pub const fn duration(time_unit: TimeUnit) -> Self {
        Self::Duration { time_unit }
    }

    /// Variable-length list of `inner`.
    pub fn list(inner: DType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Fixed-size array of `inner`.
    pub fn array(inner: DType, size: usize) -> Self {
        Self::Array {
            inner: Box::new(inner),
            size,
        }
    }

    /// Struct with the given fields.
    pub fn structure(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Struct(fields.into_iter().collect())
    }

    /// The bare class of this dtype.
    pub const fn class(&self) -> DTypeClass {
        match self {
            Self::Int8 => DTypeClass::Int8,
            Self::Int16 => DTypeClass::Int16,
            Self::Int32 => DTypeClass::Int32,
            Self::Int64 => DTypeClass::Int64,
            Self::UInt8 => DTypeClass::UInt8,
            Self::UInt16 => DTypeClass::UInt16,
            Self::UInt32 => DTypeClass::UInt32,
            Self::UInt64 => DTypeClass::UInt64,
            Self::Float32 => DTypeClass::Float32,
            Self::Float64 => DTypeClass::Float64,
            Self::Boolean => DTypeClass::Boolean,
            Self::String => DTypeClass::String,
            Self::Categorical => DTypeClass::Categorical,
            Self::Enum => DTypeClass::Enum,
            Self::Date => DTypeClass::Date,
            Self::Datetime { .. } => DTypeClass::Datetime,
            Self::Duration { .. } => DTypeClass::Duration,
            Self::List(_) => DTypeClass::List,
            Self::Struct(_) => DTypeClass::Struct,
            Self::Array { .. } => DTypeClass::Array,
            Self::Decimal => DTypeClass::Decimal,
            Self::Object => DTypeClass::Object,
            Self::Unknown => DTypeClass::Unknown,
        }
    }

    /// Check if this type is numeric (integer or float).
    pub const fn is_numeric(&self) -> bool {
        self.class().is_numeric()
    }

    /// Check if this type is a signed or unsigned integer.
    pub const fn is_integer(&self) -> bool {
        self.class().is_integer()
    }

    /// Check if this type is a float.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Check if this type is temporal.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Datetime { .. } | Self::Duration { .. }
        )
    }

    /// Check if this type nests other types.
    pub const fn is_nested(&self) -> bool {
        matches!(self, Self::List(_) | Self::Struct(_) | Self::Array { .. })
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datetime {
                time_unit,
                time_zone,
            } => match time_zone {
                Some(tz) => write!(f, "Datetime(time_unit='{time_unit}', time_zone='{tz}')"),
                None => write!(f, "Datetime(time_unit='{time_unit}', time_zone=None)"),
            },
            Self::Duration { time_unit } => write!(f, "Duration(time_unit='{time_unit}')"),
            Self::List(inner) => write!(f, "List({inner})"),
            Self::Array { inner, size } => write!(f, "Array({inner}, {size})"),
            Self::Struct(fields) => {
                f.write_str("Struct({")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}': {}", field.name, field.dtype)?;
                }
                f.write_str("})")
            }
            other => write!(f, "{}", other.class()),
        }
    }
}

/// Bare dtype classes, used for matching without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DTypeClass {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    String,
    Categorical,
    Enum,
    Date,
    Datetime,
    Duration,
    List,
    Struct,
    Array,
    Decimal,
    Object,
    Unknown,
}

impl DTypeClass {
    /// Check if this class is numeric (integer or float).
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Self::Float32 | Self::Float64)
    }

    /// Check if this class is a signed or unsigned integer.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// The dtype of a class that carries no parameters, or the default
    /// parameterization for datetime and duration. Nested classes have no
    /// default.
    pub fn default_dtype(self) -> Option<DType> {
        let dtype = match self {
            Self::Int8 => DType::Int8,
            Self::Int16 => DType::Int16,
            Self::Int32 => DType::Int32,
            Self::Int64 => DType::Int64,
            Self::UInt8 => DType::UInt8,
            Self::UInt16 => DType::UInt16,
            Self::UInt32 => DType::UInt32,
            Self::UInt64 => DType::UInt64,
            Self::Float32 => DType::Float32,
            Self::Float64 => DType::Float64,
            Self::Boolean => DType::Boolean,
            Self::String => DType::String,
            Self::Categorical => DType::Categorical,
            Self::Enum => DType::Enum,
            Self::Date => DType::Date,
            Self::Datetime => DType::datetime(TimeUnit::default(), None),
            Self::Duration => DType::duration(TimeUnit::default()),
            Self::Decimal => DType::Decimal,
            Self::Object => DType::Object,
            Self::Unknown => DType::Unknown,
            Self::List | Self::Struct | Self::Array => return None,
        };
        Some(dtype)
    }
}

impl fmt::Display for DTypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PartialEq<DTypeClass> for DType {
    fn eq(&self, other: &DTypeClass) -> bool {
        self.class() == *other
    }
}

impl PartialEq<DType> for DTypeClass {
    fn eq(&self, other: &DType) -> bool {
        *self == other.class()
    }
}

/// Either a fully specified dtype or a bare class.
///
/// Used where callers may match loosely, such as dtype selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DTypeLike {
    /// Matches exactly this dtype.
    Exact(DType),
    /// Matches every dtype of this class.
    Class(DTypeClass),
}

impl DTypeLike {
    /// Whether `dtype` satisfies this pattern.
    pub fn matches(&self, dtype: &DType) -> bool {
        match self {
            Self::Exact(expected) => expected == dtype,
            Self::Class(class) => dtype == class,
        }
    }
}

impl From<DType> for DTypeLike {
    fn from(dtype: DType) -> Self {
        Self::Exact(dtype)
    }
}

impl From<DTypeClass> for DTypeLike {
    fn from(class: DTypeClass) -> Self {
        Self::Class(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameterized_equals_bare_class() {
        let dt = DType::datetime(TimeUnit::Nanosecond, Some("Europe/Rome"));
        assert_eq!(dt, DTypeClass::Datetime);
        assert_eq!(DTypeClass::Datetime, dt);
        assert_ne!(dt, DTypeClass::Date);
        assert_eq!(DType::duration(TimeUnit::Second), DTypeClass::Duration);
    }

    #[test]
    fn test_structural_equality() {
        assert_ne!(
            DType::datetime(TimeUnit::Nanosecond, None),
            DType::datetime(TimeUnit::Microsecond, None)
        );
        assert_eq!(DType::list(DType::Int64), DType::list(DType::Int64));
        assert_ne!(DType::list(DType::Int64), DType::list(DType::Float64));
        assert_ne!(DType::array(DType::Int8, 2), DType::array(DType::Int8, 3));
    }

    #[test]
    fn test_invalid_time_unit() {
        let err = "abc".parse::<TimeUnit>().unwrap_err();
        assert!(err.to_string().contains("invalid `time_unit`"));
        assert_eq!("ms".parse::<TimeUnit>().unwrap(), TimeUnit::Millisecond);
    }

    #[test]
    fn test_display() {
        assert_eq!(DType::Int64.to_string(), "Int64");
        assert_eq!(
            DType::datetime(TimeUnit::Millisecond, Some("UTC")).to_string(),
            "Datetime(time_unit='ms', time_zone='UTC')"
        );
        assert_eq!(
            DType::structure([Field::new("a", DType::list(DType::String))]).to_string(),
            "Struct({'a': List(String)})"
        );
    }

    #[test]
    fn test_dtype_like_matching() {
        let naive = DTypeLike::from(DType::datetime(TimeUnit::Microsecond, None));
        assert!(naive.matches(&DType::datetime(TimeUnit::Microsecond, None)));
        assert!(!naive.matches(&DType::datetime(TimeUnit::Nanosecond, None)));

        let any_datetime = DTypeLike::from(DTypeClass::Datetime);
        assert!(any_datetime.matches(&DType::datetime(TimeUnit::Nanosecond, Some("UTC"))));
    }

    #[test]
    fn test_classification() {
        assert!(DType::UInt16.is_numeric());
        assert!(DType::Float32.is_numeric());
        assert!(!DType::Boolean.is_numeric());
        assert!(DType::Date.is_temporal());
        assert!(DType::array(DType::Int8, 1).is_nested());
        assert_eq!(DTypeClass::List.default_dtype(), None);
        assert_eq!(
            DTypeClass::Duration.default_dtype(),
            Some(DType::duration(TimeUnit::Microsecond))
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let dt = DType::structure([
            Field::new("ts", DType::datetime(TimeUnit::Second, Some("UTC"))),
            Field::new("xs", DType::array(DType::Float32, 4)),
        ]);
        let json = serde_json::to_string(&dt).unwrap();
        assert_eq!(serde_json::from_str::<DType>(&json).unwrap(), dt);
    }
}
