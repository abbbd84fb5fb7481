//! Scalar value representation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DType, TimeUnit};

/// A single scalar value.
///
/// Literals, broadcast operands and reduction results are carried as
/// `Value`s between the neutral layer and the native engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Date (days since Unix epoch).
    Date(i32),
    /// Instant since the Unix epoch in `unit`, optionally zoned.
    Datetime {
        value: i64,
        unit: TimeUnit,
        tz: Option<String>,
    },
    /// Elapsed time in `unit`.
    Duration { value: i64, unit: TimeUnit },
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            Self::UInt64(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Try to get as f64, widening integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Self::Float64(f) => Some(*f),
            Self::Int64(i) => Some(*i as f64),
            Self::UInt64(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The logical dtype a literal of this value takes when no dtype is
    /// requested. `Null` has no natural dtype.
    pub fn natural_dtype(&self) -> Option<DType> {
        let dtype = match self {
            Self::Null => return None,
            Self::Bool(_) => DType::Boolean,
            Self::Int64(_) => DType::Int64,
            Self::UInt64(_) => DType::UInt64,
            Self::Float64(_) => DType::Float64,
            Self::String(_) => DType::String,
            Self::Date(_) => DType::Date,
            Self::Datetime { unit, tz, .. } => DType::datetime(*unit, tz.as_deref()),
            Self::Duration { unit, .. } => DType::duration(*unit),
        };
        Some(dtype)
    }

    /// Get the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::Datetime { .. } => "Datetime",
            Self::Duration { .. } => "Duration",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int64(i) => write!(f, "{i}"),
            Self::UInt64(u) => write!(f, "{u}"),
            Self::Float64(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Date(d) => write!(f, "date({d})"),
            Self::Datetime { value, unit, tz } => match tz {
                Some(tz) => write!(f, "datetime({value}{unit}, {tz})"),
                None => write!(f, "datetime({value}{unit})"),
            },
            Self::Duration { value, unit } => write!(f, "duration({value}{unit})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int64(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Self::UInt64(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(3).as_int64(), Some(3));
        assert_eq!(Value::UInt64(7).as_float64(), Some(7.0));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::UInt64(u64::MAX).as_int64(), None);
    }

    #[test]
    fn test_natural_dtype() {
        assert_eq!(Value::from(1.5).natural_dtype(), Some(DType::Float64));
        assert_eq!(Value::Null.natural_dtype(), None);
        let ts = Value::Datetime {
            value: 0,
            unit: TimeUnit::Millisecond,
            tz: Some("UTC".into()),
        };
        assert_eq!(
            ts.natural_dtype(),
            Some(DType::datetime(TimeUnit::Millisecond, Some("UTC")))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a").to_string(), "'a'");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::Duration {
                value: 5,
                unit: TimeUnit::Second
            }
            .to_string(),
            "duration(5s)"
        );
    }
}
