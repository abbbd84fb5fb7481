//! Operation vocabulary shared by the neutral IR and every backend.
//!
//! These enums name *what* to compute. Each backend decides how: the
//! columnar engines dispatch to Arrow kernels, the SQL engine renders them
//! as SQL function calls.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tessera_core::{DType, Value};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic operators
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// True division (/), always floating point
    TrueDiv,
    /// Floor division (//)
    FloorDiv,
    /// Modulo (%)
    Mod,
    /// Exponentiation (**)
    Pow,

    // Comparison operators
    /// Equality (==)
    Eq,
    /// Inequality (!=)
    NotEq,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    LtEq,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    GtEq,

    // Logical operators (Kleene logic)
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOp {
    /// Check if this is an arithmetic operator.
    pub const fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::TrueDiv
                | Self::FloorDiv
                | Self::Mod
                | Self::Pow
        )
    }

    /// Check if this is a comparison operator.
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    /// Check if this is a logical operator.
    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Label used in operation-name chains.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Add => "__add__",
            Self::Sub => "__sub__",
            Self::Mul => "__mul__",
            Self::TrueDiv => "__truediv__",
            Self::FloorDiv => "__floordiv__",
            Self::Mod => "__mod__",
            Self::Pow => "__pow__",
            Self::Eq => "__eq__",
            Self::NotEq => "__ne__",
            Self::Lt => "__lt__",
            Self::LtEq => "__le__",
            Self::Gt => "__gt__",
            Self::GtEq => "__ge__",
            Self::And => "__and__",
            Self::Or => "__or__",
        }
    }

    /// Infix symbol, as the SQL engine renders it.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Parse an infix symbol back into an operator.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        ALL_BINARY_OPS
            .iter()
            .copied()
            .find(|op| op.symbol().eq_ignore_ascii_case(symbol))
    }
}

const ALL_BINARY_OPS: [BinaryOp; 15] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::TrueDiv,
    BinaryOp::FloorDiv,
    BinaryOp::Mod,
    BinaryOp::Pow,
    BinaryOp::Eq,
    BinaryOp::NotEq,
    BinaryOp::Lt,
    BinaryOp::LtEq,
    BinaryOp::Gt,
    BinaryOp::GtEq,
    BinaryOp::And,
    BinaryOp::Or,
];

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A quantile level. Compared and hashed by bit pattern so that aggregates
/// stay usable as map keys; range checks happen when the quantile is computed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Probability(f64);

impl Probability {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Probability {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Probability {}

impl Hash for Probability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// How a quantile falling between two values is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QuantileMethod {
    Nearest,
    Higher,
    Lower,
    Midpoint,
    #[default]
    Linear,
}

impl QuantileMethod {
    pub const ALL: [QuantileMethod; 5] = [
        QuantileMethod::Nearest,
        QuantileMethod::Higher,
        QuantileMethod::Lower,
        QuantileMethod::Midpoint,
        QuantileMethod::Linear,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Higher => "higher",
            Self::Lower => "lower",
            Self::Midpoint => "midpoint",
            Self::Linear => "linear",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Aggregate (reducing) functions.
///
/// Every aggregate produces exactly one value per input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    /// Sum of values
    Sum,
    /// Arithmetic mean
    Mean,
    /// Median
    Median,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Standard deviation with `ddof` delta degrees of freedom
    Std { ddof: u8 },
    /// Variance with `ddof` delta degrees of freedom
    Var { ddof: u8 },
    /// Count of non-null values
    Count,
    /// Number of rows, nulls included
    Len,
    /// Number of distinct values (null counts as a value)
    NUnique,
    /// Number of nulls
    NullCount,
    /// Whether any value is true
    Any,
    /// Whether all values are true
    All,
    /// First value
    First,
    /// Last value
    Last,
    /// Quantile of the non-null values
    Quantile {
        quantile: Probability,
        method: QuantileMethod,
    },
}

impl AggFunc {
    /// Every aggregate, with the default `ddof` of 1 and the median as the
    /// default quantile.
    pub const ALL: [AggFunc; 16] = [
        AggFunc::Sum,
        AggFunc::Mean,
        AggFunc::Median,
        AggFunc::Min,
        AggFunc::Max,
        AggFunc::Std { ddof: 1 },
        AggFunc::Var { ddof: 1 },
        AggFunc::Count,
        AggFunc::Len,
        AggFunc::NUnique,
        AggFunc::NullCount,
        AggFunc::Any,
        AggFunc::All,
        AggFunc::First,
        AggFunc::Last,
        AggFunc::Quantile {
            quantile: Probability::new(0.5),
            method: QuantileMethod::Linear,
        },
    ];

    /// Get the neutral name of this aggregate function.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Std { .. } => "std",
            Self::Var { .. } => "var",
            Self::Count => "count",
            Self::Len => "len",
            Self::NUnique => "n_unique",
            Self::NullCount => "null_count",
            Self::Any => "any",
            Self::All => "all",
            Self::First => "first",
            Self::Last => "last",
            Self::Quantile { .. } => "quantile",
        }
    }

    /// Look an aggregate up by its neutral name.
    pub fn from_name(name: &str, ddof: u8) -> Option<Self> {
        let func = Self::ALL.into_iter().find(|f| f.name() == name)?;
        Some(match func {
            Self::Std { .. } => Self::Std { ddof },
            Self::Var { .. } => Self::Var { ddof },
            other => other,
        })
    }

    /// Keyword arguments that parameterize this aggregate.
    pub fn kwargs(&self) -> Vec<(String, Value)> {
        match self {
            Self::Std { ddof } | Self::Var { ddof } => {
                vec![("ddof".to_string(), Value::Int64(i64::from(*ddof)))]
            }
            Self::Quantile { quantile, method } => vec![
                ("quantile".to_string(), Value::Float64(quantile.get())),
                ("interpolation".to_string(), Value::from(method.name())),
            ],
            _ => Vec::new(),
        }
    }

    /// Delta degrees of freedom, for the dispersion aggregates.
    pub const fn ddof(&self) -> Option<u8> {
        match self {
            Self::Std { ddof } | Self::Var { ddof } => Some(*ddof),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// String functions applied element by element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrFunction {
    /// Whether the value contains the literal pattern.
    Contains(String),
    /// Whether the value starts with the prefix.
    StartsWith(String),
    /// Whether the value ends with the suffix.
    EndsWith(String),
    ToUppercase,
    ToLowercase,
    /// Length in characters.
    LenChars,
    /// Replace every occurrence of a literal pattern.
    ReplaceAll { pattern: String, value: String },
    /// Substring by character offset; a negative offset counts from the end.
    Slice { offset: i64, length: Option<usize> },
}

impl StrFunction {
    /// Label used in operation-name chains.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Contains(_) => "str.contains",
            Self::StartsWith(_) => "str.starts_with",
            Self::EndsWith(_) => "str.ends_with",
            Self::ToUppercase => "str.to_uppercase",
            Self::ToLowercase => "str.to_lowercase",
            Self::LenChars => "str.len_chars",
            Self::ReplaceAll { .. } => "str.replace_all",
            Self::Slice { .. } => "str.slice",
        }
    }
}

/// Temporal field extraction, and whole-unit totals of durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtFunction {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    TotalMinutes,
    TotalSeconds,
    TotalMilliseconds,
    TotalMicroseconds,
    TotalNanoseconds,
}

impl DtFunction {
    /// Label used in operation-name chains.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Year => "dt.year",
            Self::Month => "dt.month",
            Self::Day => "dt.day",
            Self::Hour => "dt.hour",
            Self::Minute => "dt.minute",
            Self::Second => "dt.second",
            Self::TotalMinutes => "dt.total_minutes",
            Self::TotalSeconds => "dt.total_seconds",
            Self::TotalMilliseconds => "dt.total_milliseconds",
            Self::TotalMicroseconds => "dt.total_microseconds",
            Self::TotalNanoseconds => "dt.total_nanoseconds",
        }
    }

    /// Nanoseconds in one unit of a duration total; `None` for field
    /// extraction.
    pub const fn total_unit_nanos(&self) -> Option<i64> {
        match self {
            Self::TotalMinutes => Some(60_000_000_000),
            Self::TotalSeconds => Some(1_000_000_000),
            Self::TotalMilliseconds => Some(1_000_000),
            Self::TotalMicroseconds => Some(1_000),
            Self::TotalNanoseconds => Some(1),
            _ => None,
        }
    }

    /// Bare field name (`year`, `month`, ...).
    pub fn field(&self) -> &'static str {
        let label = self.label();
        &label[3..]
    }
}

/// Length-preserving operations on a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Elementwise {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Neg,
    Abs,
    /// Round to the given number of decimals.
    Round(u32),
    /// Cast to a logical dtype.
    Cast(DType),
    IsNull,
    IsNotNull,
    IsNan,
    /// Membership test against a fixed set of values.
    IsIn(Vec<Value>),
    /// Running sum, nulls skipped.
    CumSum,
    /// Whether the value occurs exactly once; null counts as a value.
    IsUnique,
    /// Whether this is the first occurrence of the value.
    IsFirstDistinct,
    /// Whether this is the last occurrence of the value.
    IsLastDistinct,
    Str(StrFunction),
    Dt(DtFunction),
}

impl Elementwise {
    /// Label used in operation-name chains.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Not => "__invert__",
            Self::Neg => "__neg__",
            Self::Abs => "abs",
            Self::Round(_) => "round",
            Self::Cast(_) => "cast",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::IsNan => "is_nan",
            Self::IsIn(_) => "is_in",
            Self::CumSum => "cum_sum",
            Self::IsUnique => "is_unique",
            Self::IsFirstDistinct => "is_first_distinct",
            Self::IsLastDistinct => "is_last_distinct",
            Self::Str(f) => f.label(),
            Self::Dt(f) => f.label(),
        }
    }

    /// Whether a value depends on the rest of the column, so the column
    /// cannot be processed piece by piece.
    pub const fn needs_whole_column(&self) -> bool {
        matches!(
            self,
            Self::CumSum | Self::IsUnique | Self::IsFirstDistinct | Self::IsLastDistinct
        )
    }
}

/// Operations that change the length or order of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reshape {
    Head(usize),
    Tail(usize),
    /// Shift values by `n` positions, filling with nulls.
    Shift(i64),
    DropNulls,
    Sort { descending: bool },
}

impl Reshape {
    /// Label used in operation-name chains.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Head(_) => "head",
            Self::Tail(_) => "tail",
            Self::Shift(_) => "shift",
            Self::DropNulls => "drop_nulls",
            Self::Sort { .. } => "sort",
        }
    }
}

/// Which ends of an `is_between` interval are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ClosedInterval {
    #[default]
    Both,
    Left,
    Right,
    None,
}

impl ClosedInterval {
    /// Operators comparing a value against the lower and upper bound.
    pub const fn operators(self) -> (BinaryOp, BinaryOp) {
        match self {
            Self::Both => (BinaryOp::GtEq, BinaryOp::LtEq),
            Self::Left => (BinaryOp::GtEq, BinaryOp::Lt),
            Self::Right => (BinaryOp::Gt, BinaryOp::LtEq),
            Self::None => (BinaryOp::Gt, BinaryOp::Lt),
        }
    }
}
