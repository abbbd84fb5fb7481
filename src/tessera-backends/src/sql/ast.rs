//! SQL expressions.
//!
//! Columns of the SQL backend are expression trees over the columns of a
//! relation. A tree renders as SQL text and is evaluated by the engine in
//! [`super::engine`].

use std::fmt;

use common_error::{TesseraError, TesseraResult};
use tessera_core::{TimeUnit, Value};
use tessera_expr::compliant::Backend;
use tessera_expr::expr::{AggFunc, BinaryOp, DtFunction, Elementwise, QuantileMethod, StrFunction};

use super::dtypes::from_logical;
use super::Sql;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Column(String),
    Literal(Value),
    Binary {
        op: BinaryOp,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    Function {
        op: Elementwise,
        input: Box<SqlExpr>,
    },
    /// An aggregate; `window` aggregates over the whole relation and
    /// repeats the result on every row (`OVER ()`).
    Aggregate {
        func: AggFunc,
        input: Box<SqlExpr>,
        window: bool,
    },
    Coalesce(Box<SqlExpr>, Box<SqlExpr>),
    /// `CASE WHEN predicate THEN then ELSE otherwise END`.
    Case {
        predicate: Box<SqlExpr>,
        then: Box<SqlExpr>,
        otherwise: Box<SqlExpr>,
    },
    /// The rows of `input` where `predicate` holds. Under an aggregate it
    /// renders as the aggregate's `FILTER (WHERE ..)` clause.
    Filter {
        input: Box<SqlExpr>,
        predicate: Box<SqlExpr>,
    },
    Concat {
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
        separator: String,
    },
}

impl SqlExpr {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function(op: Elementwise, input: Self) -> Self {
        Self::Function {
            op,
            input: Box::new(input),
        }
    }

    pub fn aggregate(func: AggFunc, input: Self) -> Self {
        Self::Aggregate {
            func,
            input: Box::new(input),
            window: false,
        }
    }

    pub fn case(predicate: Self, then: Self, otherwise: Self) -> Self {
        Self::Case {
            predicate: Box::new(predicate),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn filter(input: Self, predicate: Self) -> Self {
        Self::Filter {
            input: Box::new(input),
            predicate: Box::new(predicate),
        }
    }

    fn children(&self) -> Vec<&SqlExpr> {
        match self {
            Self::Column(_) | Self::Literal(_) => Vec::new(),
            Self::Function { input, .. } | Self::Aggregate { input, .. } => vec![input.as_ref()],
            Self::Binary { left, right, .. }
            | Self::Concat { left, right, .. }
            | Self::Coalesce(left, right) => vec![left.as_ref(), right.as_ref()],
            Self::Filter { input, predicate } => vec![input.as_ref(), predicate.as_ref()],
            Self::Case {
                predicate,
                then,
                otherwise,
            } => vec![predicate.as_ref(), then.as_ref(), otherwise.as_ref()],
        }
    }

    /// Whether the tree aggregates outside a window.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Self::Aggregate { window, .. } => !window,
            other => other.children().into_iter().any(Self::is_aggregate),
        }
    }

    /// Whether a column is referenced outside any plain aggregate.
    pub fn has_bare_column(&self) -> bool {
        match self {
            Self::Column(_) => true,
            Self::Aggregate { window: false, .. } => false,
            other => other.children().into_iter().any(Self::has_bare_column),
        }
    }

    /// Turn plain aggregates into window aggregates, so that the result
    /// can sit next to row-level columns.
    #[must_use]
    pub fn windowed(self) -> Self {
        match self {
            Self::Aggregate { func, input, .. } => Self::Aggregate {
                func,
                input,
                window: true,
            },
            Self::Binary { op, left, right } => Self::binary(op, left.windowed(), right.windowed()),
            Self::Function { op, input } => Self::function(op, input.windowed()),
            Self::Coalesce(left, right) => {
                Self::Coalesce(Box::new(left.windowed()), Box::new(right.windowed()))
            }
            Self::Concat {
                left,
                right,
                separator,
            } => Self::Concat {
                left: Box::new(left.windowed()),
                right: Box::new(right.windowed()),
                separator,
            },
            Self::Case {
                predicate,
                then,
                otherwise,
            } => Self::case(predicate.windowed(), then.windowed(), otherwise.windowed()),
            Self::Filter { input, predicate } => {
                Self::filter(input.windowed(), predicate.windowed())
            }
            leaf => leaf,
        }
    }

    /// Check that the tree is valid as one aggregation of a grouped query:
    /// at least one aggregate, no aggregate inside another, no column
    /// outside an aggregate.
    pub fn validate_grouped(&self) -> TesseraResult<()> {
        fn walk(expr: &SqlExpr, inside: bool) -> TesseraResult<bool> {
            match expr {
                SqlExpr::Aggregate { input, .. } => {
                    if inside {
                        return Err(TesseraError::InvalidAggregation(format!(
                            "aggregate function calls cannot be nested: {expr}"
                        )));
                    }
                    walk(input, true)?;
                    Ok(true)
                }
                SqlExpr::Column(name) if !inside => Err(TesseraError::InvalidAggregation(format!(
                    "column \"{name}\" must appear in the GROUP BY clause or must be part of \
                     an aggregate function"
                ))),
                other => {
                    let mut found = false;
                    for child in other.children() {
                        found |= walk(child, inside)?;
                    }
                    Ok(found)
                }
            }
        }
        if walk(self, false)? {
            Ok(())
        } else {
            Err(TesseraError::InvalidAggregation(format!(
                "{self} is not an aggregate expression"
            )))
        }
    }
}

/// Double-quoted identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn micros(value: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanosecond => value / 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Second => value.saturating_mul(1_000_000),
    }
}

fn render_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("NULL"),
        Value::Bool(true) => f.write_str("TRUE"),
        Value::Bool(false) => f.write_str("FALSE"),
        Value::Int64(v) => write!(f, "{v}"),
        Value::UInt64(v) => write!(f, "{v}"),
        Value::Float64(v) => write!(f, "{v:?}"),
        Value::String(s) => f.write_str(&quote_str(s)),
        Value::Date(days) => write!(f, "(DATE '1970-01-01' + {days})"),
        Value::Datetime { value, unit, .. } => {
            write!(f, "make_timestamp({})", micros(*value, *unit))
        }
        Value::Duration { value, unit } => write!(f, "to_microseconds({})", micros(*value, *unit)),
    }
}

fn aggregate_call(f: &mut fmt::Formatter<'_>, func: AggFunc, input: &SqlExpr) -> fmt::Result {
    if let SqlExpr::Filter { input, predicate } = input {
        aggregate_call(f, func, input)?;
        return write!(f, " FILTER (WHERE {predicate})");
    }
    let native = Sql::native_aggregation(func.name()).unwrap_or(func.name());
    match func {
        AggFunc::Len => f.write_str("count(*)"),
        AggFunc::NUnique => write!(f, "count(DISTINCT {input})"),
        AggFunc::NullCount => write!(f, "count_if({input} IS NULL)"),
        AggFunc::Std { ddof: 0 } => write!(f, "stddev_pop({input})"),
        AggFunc::Var { ddof: 0 } => write!(f, "var_pop({input})"),
        AggFunc::Any => write!(f, "bool_or({input})"),
        AggFunc::All => write!(f, "bool_and({input})"),
        AggFunc::Quantile {
            quantile,
            method: QuantileMethod::Linear,
        } => write!(f, "quantile_cont({input}, {:?})", quantile.get()),
        AggFunc::Quantile { quantile, .. } => {
            write!(f, "quantile_disc({input}, {:?})", quantile.get())
        }
        _ => write!(f, "{native}({input})"),
    }
}

fn str_call(f: &mut fmt::Formatter<'_>, func: &StrFunction, input: &SqlExpr) -> fmt::Result {
    match func {
        StrFunction::Contains(p) => write!(f, "contains({input}, {})", quote_str(p)),
        StrFunction::StartsWith(p) => write!(f, "starts_with({input}, {})", quote_str(p)),
        StrFunction::EndsWith(p) => write!(f, "ends_with({input}, {})", quote_str(p)),
        StrFunction::ToUppercase => write!(f, "upper({input})"),
        StrFunction::ToLowercase => write!(f, "lower({input})"),
        StrFunction::LenChars => write!(f, "length({input})"),
        StrFunction::ReplaceAll { pattern, value } => write!(
            f,
            "replace({input}, {}, {})",
            quote_str(pattern),
            quote_str(value)
        ),
        StrFunction::Slice { offset, length } => {
            let start = if *offset >= 0 { offset + 1 } else { *offset };
            match length {
                Some(len) => write!(f, "substring({input}, {start}, {len})"),
                None => write!(f, "substring({input}, {start})"),
            }
        }
    }
}

fn dt_call(f: &mut fmt::Formatter<'_>, func: DtFunction, input: &SqlExpr) -> fmt::Result {
    let part = match func {
        DtFunction::Year => "year",
        DtFunction::Month => "month",
        DtFunction::Day => "day",
        DtFunction::Hour => "hour",
        DtFunction::Minute => "minute",
        DtFunction::Second => "second",
        DtFunction::TotalMinutes => return write!(f, "trunc(epoch_us({input}) / 60000000)"),
        DtFunction::TotalSeconds => return write!(f, "trunc(epoch_us({input}) / 1000000)"),
        DtFunction::TotalMilliseconds => return write!(f, "trunc(epoch_us({input}) / 1000)"),
        DtFunction::TotalMicroseconds => return write!(f, "epoch_us({input})"),
        DtFunction::TotalNanoseconds => return write!(f, "epoch_ns({input})"),
    };
    write!(f, "{part}({input})")
}

/// `count(*)` over the rows holding the same value as the current row,
/// optionally limited to the rows before or after it.
fn occurrences(f: &mut fmt::Formatter<'_>, input: &SqlExpr, frame: &str) -> fmt::Result {
    write!(f, "(count(*) OVER (PARTITION BY {input}{frame}) = 1)")
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => f.write_str(&quote_ident(name)),
            Self::Literal(value) => render_value(f, value),
            Self::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::Function { op, input } => match op {
                Elementwise::Not => write!(f, "(NOT {input})"),
                Elementwise::Neg => write!(f, "(- {input})"),
                Elementwise::Abs => write!(f, "abs({input})"),
                Elementwise::Round(decimals) => write!(f, "round({input}, {decimals})"),
                Elementwise::Cast(dtype) => match from_logical(dtype) {
                    Ok(name) => write!(f, "CAST({input} AS {name})"),
                    Err(_) => write!(f, "CAST({input} AS {dtype})"),
                },
                Elementwise::IsNull => write!(f, "({input} IS NULL)"),
                Elementwise::IsNotNull => write!(f, "({input} IS NOT NULL)"),
                Elementwise::IsNan => write!(f, "isnan({input})"),
                Elementwise::IsIn(values) => {
                    write!(f, "({input} IN (")?;
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        render_value(f, value)?;
                    }
                    f.write_str("))")
                }
                Elementwise::CumSum => write!(
                    f,
                    "sum({input}) OVER (ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)"
                ),
                Elementwise::IsUnique => occurrences(f, input, ""),
                Elementwise::IsFirstDistinct => occurrences(
                    f,
                    input,
                    " ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW",
                ),
                Elementwise::IsLastDistinct => occurrences(
                    f,
                    input,
                    " ROWS BETWEEN CURRENT ROW AND UNBOUNDED FOLLOWING",
                ),
                Elementwise::Str(func) => str_call(f, func, input),
                Elementwise::Dt(func) => dt_call(f, *func, input),
            },
            Self::Aggregate {
                func,
                input,
                window,
            } => {
                aggregate_call(f, *func, input)?;
                if *window {
                    f.write_str(" OVER ()")?;
                }
                Ok(())
            }
            Self::Coalesce(left, right) => write!(f, "coalesce({left}, {right})"),
            Self::Case {
                predicate,
                then,
                otherwise,
            } => write!(f, "CASE WHEN {predicate} THEN {then} ELSE {otherwise} END"),
            Self::Filter { input, predicate } => {
                write!(f, "unnest(list({input}) FILTER (WHERE {predicate}))")
            }
            Self::Concat {
                left,
                right,
                separator,
            } => write!(f, "({left} || {} || {right})", quote_str(separator)),
        }
    }
}
