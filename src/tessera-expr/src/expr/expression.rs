//! The neutral expression tree.
//!
//! An [`Expr`] records *what* should be computed without committing to any
//! backend. Nothing is evaluated while the tree is built; a frame translates
//! it into its own backend's expression nodes when a result is requested.

use std::ops::{Add, BitAnd, BitOr, Div, Mul, Neg, Not, Rem, Sub};

use serde::{Deserialize, Serialize};
use tessera_core::{DType, Value};

use super::ops::{
    AggFunc, BinaryOp, ClosedInterval, DtFunction, Elementwise, Probability, QuantileMethod,
    Reshape, StrFunction,
};
use super::selector::Selector;
use super::series_ref::SeriesRef;

/// A backend-neutral expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to one or more named columns.
    Column(Vec<String>),
    /// Every column of the input, in order.
    All,
    /// A literal scalar, optionally with an explicit dtype.
    Literal { value: Value, dtype: Option<DType> },
    /// Number of rows.
    Len,
    /// Schema-dependent selection.
    Selector(Selector),
    /// An in-memory series. Trees holding one cannot be serialized.
    #[serde(skip)]
    Series(SeriesRef),
    /// A function applied to every output of `input`.
    Function {
        input: Box<Expr>,
        function: Function,
        operands: Vec<(String, Operand)>,
    },
    /// Rename the single output of `input`.
    Alias { input: Box<Expr>, name: String },
    /// Rename every output of `input`.
    Name { input: Box<Expr>, op: NameOp },
    /// Row-wise reduction across the outputs of several expressions.
    Horizontal { op: HorizontalOp, inputs: Vec<Expr> },
    /// Row-wise string concatenation.
    ConcatStr { inputs: Vec<Expr>, separator: String },
}

/// Right-hand side of a function: another expression, a series, or a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Expr(Box<Expr>),
    #[serde(skip)]
    Series(SeriesRef),
    Scalar(Value),
}

/// Functions that can be chained onto an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Function {
    /// Binary operator; operand `other`.
    Binary(BinaryOp),
    /// Reduction to one value per column.
    Agg(AggFunc),
    Elementwise(Elementwise),
    Reshape(Reshape),
    /// Replace nulls; operand `value`.
    FillNull,
    /// Keep rows where the predicate holds; operand `predicate`.
    Filter,
    /// Interval test; operands `lower_bound` and `upper_bound`.
    IsBetween(ClosedInterval),
    /// Conditional pick of the input; operands `predicate` and `otherwise`.
    When,
}

impl Function {
    /// Label used in operation-name chains.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Binary(op) => op.label(),
            Self::Agg(agg) => agg.name(),
            Self::Elementwise(e) => e.label(),
            Self::Reshape(r) => r.label(),
            Self::FillNull => "fill_null",
            Self::Filter => "filter",
            Self::IsBetween(_) => "is_between",
            Self::When => "when",
        }
    }

    /// Whether this step collapses each column to a single value.
    pub fn returns_scalar(&self) -> bool {
        matches!(self, Self::Agg(_))
    }
}

/// Row-wise reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizontalOp {
    All,
    Any,
    Sum,
    Mean,
}

impl HorizontalOp {
    /// Label used in operation-name chains.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::All => "all_horizontal",
            Self::Any => "any_horizontal",
            Self::Sum => "sum_horizontal",
            Self::Mean => "mean_horizontal",
        }
    }
}

/// Output renaming operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameOp {
    /// Restore the root column names.
    Keep,
    Prefix(String),
    Suffix(String),
    ToUppercase,
    ToLowercase,
}

impl NameOp {
    /// Label used in error messages.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Keep => "name.keep",
            Self::Prefix(_) => "name.prefix",
            Self::Suffix(_) => "name.suffix",
            Self::ToUppercase => "name.to_uppercase",
            Self::ToLowercase => "name.to_lowercase",
        }
    }

    /// Apply the renaming to one name. `Keep` is resolved against root names
    /// by the caller and leaves the name untouched here.
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Keep => name.to_string(),
            Self::Prefix(prefix) => format!("{prefix}{name}"),
            Self::Suffix(suffix) => format!("{name}{suffix}"),
            Self::ToUppercase => name.to_uppercase(),
            Self::ToLowercase => name.to_lowercase(),
        }
    }
}

impl Expr {
    fn function(self, function: Function, operands: Vec<(String, Operand)>) -> Self {
        Self::Function {
            input: Box::new(self),
            function,
            operands,
        }
    }

    fn binary(self, op: BinaryOp, other: impl Into<Operand>) -> Self {
        self.function(Function::Binary(op), vec![("other".into(), other.into())])
    }

    fn agg(self, agg: AggFunc) -> Self {
        self.function(Function::Agg(agg), Vec::new())
    }

    fn elementwise(self, op: Elementwise) -> Self {
        self.function(Function::Elementwise(op), Vec::new())
    }

    fn reshape(self, op: Reshape) -> Self {
        self.function(Function::Reshape(op), Vec::new())
    }

    /// Rename the output.
    #[must_use]
    pub fn alias(self, name: impl Into<String>) -> Self {
        Self::Alias {
            input: Box::new(self),
            name: name.into(),
        }
    }

    // Comparisons

    /// Element-wise equality.
    #[must_use]
    pub fn eq(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Element-wise inequality.
    #[must_use]
    pub fn neq(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::NotEq, other)
    }

    #[must_use]
    pub fn lt(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    #[must_use]
    pub fn lt_eq(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::LtEq, other)
    }

    #[must_use]
    pub fn gt(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    #[must_use]
    pub fn gt_eq(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::GtEq, other)
    }

    /// Floor division.
    #[must_use]
    pub fn floor_div(self, other: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::FloorDiv, other)
    }

    /// Exponentiation.
    #[must_use]
    pub fn pow(self, exponent: impl Into<Operand>) -> Self {
        self.binary(BinaryOp::Pow, exponent)
    }

    // Reductions

    #[must_use]
    pub fn sum(self) -> Self {
        self.agg(AggFunc::Sum)
    }

    #[must_use]
    pub fn mean(self) -> Self {
        self.agg(AggFunc::Mean)
    }

    #[must_use]
    pub fn median(self) -> Self {
        self.agg(AggFunc::Median)
    }

    #[must_use]
    pub fn min(self) -> Self {
        self.agg(AggFunc::Min)
    }

    #[must_use]
    pub fn max(self) -> Self {
        self.agg(AggFunc::Max)
    }

    /// Standard deviation with `ddof` delta degrees of freedom.
    #[must_use]
    pub fn std(self, ddof: u8) -> Self {
        self.agg(AggFunc::Std { ddof })
    }

    /// Variance with `ddof` delta degrees of freedom.
    #[must_use]
    pub fn var(self, ddof: u8) -> Self {
        self.agg(AggFunc::Var { ddof })
    }

    /// Number of non-null values.
    #[must_use]
    pub fn count(self) -> Self {
        self.agg(AggFunc::Count)
    }

    /// Number of values, nulls included.
    #[must_use]
    pub fn len(self) -> Self {
        self.agg(AggFunc::Len)
    }

    #[must_use]
    pub fn n_unique(self) -> Self {
        self.agg(AggFunc::NUnique)
    }

    #[must_use]
    pub fn null_count(self) -> Self {
        self.agg(AggFunc::NullCount)
    }

    #[must_use]
    pub fn any(self) -> Self {
        self.agg(AggFunc::Any)
    }

    #[must_use]
    pub fn all(self) -> Self {
        self.agg(AggFunc::All)
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.agg(AggFunc::First)
    }

    #[must_use]
    pub fn last(self) -> Self {
        self.agg(AggFunc::Last)
    }

    /// The `quantile` level of the non-null values, resolved with `method`
    /// when it falls between two of them.
    #[must_use]
    pub fn quantile(self, quantile: f64, method: QuantileMethod) -> Self {
        self.agg(AggFunc::Quantile {
            quantile: Probability::new(quantile),
            method,
        })
    }

    // Element-wise

    #[must_use]
    pub fn abs(self) -> Self {
        self.elementwise(Elementwise::Abs)
    }

    /// Round to `decimals` decimal places.
    #[must_use]
    pub fn round(self, decimals: u32) -> Self {
        self.elementwise(Elementwise::Round(decimals))
    }

    /// Cast to `dtype`.
    #[must_use]
    pub fn cast(self, dtype: DType) -> Self {
        self.elementwise(Elementwise::Cast(dtype))
    }

    #[must_use]
    pub fn is_null(self) -> Self {
        self.elementwise(Elementwise::IsNull)
    }

    #[must_use]
    pub fn is_not_null(self) -> Self {
        self.elementwise(Elementwise::IsNotNull)
    }

    #[must_use]
    pub fn is_nan(self) -> Self {
        self.elementwise(Elementwise::IsNan)
    }

    /// Membership test against a fixed set of values.
    #[must_use]
    pub fn is_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.elementwise(Elementwise::IsIn(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn cum_sum(self) -> Self {
        self.elementwise(Elementwise::CumSum)
    }

    /// Whether each value occurs exactly once in the column.
    #[must_use]
    pub fn is_unique(self) -> Self {
        self.elementwise(Elementwise::IsUnique)
    }

    #[must_use]
    pub fn is_first_distinct(self) -> Self {
        self.elementwise(Elementwise::IsFirstDistinct)
    }

    #[must_use]
    pub fn is_last_distinct(self) -> Self {
        self.elementwise(Elementwise::IsLastDistinct)
    }

    /// Replace nulls with `value`.
    #[must_use]
    pub fn fill_null(self, value: impl Into<Operand>) -> Self {
        self.function(Function::FillNull, vec![("value".into(), value.into())])
    }

    /// Keep values where `predicate` holds.
    #[must_use]
    pub fn filter(self, predicate: impl Into<Operand>) -> Self {
        self.function(Function::Filter, vec![("predicate".into(), predicate.into())])
    }

    /// Whether values lie between the bounds.
    #[must_use]
    pub fn is_between(
        self,
        lower_bound: impl Into<Operand>,
        upper_bound: impl Into<Operand>,
        closed: ClosedInterval,
    ) -> Self {
        self.function(
            Function::IsBetween(closed),
            vec![
                ("lower_bound".into(), lower_bound.into()),
                ("upper_bound".into(), upper_bound.into()),
            ],
        )
    }

    // Reshaping

    #[must_use]
    pub fn head(self, n: usize) -> Self {
        self.reshape(Reshape::Head(n))
    }

    #[must_use]
    pub fn tail(self, n: usize) -> Self {
        self.reshape(Reshape::Tail(n))
    }

    #[must_use]
    pub fn shift(self, n: i64) -> Self {
        self.reshape(Reshape::Shift(n))
    }

    #[must_use]
    pub fn drop_nulls(self) -> Self {
        self.reshape(Reshape::DropNulls)
    }

    #[must_use]
    pub fn sort(self, descending: bool) -> Self {
        self.reshape(Reshape::Sort { descending })
    }

    // Sub-namespaces

    /// String functions.
    pub fn str(self) -> ExprStringNameSpace {
        ExprStringNameSpace(self)
    }

    /// Temporal functions.
    pub fn dt(self) -> ExprDateTimeNameSpace {
        ExprDateTimeNameSpace(self)
    }

    /// Output renaming.
    pub fn name(self) -> ExprNameNameSpace {
        ExprNameNameSpace(self)
    }
}

/// String functions of an expression.
pub struct ExprStringNameSpace(Expr);

impl ExprStringNameSpace {
    fn apply(self, f: StrFunction) -> Expr {
        self.0.elementwise(Elementwise::Str(f))
    }

    /// Whether values contain the literal `pattern`.
    pub fn contains(self, pattern: impl Into<String>) -> Expr {
        self.apply(StrFunction::Contains(pattern.into()))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Expr {
        self.apply(StrFunction::StartsWith(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Expr {
        self.apply(StrFunction::EndsWith(suffix.into()))
    }

    pub fn to_uppercase(self) -> Expr {
        self.apply(StrFunction::ToUppercase)
    }

    pub fn to_lowercase(self) -> Expr {
        self.apply(StrFunction::ToLowercase)
    }

    /// Length in characters.
    pub fn len_chars(self) -> Expr {
        self.apply(StrFunction::LenChars)
    }

    /// Replace every occurrence of the literal `pattern` with `value`.
    pub fn replace_all(self, pattern: impl Into<String>, value: impl Into<String>) -> Expr {
        self.apply(StrFunction::ReplaceAll {
            pattern: pattern.into(),
            value: value.into(),
        })
    }

    /// Substring starting at `offset` characters.
    pub fn slice(self, offset: i64, length: Option<usize>) -> Expr {
        self.apply(StrFunction::Slice { offset, length })
    }
}

/// Temporal functions of an expression.
pub struct ExprDateTimeNameSpace(Expr);

impl ExprDateTimeNameSpace {
    fn apply(self, f: DtFunction) -> Expr {
        self.0.elementwise(Elementwise::Dt(f))
    }

    pub fn year(self) -> Expr {
        self.apply(DtFunction::Year)
    }

    pub fn month(self) -> Expr {
        self.apply(DtFunction::Month)
    }

    pub fn day(self) -> Expr {
        self.apply(DtFunction::Day)
    }

    pub fn hour(self) -> Expr {
        self.apply(DtFunction::Hour)
    }

    pub fn minute(self) -> Expr {
        self.apply(DtFunction::Minute)
    }

    pub fn second(self) -> Expr {
        self.apply(DtFunction::Second)
    }

    /// Whole minutes of a duration, truncated toward zero.
    pub fn total_minutes(self) -> Expr {
        self.apply(DtFunction::TotalMinutes)
    }

    pub fn total_seconds(self) -> Expr {
        self.apply(DtFunction::TotalSeconds)
    }

    pub fn total_milliseconds(self) -> Expr {
        self.apply(DtFunction::TotalMilliseconds)
    }

    pub fn total_microseconds(self) -> Expr {
        self.apply(DtFunction::TotalMicroseconds)
    }

    pub fn total_nanoseconds(self) -> Expr {
        self.apply(DtFunction::TotalNanoseconds)
    }
}

/// A condition waiting for its value; built by [`when`](super::when).
#[derive(Debug, Clone)]
pub struct When {
    predicate: Expr,
}

/// A conditional value. Rows where the condition does not hold are null
/// unless [`Then::otherwise`] supplies a value.
#[derive(Debug, Clone)]
pub struct Then {
    predicate: Expr,
    value: Expr,
}

fn operand_expr(operand: Operand) -> Expr {
    match operand {
        Operand::Expr(expr) => *expr,
        Operand::Series(series) => Expr::Series(series),
        Operand::Scalar(value) => Expr::Literal { value, dtype: None },
    }
}

impl When {
    pub(crate) fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    /// The value taken where the condition holds. Output names follow it.
    pub fn then(self, value: impl Into<Operand>) -> Then {
        Then {
            predicate: self.predicate,
            value: operand_expr(value.into()),
        }
    }
}

impl Then {
    /// The value taken where the condition does not hold.
    pub fn otherwise(self, value: impl Into<Operand>) -> Expr {
        self.value.function(
            Function::When,
            vec![
                ("predicate".into(), self.predicate.into()),
                ("otherwise".into(), value.into()),
            ],
        )
    }

    #[must_use]
    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::from(self).alias(name)
    }
}

impl From<Then> for Expr {
    fn from(then: Then) -> Self {
        then.otherwise(Value::Null)
    }
}

/// Output renaming of an expression.
pub struct ExprNameNameSpace(Expr);

impl ExprNameNameSpace {
    fn apply(self, op: NameOp) -> Expr {
        Expr::Name {
            input: Box::new(self.0),
            op,
        }
    }

    /// Restore the names of the columns the expression reads.
    pub fn keep(self) -> Expr {
        self.apply(NameOp::Keep)
    }

    pub fn prefix(self, prefix: impl Into<String>) -> Expr {
        self.apply(NameOp::Prefix(prefix.into()))
    }

    pub fn suffix(self, suffix: impl Into<String>) -> Expr {
        self.apply(NameOp::Suffix(suffix.into()))
    }

    pub fn to_uppercase(self) -> Expr {
        self.apply(NameOp::ToUppercase)
    }

    pub fn to_lowercase(self) -> Expr {
        self.apply(NameOp::ToLowercase)
    }
}

impl From<Then> for Operand {
    fn from(then: Then) -> Self {
        Self::Expr(Box::new(then.into()))
    }
}

impl From<Expr> for Operand {
    fn from(expr: Expr) -> Self {
        Self::Expr(Box::new(expr))
    }
}

impl From<SeriesRef> for Operand {
    fn from(series: SeriesRef) -> Self {
        Self::Series(series)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Self::Scalar(Value::from(v))
                }
            }
        )*
    };
}

impl_scalar_operand!(bool, i32, i64, u64, f64, &str, String);

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Operand>> $trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                self.binary($op, rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Sub);
impl_binary_operator!(Mul, mul, BinaryOp::Mul);
impl_binary_operator!(Div, div, BinaryOp::TrueDiv);
impl_binary_operator!(Rem, rem, BinaryOp::Mod);
impl_binary_operator!(BitAnd, bitand, BinaryOp::And);
impl_binary_operator!(BitOr, bitor, BinaryOp::Or);

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.elementwise(Elementwise::Not)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.elementwise(Elementwise::Neg)
    }
}
