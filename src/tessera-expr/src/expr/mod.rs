//! Neutral expression system.
//!
//! - [`ops`]: operation vocabulary (binary operators, aggregates, ...)
//! - [`Expr`]: the serializable expression tree
//! - [`selectors`]: dtype-driven column selection

mod expression;
mod functions;
pub mod ops;
mod selector;
mod series_ref;

pub use expression::{
    Expr, ExprDateTimeNameSpace, ExprNameNameSpace, ExprStringNameSpace, Function, HorizontalOp,
    NameOp, Operand, Then, When,
};
pub use functions::{
    all, all_horizontal, any_horizontal, col, cols, concat_str, len, lit, lit_typed, max, mean,
    mean_horizontal, min, sum, sum_horizontal, when,
};
pub use ops::{
    AggFunc, BinaryOp, ClosedInterval, DtFunction, Elementwise, Probability, QuantileMethod,
    Reshape, StrFunction,
};
pub use selector::Selector;
pub use series_ref::SeriesRef;

/// Dtype-driven column selectors.
pub mod selectors {
    pub use super::selector::{all, boolean, by_dtype, categorical, numeric, string};
}
