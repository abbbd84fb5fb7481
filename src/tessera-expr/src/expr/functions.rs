//! Free functions that start an expression.

use tessera_core::{DType, Value};

use super::expression::{Expr, HorizontalOp, When};

/// Reference a single column.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(vec![name.into()])
}

/// Reference several columns; `cols(["a", "b"])` yields one output per name.
pub fn cols<I, S>(names: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Expr::Column(names.into_iter().map(Into::into).collect())
}

/// Every column of the input.
pub fn all() -> Expr {
    Expr::All
}

/// A literal value, typed after the value itself.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal {
        value: value.into(),
        dtype: None,
    }
}

/// A literal value with an explicit dtype.
pub fn lit_typed(value: impl Into<Value>, dtype: DType) -> Expr {
    Expr::Literal {
        value: value.into(),
        dtype: Some(dtype),
    }
}

/// Number of rows.
pub fn len() -> Expr {
    Expr::Len
}

/// Sum of the given columns.
pub fn sum<I, S>(names: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cols(names).sum()
}

/// Mean of the given columns.
pub fn mean<I, S>(names: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cols(names).mean()
}

/// Minimum of the given columns.
pub fn min<I, S>(names: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cols(names).min()
}

/// Maximum of the given columns.
pub fn max<I, S>(names: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cols(names).max()
}

fn horizontal(op: HorizontalOp, exprs: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Horizontal {
        op,
        inputs: exprs.into_iter().collect(),
    }
}

/// Row-wise logical AND.
pub fn all_horizontal(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    horizontal(HorizontalOp::All, exprs)
}

/// Row-wise logical OR.
pub fn any_horizontal(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    horizontal(HorizontalOp::Any, exprs)
}

/// Row-wise sum; nulls count as zero.
pub fn sum_horizontal(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    horizontal(HorizontalOp::Sum, exprs)
}

/// Row-wise mean of the non-null values.
pub fn mean_horizontal(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    horizontal(HorizontalOp::Mean, exprs)
}

/// Row-wise string concatenation.
pub fn concat_str(exprs: impl IntoIterator<Item = Expr>, separator: impl Into<String>) -> Expr {
    Expr::ConcatStr {
        inputs: exprs.into_iter().collect(),
        separator: separator.into(),
    }
}

/// Start a conditional expression: `when(predicate).then(value).otherwise(other)`.
///
/// Several conditions combine with `&` before being passed in.
pub fn when(predicate: Expr) -> When {
    When::new(predicate)
}
