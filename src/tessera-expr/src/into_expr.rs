//! Inputs accepted wherever an expression is expected.

use arrow::array::ArrayRef;
use tessera_core::Value;

use crate::expr::{Expr, SeriesRef};

/// Anything a caller may pass where an expression is expected.
#[derive(Debug, Clone)]
pub enum IntoExpr {
    /// An already-built expression.
    Expr(Expr),
    /// A column name, resolved with `col`.
    Name(String),
    /// A neutral series, used as a literal column.
    Series(SeriesRef),
    /// A native Arrow array, first wrapped as an unnamed series.
    Array(ArrayRef),
    /// A scalar. Not expression-like; parsing rejects it.
    Scalar(Value),
    /// Nested inputs, flattened in order.
    Many(Vec<IntoExpr>),
}

impl From<Expr> for IntoExpr {
    fn from(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

impl From<&str> for IntoExpr {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for IntoExpr {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<SeriesRef> for IntoExpr {
    fn from(series: SeriesRef) -> Self {
        Self::Series(series)
    }
}

impl From<ArrayRef> for IntoExpr {
    fn from(array: ArrayRef) -> Self {
        Self::Array(array)
    }
}

impl From<Value> for IntoExpr {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for IntoExpr {
    fn from(v: i64) -> Self {
        Self::Scalar(Value::Int64(v))
    }
}

impl From<f64> for IntoExpr {
    fn from(v: f64) -> Self {
        Self::Scalar(Value::Float64(v))
    }
}

impl<T: Into<IntoExpr>> From<Vec<T>> for IntoExpr {
    fn from(items: Vec<T>) -> Self {
        Self::Many(items.into_iter().map(Into::into).collect())
    }
}

impl IntoExpr {
    /// Flatten nested inputs into `out`, keeping order.
    pub(crate) fn flatten_into(self, out: &mut Vec<IntoExpr>) {
        match self {
            Self::Many(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            other => out.push(other),
        }
    }
}

/// Positional and named expression arguments of one call.
///
/// Positional arguments come first in call order, named ones after in
/// insertion order; named arguments are aliased to their name.
#[derive(Debug, Clone, Default)]
pub struct ExprArgs {
    pub(crate) positional: Vec<IntoExpr>,
    pub(crate) named: Vec<(String, IntoExpr)>,
}

impl ExprArgs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, expr: impl Into<IntoExpr>) -> Self {
        self.positional.push(expr.into());
        self
    }

    /// Append a named argument.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>, expr: impl Into<IntoExpr>) -> Self {
        self.named.push((name.into(), expr.into()));
        self
    }

    /// Whether there are no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl From<IntoExpr> for ExprArgs {
    fn from(expr: IntoExpr) -> Self {
        Self::new().arg(expr)
    }
}

impl From<Expr> for ExprArgs {
    fn from(expr: Expr) -> Self {
        Self::new().arg(expr)
    }
}

impl From<&str> for ExprArgs {
    fn from(name: &str) -> Self {
        Self::new().arg(name)
    }
}

impl<T: Into<IntoExpr>> From<Vec<T>> for ExprArgs {
    fn from(items: Vec<T>) -> Self {
        items
            .into_iter()
            .fold(Self::new(), |args, item| args.arg(item))
    }
}

impl<T: Into<IntoExpr>, const N: usize> From<[T; N]> for ExprArgs {
    fn from(items: [T; N]) -> Self {
        items
            .into_iter()
            .fold(Self::new(), |args, item| args.arg(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_flatten_keeps_order() {
        let nested = IntoExpr::from(vec![
            IntoExpr::from("a"),
            IntoExpr::Many(vec!["b".into(), "c".into()]),
            col("d").into(),
        ]);
        let mut out = Vec::new();
        nested.flatten_into(&mut out);
        assert_eq!(out.len(), 4);
        assert!(matches!(&out[2], IntoExpr::Name(n) if n == "c"));
        assert!(matches!(&out[3], IntoExpr::Expr(_)));
    }

    #[test]
    fn test_expr_args_builders() {
        let args = ExprArgs::from([col("z"), col("a") * 2]).named("extra", col("a") - 1);
        assert_eq!(args.positional.len(), 2);
        assert_eq!(args.named[0].0, "extra");
        assert!(!args.is_empty());
        assert!(ExprArgs::new().is_empty());
    }
}
