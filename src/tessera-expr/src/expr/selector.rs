//! Dtype-driven column selectors.
//!
//! Selectors are anonymous: which columns they pick depends on the schema
//! of the frame they are evaluated against, so their root and output names
//! are never known ahead of evaluation.

use serde::{Deserialize, Serialize};
use tessera_core::{DType, DTypeClass, DTypeLike};

use super::Expr;

/// A schema-dependent column selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// Columns whose dtype matches any of the patterns.
    ByDtype(Vec<DTypeLike>),
    /// Integer and float columns.
    Numeric,
    Boolean,
    String,
    Categorical,
    /// Every column.
    All,
}

impl Selector {
    /// Whether a column of `dtype` is selected.
    pub fn matches(&self, dtype: &DType) -> bool {
        match self {
            Self::ByDtype(patterns) => patterns.iter().any(|p| p.matches(dtype)),
            Self::Numeric => dtype.is_numeric(),
            Self::Boolean => *dtype == DTypeClass::Boolean,
            Self::String => *dtype == DTypeClass::String,
            Self::Categorical => *dtype == DTypeClass::Categorical,
            Self::All => true,
        }
    }
}

/// Select columns matching any of the given dtypes or dtype classes.
pub fn by_dtype<I, D>(dtypes: I) -> Expr
where
    I: IntoIterator<Item = D>,
    D: Into<DTypeLike>,
{
    Expr::Selector(Selector::ByDtype(dtypes.into_iter().map(Into::into).collect()))
}

/// Select numeric columns.
pub fn numeric() -> Expr {
    Expr::Selector(Selector::Numeric)
}

/// Select boolean columns.
pub fn boolean() -> Expr {
    Expr::Selector(Selector::Boolean)
}

/// Select string columns.
pub fn string() -> Expr {
    Expr::Selector(Selector::String)
}

/// Select categorical columns.
pub fn categorical() -> Expr {
    Expr::Selector(Selector::Categorical)
}

/// Select every column.
pub fn all() -> Expr {
    Expr::Selector(Selector::All)
}

#[cfg(test)]
mod tests {
    use tessera_core::TimeUnit;

    use super::*;

    #[test]
    fn test_selector_matching() {
        assert!(Selector::Numeric.matches(&DType::UInt8));
        assert!(!Selector::Numeric.matches(&DType::String));
        assert!(Selector::Categorical.matches(&DType::Categorical));

        let by = Selector::ByDtype(vec![
            DTypeClass::Datetime.into(),
            DType::Int64.into(),
        ]);
        assert!(by.matches(&DType::datetime(TimeUnit::Second, Some("UTC"))));
        assert!(by.matches(&DType::Int64));
        assert!(!by.matches(&DType::Int32));
    }
}
