//! Core error types for Tessera.

use thiserror::Error;

/// Result type alias using `TesseraError`.
pub type TesseraResult<T> = std::result::Result<T, TesseraError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Appended to every internal-consistency failure.
pub const BUG_REPORT_HINT: &str =
    "This is a bug in tessera; please report it with a minimal reproducer.";

/// Appended to every complex-aggregation failure.
pub const WITH_COLUMNS_HINT: &str = "Please rewrite your query such that group-by aggregations \
     are elementary. For example, instead of:\n\n    \
     df.group_by(\"a\").agg(col(\"b\").round(2).mean())\n\n\
     use:\n\n    \
     df.with_columns(col(\"b\").round(2)).group_by(\"a\").agg(col(\"b\").mean())\n";

/// Core error type for Tessera operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TesseraError {
    /// A dtype could not be translated to (or from) a backend's native type.
    #[error("UnknownDtype: {0}")]
    UnknownDtype(String),

    /// A multi-column expression was used where exactly one column is required.
    #[error("MultiOutputNotSupported: {0}")]
    MultiOutputNotSupported(String),

    /// An anonymous (wildcard or selector) expression was used where output
    /// names must be known ahead of evaluation.
    #[error("AnonymousExpressionNotAllowed: {0}")]
    AnonymousExpressionNotAllowed(String),

    /// The backend cannot push a non-elementary aggregation down.
    #[error("ComplexAggregationUnsupported: {0}")]
    ComplexAggregationUnsupported(String),

    /// Frames with incompatible column sets were combined.
    #[error("ColumnMismatch: {0}")]
    ColumnMismatch(String),

    /// The root/output name invariant was violated.
    #[error("InternalConsistency: {0}")]
    InternalConsistency(String),

    /// Type mismatch or invalid type operation.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Invalid value provided.
    #[error("ValueError: {0}")]
    ValueError(String),

    /// Column not found in a frame.
    #[error("ColumnNotFound: {0}")]
    ColumnNotFound(String),

    /// A value that cannot be turned into an expression.
    #[error("InvalidIntoExpr: {0}")]
    InvalidIntoExpr(String),

    /// A native engine rejected an aggregation (for example because the
    /// target does not reduce to one value per group).
    #[error("InvalidAggregation: {0}")]
    InvalidAggregation(String),

    /// The requested backend is disabled in the registry.
    #[error("BackendUnavailable: {0}")]
    BackendUnavailable(String),

    /// Native execution error.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Feature not supported by a backend.
    #[error("NotImplemented: {0}")]
    NotImplemented(String),

    /// Internal error that is not an invariant violation.
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error.
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),

    /// Invalid parameter provided.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),
}

impl TesseraError {
    /// Create an `UnknownDtype` error for a dtype that has no native spelling.
    pub fn unsupported_dtype<D: std::fmt::Display>(dtype: D, backend: &str) -> Self {
        Self::UnknownDtype(format!(
            "dtype {dtype} is not supported for writing by the {backend} backend"
        ))
    }

    /// Create a `MultiOutputNotSupported` error.
    pub fn multi_output<S: Into<String>>(msg: S) -> Self {
        Self::MultiOutputNotSupported(msg.into())
    }

    /// Create an `AnonymousExpressionNotAllowed` error.
    pub fn anonymous<S: Into<String>>(msg: S) -> Self {
        Self::AnonymousExpressionNotAllowed(msg.into())
    }

    /// Create a `ComplexAggregationUnsupported` error carrying the rewrite hint.
    pub fn complex_aggregation<S: Into<String>>(msg: S) -> Self {
        Self::ComplexAggregationUnsupported(format!("{}\n\n{WITH_COLUMNS_HINT}", msg.into()))
    }

    /// Create a `ColumnMismatch` error.
    pub fn column_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::ColumnMismatch(msg.into())
    }

    /// Create an `InternalConsistency` error carrying the bug-report pointer.
    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        Self::InternalConsistency(format!("{} {BUG_REPORT_HINT}", msg.into()))
    }

    /// Create a new `TypeError`.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a new `ValueError`.
    pub fn value_error<S: Into<String>>(msg: S) -> Self {
        Self::ValueError(msg.into())
    }

    /// Create a new `ColumnNotFound` error.
    pub fn column_not_found<S: Into<String>>(name: S) -> Self {
        Self::ColumnNotFound(name.into())
    }

    /// Create a new `NotImplemented` error.
    pub fn not_implemented<S: Into<String>>(msg: S) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Whether this error is a native engine's rejection of a non-scalar
    /// aggregation target.
    pub fn is_invalid_aggregation(&self) -> bool {
        matches!(self, Self::InvalidAggregation(_))
    }
}

/// Ensure a condition holds, returning an `ExecutionError` (or the named
/// variant) if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::TesseraError::ExecutionError($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::TesseraError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with a `ValueError`.
#[macro_export]
macro_rules! value_err {
    ($($arg:tt)*) => {
        return Err($crate::TesseraError::ValueError(format!($($arg)*)))
    };
}

/// Return early with a `TypeError`.
#[macro_export]
macro_rules! type_err {
    ($($arg:tt)*) => {
        return Err($crate::TesseraError::TypeError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TesseraError::type_error("expected Int64, got String");
        assert_eq!(err.to_string(), "TypeError: expected Int64, got String");
    }

    #[test]
    fn test_complex_aggregation_carries_hint() {
        let err = TesseraError::complex_aggregation("Non-trivial complex aggregation found.");
        let msg = err.to_string();
        assert!(msg.starts_with("ComplexAggregationUnsupported: Non-trivial"));
        assert!(msg.contains("with_columns"));
    }

    #[test]
    fn test_consistency_carries_bug_pointer() {
        let err = TesseraError::consistency("output_names and root_names are incompatible.");
        assert!(err.to_string().contains("please report it"));
    }

    #[test]
    fn test_unsupported_dtype_names_the_dtype() {
        let err = TesseraError::unsupported_dtype("Enum", "columnar");
        assert!(matches!(err, TesseraError::UnknownDtype(_)));
        assert!(err.to_string().contains("Enum"));
    }

    fn checked(n: i64) -> TesseraResult<i64> {
        crate::ensure!(n >= 0, ValueError: "negative input {n}");
        if n > 100 {
            crate::value_err!("too large: {n}");
        }
        Ok(n)
    }

    #[test]
    fn test_macros() {
        assert_eq!(checked(3).unwrap(), 3);
        assert!(matches!(checked(-1), Err(TesseraError::ValueError(_))));
        assert!(checked(101).unwrap_err().to_string().contains("too large"));
    }
}
