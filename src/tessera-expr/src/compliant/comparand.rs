//! Right-hand operands of binary operations and their reconciled forms.

use std::fmt;

use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;

use super::traits::Backend;

/// A right-hand operand as handed to a native binary operation, before
/// validation.
pub enum Comparand<B: Backend> {
    /// The outputs of an evaluated expression.
    Exprs(Vec<B::Series>),
    Series(B::Series),
    /// A whole frame; binary operations against it are not supported by a
    /// series and are retried reflected by the caller.
    Frame(B::Frame),
    Scalar(Value),
}

impl<B: Backend> Comparand<B> {
    /// The single series of an `Exprs` or `Series` operand.
    pub fn single_output(&self) -> TesseraResult<&B::Series> {
        match self {
            Self::Series(series) => Ok(series),
            Self::Exprs(outputs) => match outputs.as_slice() {
                [series] => Ok(series),
                [] => Err(TesseraError::consistency(
                    "expression operand evaluated to no columns",
                )),
                many => Err(TesseraError::multi_output(format!(
                    "Multi-output expressions (here producing {} columns) are not supported \
                     in this context",
                    many.len()
                ))),
            },
            Self::Frame(_) => Err(TesseraError::type_error(
                "expected a series operand, got a frame",
            )),
            Self::Scalar(value) => Err(TesseraError::type_error(format!(
                "expected a series operand, got a scalar {}",
                value.type_name()
            ))),
        }
    }
}

impl<B: Backend> Clone for Comparand<B> {
    fn clone(&self) -> Self {
        match self {
            Self::Exprs(outputs) => Self::Exprs(outputs.clone()),
            Self::Series(series) => Self::Series(series.clone()),
            Self::Frame(frame) => Self::Frame(frame.clone()),
            Self::Scalar(value) => Self::Scalar(value.clone()),
        }
    }
}

impl<B: Backend> fmt::Debug for Comparand<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exprs(outputs) => f.debug_tuple("Exprs").field(outputs).finish(),
            Self::Series(series) => f.debug_tuple("Series").field(series).finish(),
            Self::Frame(frame) => f.debug_tuple("Frame").field(frame).finish(),
            Self::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
        }
    }
}

/// Outcome of validating a comparand against a native column or frame.
#[derive(Debug, Clone)]
pub enum Reconciled<S> {
    /// The operand cannot take part; try the reflected operation.
    Unsupported,
    /// A value broadcast eagerly.
    Scalar(Value),
    /// A deferred one-value column, broadcast by the native engine.
    Broadcast(S),
    /// A column aligned with the left-hand side.
    Column(S),
}

impl<S> Reconciled<S> {
    /// The native column, for the broadcast and aligned forms.
    pub fn series(&self) -> Option<&S> {
        match self {
            Self::Broadcast(series) | Self::Column(series) => Some(series),
            Self::Unsupported | Self::Scalar(_) => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

/// Result of a native reduction.
#[derive(Debug, Clone)]
pub enum Reduced<S> {
    /// Computed eagerly.
    Value(Value),
    /// A deferred one-value series.
    Deferred(S),
}

/// What a native operation inside an expression node produced.
#[derive(Debug, Clone)]
pub enum NativeOutput<S> {
    Series(S),
    /// A reduction result, wrapped back into a series by the node.
    Scalar(Reduced<S>),
}
