//! The compliant layer: backend-facing expression nodes and the machinery
//! that builds and runs them.
//!
//! - [`Backend`], [`CompliantFrame`], [`CompliantSeries`]: the interface
//!   record each engine implements
//! - [`CompliantExpr`]: deferred native computations with name metadata
//! - [`Namespace`]: factory of leaf and horizontal nodes
//! - [`parse_into_exprs`] / [`to_compliant`]: from neutral inputs to nodes
//! - [`group_by`]: aggregation classification and execution

mod comparand;
mod frame_ops;
pub mod group_by;
mod namespace;
mod node;
mod parse;
mod translate;
mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use comparand::{Comparand, NativeOutput, Reconciled, Reduced};
pub use frame_ops::{filter, frame_binary, select, with_columns};
pub use group_by::{AggregationRequest, Classified};
pub use namespace::Namespace;
pub use node::{CompliantExpr, EvalFn, ExprMeta, ExprOperand};
pub use parse::parse_into_exprs;
pub use translate::{native_series, to_compliant};
pub use traits::{AggregationStrategy, Backend, CompliantFrame, CompliantSeries};
