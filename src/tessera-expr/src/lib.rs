//! Neutral expressions and the compliant translation layer.
//!
//! Callers build [`Expr`] trees against a backend-neutral API; nothing is
//! evaluated until a frame asks for a result. At that point the tree is
//! translated, through the frame backend's [`compliant::Namespace`], into
//! [`compliant::CompliantExpr`] nodes that call the backend's native
//! operations.

pub mod compliant;
pub mod expr;
mod into_expr;

pub use expr::{col, cols, lit, selectors, Expr};
pub use into_expr::{ExprArgs, IntoExpr};
