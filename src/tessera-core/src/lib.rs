//! Core data model for Tessera.
//!
//! This crate provides the backend-neutral vocabulary every other crate
//! speaks:
//! - [`DType`] and [`DTypeClass`], the closed logical type system
//! - [`Value`], scalar values used for literals and reduction results
//! - [`Names`], the known-or-unknown column name sets carried by expressions

pub mod names;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use names::Names;
pub use types::{DType, DTypeClass, DTypeLike, Field, TimeUnit, Value};
