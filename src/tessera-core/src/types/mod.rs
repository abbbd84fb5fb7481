//! Type system for Tessera values.
//!
//! [`DType`] is the logical type of a column, independent of any engine.
//! Each backend translates between it and its own native type descriptors.

mod dtype;
mod value;

pub use dtype::{DType, DTypeClass, DTypeLike, Field, TimeUnit};
pub use value::Value;
