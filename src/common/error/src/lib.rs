//! Error types and result aliases for Tessera.
//!
//! Every crate in the workspace reports failures through [`TesseraError`].
//! The variants fall into two groups: the documented user-facing classes
//! raised by the translation layer (dtype mapping, multi-output and anonymous
//! expressions, complex aggregations, column mismatches, internal
//! consistency), and general-purpose variants shared with the native engines.

mod error;

pub use error::{GenericError, TesseraError, TesseraResult, BUG_REPORT_HINT, WITH_COLUMNS_HINT};
