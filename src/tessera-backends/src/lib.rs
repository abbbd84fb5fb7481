//! Native engines behind the compliant layer.
//!
//! Four backends implement the [`tessera_expr::compliant::Backend`] trait
//! record over a shared set of Arrow kernels ([`compute`]):
//!
//! - [`columnar`]: eager Arrow arrays and record batches, no row labels
//! - [`indexed`]: eager, row-labelled columns with three storage flavors
//! - [`partitioned`]: lazy task graph over row partitions
//! - [`sql`]: lazy relations rendered as SQL and run by an interpreter
//!
//! The [`BackendRegistry`] decides which of them may be used and with
//! which options.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

pub mod columnar;
pub mod compute;
pub mod indexed;
pub mod partitioned;
pub mod registry;
pub mod sql;

pub use columnar::{ArrowFrame, ArrowSeries, Columnar};
pub use indexed::{Indexed, IndexedFrame, IndexedOptions, IndexedSeries};
pub use partitioned::{Partitioned, PartitionedFrame, PartitionedSeries};
pub use registry::BackendRegistry;
pub use sql::{Sql, SqlFrame, SqlSeries};
