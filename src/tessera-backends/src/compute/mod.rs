//! Arrow compute shared by every backend.
//!
//! All four engines keep their data in Arrow arrays; they differ in how and
//! when these kernels run (eagerly, per partition, or from a SQL plan).

pub mod aggregate;
pub mod arithmetic;
pub mod elementwise;
pub mod grouping;
pub mod scalar;
pub mod selection;

pub use grouping::NativeAgg;
