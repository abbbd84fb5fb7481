//! The partitioned backend: lazy, rows split into partitions.
//!
//! Frames and columns are nodes of a deferred task graph; nothing runs
//! until [`PartitionedFrame::compute`] (or `to_batch`) asks for data.
//! Reductions stay deferred and broadcast back against partitions.
//! Group-by supports single reductions of a column only.

mod deferred;
pub mod dtypes;
mod frame;
mod series;

use arrow::array::ArrayRef;
use common_config::{BackendKind, PartitionedConfig};
use common_error::TesseraResult;
use tessera_core::DType;
use tessera_expr::compliant::{AggregationStrategy, Backend};
use tessera_expr::expr::AggFunc;

pub use deferred::Deferred;
pub use frame::{Batches, PartitionedFrame};
pub use series::{PartitionedSeries, Partitions};

use crate::compute::NativeAgg;

/// Marker type of the partitioned backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Partitioned;

impl Backend for Partitioned {
    type Frame = PartitionedFrame;
    type Series = PartitionedSeries;
    type Dtype = String;
    type DtypeContext = ();
    type AggExpr = NativeAgg;

    const KIND: BackendKind = BackendKind::Partitioned;
    const AGGREGATION_NAMES: &'static [(&'static str, &'static str)] =
        &[("len", "size"), ("n_unique", "nunique")];
    const AGGREGATION_STRATEGY: AggregationStrategy = AggregationStrategy::SimpleOnly;

    fn to_logical(native: &String) -> DType {
        dtypes::to_logical(native)
    }

    fn from_logical(dtype: &DType, _context: &()) -> TesseraResult<String> {
        dtypes::from_logical(dtype)
    }

    fn aggregation(func: AggFunc, input: &str, output: &str) -> TesseraResult<NativeAgg> {
        Ok(NativeAgg::new::<Self>(func, input, output))
    }

    fn series_from_array(name: &str, array: ArrayRef) -> TesseraResult<PartitionedSeries> {
        PartitionedSeries::from_array(name, array, PartitionedConfig::default().npartitions)
    }
}
