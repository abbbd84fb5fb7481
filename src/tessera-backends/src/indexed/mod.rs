//! The row-labelled backend: eager, every row carries a label.
//!
//! Binary operations between full-length columns align on labels rather
//! than positions. The dtype spelling depends on the storage flavor of the
//! frame. Group-by falls back to evaluating each group separately when an
//! aggregation is more than a single reduction of a column.

pub mod dtypes;
mod frame;
mod series;

use arrow::array::ArrayRef;
use common_config::{BackendKind, IndexedStorage};
use common_error::TesseraResult;
use tessera_core::DType;
use tessera_expr::compliant::{AggregationStrategy, Backend};
use tessera_expr::expr::AggFunc;

pub use dtypes::IndexedDtype;
pub use frame::{IndexedFrame, IndexedOptions};
pub use series::{default_index, IndexedSeries, RowIndex};

use crate::compute::NativeAgg;

/// Marker type of the row-labelled backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Indexed;

impl Backend for Indexed {
    type Frame = IndexedFrame;
    type Series = IndexedSeries;
    type Dtype = IndexedDtype;
    type DtypeContext = IndexedStorage;
    type AggExpr = NativeAgg;

    const KIND: BackendKind = BackendKind::Indexed;
    const AGGREGATION_NAMES: &'static [(&'static str, &'static str)] =
        &[("len", "size"), ("n_unique", "nunique")];
    const AGGREGATION_STRATEGY: AggregationStrategy = AggregationStrategy::PerGroupEvaluation;

    fn to_logical(native: &IndexedDtype) -> DType {
        dtypes::to_logical(native)
    }

    fn from_logical(dtype: &DType, storage: &IndexedStorage) -> TesseraResult<IndexedDtype> {
        dtypes::from_logical(dtype, *storage)
    }

    fn aggregation(func: AggFunc, input: &str, output: &str) -> TesseraResult<NativeAgg> {
        Ok(NativeAgg::new::<Self>(func, input, output))
    }

    fn series_from_array(name: &str, array: ArrayRef) -> TesseraResult<IndexedSeries> {
        IndexedSeries::new(name, array, IndexedStorage::default())
    }
}
