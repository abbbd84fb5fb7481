//! The columnar backend: eager, Arrow-native, no row labels.
//!
//! Columns are Arrow arrays and frames are record batches; every operation
//! runs immediately. Group-by supports single reductions of a column only.

pub mod dtypes;
mod frame;
mod series;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use common_config::BackendKind;
use common_error::TesseraResult;
use tessera_core::DType;
use tessera_expr::compliant::{AggregationStrategy, Backend};
use tessera_expr::expr::AggFunc;

pub(crate) use frame::{assembled_height, frame_height_mismatch, merge_columns, named_columns};
pub use frame::ArrowFrame;
pub(crate) use series::{apply_binary, operand_array};
pub use series::ArrowSeries;

use crate::compute::NativeAgg;

/// Marker type of the columnar backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Columnar;

impl Backend for Columnar {
    type Frame = ArrowFrame;
    type Series = ArrowSeries;
    type Dtype = DataType;
    type DtypeContext = ();
    type AggExpr = NativeAgg;

    const KIND: BackendKind = BackendKind::Columnar;
    const AGGREGATION_NAMES: &'static [(&'static str, &'static str)] = &[
        ("len", "count_all"),
        ("n_unique", "count_distinct"),
        ("std", "stddev"),
        ("var", "variance"),
    ];
    const AGGREGATION_STRATEGY: AggregationStrategy = AggregationStrategy::SimpleOnly;

    fn to_logical(native: &DataType) -> DType {
        dtypes::to_logical(native)
    }

    fn from_logical(dtype: &DType, _context: &()) -> TesseraResult<DataType> {
        dtypes::from_logical(dtype)
    }

    fn aggregation(func: AggFunc, input: &str, output: &str) -> TesseraResult<NativeAgg> {
        Ok(NativeAgg::new::<Self>(func, input, output))
    }

    fn series_from_array(name: &str, array: ArrayRef) -> TesseraResult<ArrowSeries> {
        Ok(ArrowSeries::new(name, array))
    }
}
