//! The SQL backend: lazy relations queried through SQL expressions.
//!
//! Columns are [`SqlExpr`] trees and frames are relational [`Plan`]s; each
//! plan renders as one query (logged at `debug` level when it runs) and is
//! executed by a small interpreter over Arrow batches. Complex group-by
//! aggregations are compiled to SQL expressions and pushed down; the
//! engine rejects anything that is not an aggregate.

pub mod ast;
pub mod dtypes;
mod engine;
mod frame;
mod series;

use arrow::array::ArrayRef;
use common_config::BackendKind;
use common_error::TesseraResult;
use tessera_core::DType;
use tessera_expr::compliant::{AggregationStrategy, Backend};
use tessera_expr::expr::AggFunc;

pub use ast::SqlExpr;
pub use engine::{Plan, SqlAgg};
pub use frame::SqlFrame;
pub use series::SqlSeries;

/// Marker type of the SQL backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sql;

impl Backend for Sql {
    type Frame = SqlFrame;
    type Series = SqlSeries;
    type Dtype = String;
    type DtypeContext = ();
    type AggExpr = SqlAgg;

    const KIND: BackendKind = BackendKind::Sql;
    const AGGREGATION_NAMES: &'static [(&'static str, &'static str)] = &[
        ("len", "count"),
        ("std", "stddev"),
        ("var", "variance"),
        ("n_unique", "count_distinct"),
    ];
    const AGGREGATION_STRATEGY: AggregationStrategy = AggregationStrategy::NativeExpressions;

    fn to_logical(native: &String) -> DType {
        dtypes::to_logical(native)
    }

    fn from_logical(dtype: &DType, _context: &()) -> TesseraResult<String> {
        dtypes::from_logical(dtype)
    }

    fn aggregation(func: AggFunc, input: &str, output: &str) -> TesseraResult<SqlAgg> {
        Ok(SqlAgg {
            expr: SqlExpr::aggregate(func, SqlExpr::column(input)),
            output: output.to_string(),
        })
    }

    fn aggregation_from_series(series: SqlSeries, output: &str) -> TesseraResult<SqlAgg> {
        let expr = series.expr().clone();
        expr.validate_grouped()?;
        Ok(SqlAgg {
            expr,
            output: output.to_string(),
        })
    }

    fn series_from_array(name: &str, array: ArrayRef) -> TesseraResult<SqlSeries> {
        series::from_array(name, array)
    }
}
