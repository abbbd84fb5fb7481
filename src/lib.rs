//! Tessera - one dataframe and expression API over several dataframe engines
//!
//! Tessera lets code be written once against a neutral [`DataFrame`] /
//! [`LazyFrame`] and [`Expr`] API and run unchanged on any of its
//! backends: an in-memory columnar engine, a row-labelled indexed engine, a
//! lazy partitioned engine and an embedded SQL engine.
//!
//! ```ignore
//! use tessera::prelude::*;
//!
//! let df = DataFrame::from_batch(batch)?;
//! let out = df.group_by(["a"]).agg(vec![col("b").min(), col("b").max().alias("hi")])?;
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export member crates
pub use common_config as config;
pub use common_error as error;
pub use tessera_backends as backends;
pub use tessera_core as core;
pub use tessera_expr as expr;
pub use tessera_frame as frame;

pub use common_config::{BackendKind, TesseraConfig};
pub use common_error::{TesseraError, TesseraResult};
pub use tessera_backends::BackendRegistry;
pub use tessera_core::{DType, Value};
pub use tessera_expr::{col, cols, lit, selectors, Expr};
pub use tessera_frame::{concat, ConcatMethod, DataFrame, LazyFrame, Series};

/// Tessera version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything needed to build and run queries.
pub mod prelude {
    pub use common_config::{BackendKind, TesseraConfig};
    pub use common_error::{TesseraError, TesseraResult};
    pub use tessera_backends::BackendRegistry;
    pub use tessera_core::{DType, Value};
    pub use tessera_expr::expr::{
        all_horizontal, any_horizontal, concat_str, len, lit_typed, mean_horizontal,
        sum_horizontal, when, BinaryOp, QuantileMethod,
    };
    pub use tessera_expr::{col, cols, lit, selectors, Expr, ExprArgs};
    pub use tessera_frame::{concat, ConcatMethod, DataFrame, GroupBy, LazyFrame, Series};
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array};
    use arrow::record_batch::RecordBatch;

    use super::prelude::*;

    #[test]
    fn test_prelude_end_to_end() {
        let batch = RecordBatch::try_from_iter(vec![
            ("a", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
        ])
        .unwrap();
        let registry = Arc::new(BackendRegistry::new());
        for kind in BackendKind::ALL {
            let lf = LazyFrame::new(Arc::clone(&registry), kind, batch.clone()).unwrap();
            let df = lf.select(col("a").sum()).unwrap().collect().unwrap();
            assert_eq!(df.height().unwrap(), 1, "{kind}");
        }
        assert!(!super::VERSION.is_empty());
    }
}
