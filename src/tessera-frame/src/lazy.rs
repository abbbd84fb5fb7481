//! Lazy neutral frame.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use common_config::BackendKind;
use common_error::TesseraResult;
use tessera_backends::BackendRegistry;

use crate::any_frame::AnyFrame;
use crate::dataframe::DataFrame;
use crate::group_by::NeutralFrame;
use crate::ops::impl_frame_ops;

/// A frame of any backend; operations on the Partitioned and Sql backends
/// build a plan that only runs on [`collect`](LazyFrame::collect).
#[derive(Debug, Clone)]
pub struct LazyFrame {
    frame: AnyFrame,
    registry: Arc<BackendRegistry>,
}

impl LazyFrame {
    pub fn new(
        registry: Arc<BackendRegistry>,
        kind: BackendKind,
        batch: RecordBatch,
    ) -> TesseraResult<Self> {
        let frame = AnyFrame::new(&registry, kind, batch)?;
        Ok(Self { frame, registry })
    }

    pub(crate) fn from_any(frame: AnyFrame, registry: Arc<BackendRegistry>) -> Self {
        Self { frame, registry }
    }

    /// Run the plan and materialize an eager frame.
    pub fn collect(&self) -> TesseraResult<DataFrame> {
        let frame = self.frame.collect(&self.registry)?;
        Ok(DataFrame::from_any(frame, Arc::clone(&self.registry)))
    }
}

impl_frame_ops!(LazyFrame);

#[cfg(test)]
mod tests {
    use arrow::array::{ArrayRef, Int64Array};
    use tessera_expr::col;

    use super::*;

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![(
            "a",
            Arc::new(Int64Array::from(vec![3, 1, 2])) as ArrayRef,
        )])
        .unwrap()
    }

    #[test]
    fn test_collect_kinds() {
        let registry = Arc::new(BackendRegistry::new());
        for (kind, expected) in [
            (BackendKind::Columnar, BackendKind::Columnar),
            (BackendKind::Indexed, BackendKind::Indexed),
            (BackendKind::Partitioned, BackendKind::Indexed),
            (BackendKind::Sql, BackendKind::Columnar),
        ] {
            let lf = LazyFrame::new(Arc::clone(&registry), kind, batch()).unwrap();
            let df = lf.filter(col("a").gt(1)).unwrap().collect().unwrap();
            assert_eq!(df.kind(), expected);
            assert_eq!(df.height().unwrap(), 2);
        }
    }

    #[test]
    fn test_eager_round_trip() {
        let df = DataFrame::from_batch(batch()).unwrap();
        let back = df.lazy().head(1).unwrap().collect().unwrap();
        assert_eq!(back.kind(), BackendKind::Columnar);
        assert_eq!(back.height().unwrap(), 1);
    }
}
