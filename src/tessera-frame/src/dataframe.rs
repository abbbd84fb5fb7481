//! Eager neutral dataframe.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use common_config::BackendKind;
use common_error::{TesseraError, TesseraResult};
use tessera_backends::BackendRegistry;

use crate::any_frame::AnyFrame;
use crate::group_by::NeutralFrame;
use crate::lazy::LazyFrame;
use crate::ops::impl_frame_ops;
use crate::series::Series;

/// A materialized frame of the Columnar or Indexed backend.
#[derive(Debug, Clone)]
pub struct DataFrame {
    frame: AnyFrame,
    registry: Arc<BackendRegistry>,
}

impl DataFrame {
    /// Build an eager frame of backend `kind`.
    pub fn new(
        registry: Arc<BackendRegistry>,
        kind: BackendKind,
        batch: RecordBatch,
    ) -> TesseraResult<Self> {
        if !kind.is_eager() {
            return Err(TesseraError::value_error(format!(
                "the {kind} backend is lazy; build a LazyFrame instead"
            )));
        }
        let frame = AnyFrame::new(&registry, kind, batch)?;
        Ok(Self { frame, registry })
    }

    /// Build a Columnar frame with the default registry.
    pub fn from_batch(batch: RecordBatch) -> TesseraResult<Self> {
        Self::new(
            Arc::new(BackendRegistry::new()),
            BackendKind::Columnar,
            batch,
        )
    }

    pub(crate) fn from_any(frame: AnyFrame, registry: Arc<BackendRegistry>) -> Self {
        Self { frame, registry }
    }

    pub fn height(&self) -> TesseraResult<usize> {
        Ok(self.frame.to_batch()?.num_rows())
    }

    pub fn get_column(&self, name: &str) -> TesseraResult<Series> {
        self.frame.column(name)
    }

    /// A lazy view of this frame on the same backend.
    pub fn lazy(&self) -> LazyFrame {
        LazyFrame::from_any(self.frame.clone(), Arc::clone(&self.registry))
    }
}

impl_frame_ops!(DataFrame);
