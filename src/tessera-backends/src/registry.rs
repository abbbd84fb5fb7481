//! Backend registry.
//!
//! Built once from a [`TesseraConfig`] and shared by `Arc` between the
//! frames it creates. It decides which backends may be used and with which
//! options native frames are constructed.

use arrow::record_batch::RecordBatch;
use common_config::{BackendKind, TesseraConfig};
use common_error::{TesseraError, TesseraResult};
use log::info;

use crate::columnar::ArrowFrame;
use crate::indexed::{IndexedFrame, IndexedOptions};
use crate::partitioned::PartitionedFrame;
use crate::sql::SqlFrame;

/// The enabled backends and their construction options.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    config: TesseraConfig,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Create a registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TesseraConfig::default())
    }

    /// Create a registry from `config`.
    pub fn with_config(config: TesseraConfig) -> Self {
        let enabled: Vec<&str> = config
            .backends
            .enabled
            .iter()
            .map(|kind| kind.name())
            .collect();
        info!(
            "backend registry: enabled [{}], indexed storage {:?}, {} partitions",
            enabled.join(", "),
            config.backends.indexed.storage,
            config.backends.partitioned.npartitions
        );
        Self { config }
    }

    pub fn config(&self) -> &TesseraConfig {
        &self.config
    }

    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        self.config.backends.enabled.contains(&kind)
    }

    /// Fail with `BackendUnavailable` unless `kind` is enabled.
    pub fn ensure_enabled(&self, kind: BackendKind) -> TesseraResult<()> {
        if self.is_enabled(kind) {
            Ok(())
        } else {
            Err(TesseraError::BackendUnavailable(format!(
                "the {kind} backend is disabled by configuration"
            )))
        }
    }

    pub fn indexed_options(&self) -> IndexedOptions {
        IndexedOptions::from_config(&self.config)
    }

    pub fn npartitions(&self) -> usize {
        self.config.backends.partitioned.npartitions
    }

    pub fn columnar(&self, batch: RecordBatch) -> TesseraResult<ArrowFrame> {
        self.ensure_enabled(BackendKind::Columnar)?;
        Ok(ArrowFrame::new(batch))
    }

    pub fn indexed(&self, batch: RecordBatch) -> TesseraResult<IndexedFrame> {
        self.ensure_enabled(BackendKind::Indexed)?;
        IndexedFrame::new(batch, self.indexed_options())
    }

    pub fn partitioned(&self, batch: RecordBatch) -> TesseraResult<PartitionedFrame> {
        self.ensure_enabled(BackendKind::Partitioned)?;
        PartitionedFrame::new(batch, self.npartitions())
    }

    pub fn sql(&self, batch: RecordBatch) -> TesseraResult<SqlFrame> {
        self.ensure_enabled(BackendKind::Sql)?;
        Ok(SqlFrame::new(batch))
    }
}
