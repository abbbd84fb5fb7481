//! Configuration management for Tessera.
//!
//! Provides the settings the backend registry is built from: which backends
//! are enabled, the storage flavor new row-labelled frames use, how many
//! partitions the lazy engine splits data into, and evaluation toggles.

use std::fmt;

use common_error::TesseraResult;
use serde::{Deserialize, Serialize};

/// Global Tessera configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TesseraConfig {
    /// Backend configuration.
    pub backends: BackendsConfig,
    /// Evaluation configuration.
    pub evaluation: EvaluationConfig,
}

impl TesseraConfig {
    /// Parse a configuration from a JSON document. Missing sections take
    /// their defaults.
    pub fn from_json(json: &str) -> TesseraResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> TesseraResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The closed set of dataframe engines Tessera can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-memory columnar engine over Arrow arrays.
    #[default]
    Columnar,
    /// Row-labelled tabular engine.
    Indexed,
    /// Lazy engine over row partitions.
    Partitioned,
    /// Embedded analytical SQL engine.
    Sql,
}

impl BackendKind {
    /// All backend kinds, in registry order.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Columnar,
        BackendKind::Indexed,
        BackendKind::Partitioned,
        BackendKind::Sql,
    ];

    /// Whether frames of this backend are materialized eagerly.
    pub fn is_eager(self) -> bool {
        matches!(self, BackendKind::Columnar | BackendKind::Indexed)
    }

    /// Lowercase name used in messages and configuration.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Columnar => "columnar",
            BackendKind::Indexed => "indexed",
            BackendKind::Partitioned => "partitioned",
            BackendKind::Sql => "sql",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage flavor of a row-labelled column.
///
/// The same logical dtype is spelled differently depending on the flavor,
/// and the flavors disagree on how missing values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexedStorage {
    /// Plain numpy-style storage: integers with missing values become floats.
    #[default]
    Numpy,
    /// Nullable extension types (`Int64`, `boolean`, `string`).
    Nullable,
    /// Arrow-backed extension types (`int64[pyarrow]`).
    ArrowBacked,
}

/// Backend selection and per-backend options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Backends that may be used to construct frames.
    pub enabled: Vec<BackendKind>,
    /// Row-labelled engine options.
    pub indexed: IndexedConfig,
    /// Partitioned engine options.
    pub partitioned: PartitionedConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            enabled: BackendKind::ALL.to_vec(),
            indexed: IndexedConfig::default(),
            partitioned: PartitionedConfig::default(),
        }
    }
}

/// Row-labelled engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IndexedConfig {
    /// Storage flavor for frames built from Arrow data.
    pub storage: IndexedStorage,
}

/// Partitioned engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionedConfig {
    /// Number of partitions input data is split into.
    pub npartitions: usize,
}

impl Default for PartitionedConfig {
    fn default() -> Self {
        Self { npartitions: 2 }
    }
}

/// Evaluation toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Log a warning when a group-by falls back to per-group evaluation.
    pub warn_on_complex_group_by: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            warn_on_complex_group_by: true,
        }
    }
}
