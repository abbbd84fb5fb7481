//! Unit tests for common-config crate

use common_config::{
    BackendKind, BackendsConfig, EvaluationConfig, IndexedStorage, PartitionedConfig,
    TesseraConfig,
};

#[test]
fn test_tessera_config_default() {
    let config = TesseraConfig::default();

    assert_eq!(config.backends.enabled, BackendKind::ALL.to_vec());
    assert_eq!(config.backends.indexed.storage, IndexedStorage::Numpy);
    assert_eq!(config.backends.partitioned.npartitions, 2);
    assert!(config.evaluation.warn_on_complex_group_by);
}

#[test]
fn test_backends_config_default() {
    let config = BackendsConfig::default();
    assert_eq!(config.enabled.len(), 4);
    assert_eq!(config.partitioned, PartitionedConfig { npartitions: 2 });
}

#[test]
fn test_backend_kind_default_and_eagerness() {
    assert_eq!(BackendKind::default(), BackendKind::Columnar);
    assert!(BackendKind::Columnar.is_eager());
    assert!(BackendKind::Indexed.is_eager());
    assert!(!BackendKind::Partitioned.is_eager());
    assert!(!BackendKind::Sql.is_eager());
    assert_eq!(BackendKind::Partitioned.to_string(), "partitioned");
}

#[test]
fn test_tessera_config_serialization() {
    let config = TesseraConfig::default();
    let json = serde_json::to_string(&config).expect("Failed to serialize");
    let deserialized: TesseraConfig = serde_json::from_str(&json).expect("Failed to deserialize");
    assert_eq!(config, deserialized);
}

#[test]
fn test_partial_json_takes_defaults() {
    let config = TesseraConfig::from_json(
        r#"{"backends": {"enabled": ["columnar", "sql"], "indexed": {"storage": "arrow_backed"}}}"#,
    )
    .unwrap();

    assert_eq!(
        config.backends.enabled,
        vec![BackendKind::Columnar, BackendKind::Sql]
    );
    assert_eq!(config.backends.indexed.storage, IndexedStorage::ArrowBacked);
    assert_eq!(config.backends.partitioned.npartitions, 2);
    assert_eq!(config.evaluation, EvaluationConfig::default());
}

#[test]
fn test_invalid_json_is_an_error() {
    let err = TesseraConfig::from_json("{\"backends\": 3}").unwrap_err();
    assert!(err.to_string().starts_with("SerdeJsonError"));
}

#[test]
fn test_to_json_roundtrip() {
    let mut config = TesseraConfig::default();
    config.backends.partitioned.npartitions = 5;
    config.evaluation.warn_on_complex_group_by = false;

    let json = config.to_json().unwrap();
    assert!(json.contains("\"npartitions\": 5"));
    assert_eq!(TesseraConfig::from_json(&json).unwrap(), config);
}
