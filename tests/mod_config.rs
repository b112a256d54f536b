use sequeldoc::utils::logger;
use sequeldoc::{MemoryStore, QueryConfig, QueryError, Settings};
use std::io::Write;
use std::sync::Arc;

#[test]
fn settings_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "strict_insert_types = false").unwrap();
    writeln!(file, "log_level = \"trace\"").unwrap();
    writeln!(file, "trace_pipelines = true").unwrap();
    let s = Settings::load(file.path()).unwrap();
    assert!(!s.strict_insert_types);
    assert!(s.trace_pipelines);
    assert_eq!(s.log_level.as_deref(), Some("trace"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, QueryError::Io(_)));
}

#[test]
fn builders_inherit_connection() {
    let cfg = QueryConfig::default();
    assert!(matches!(cfg.builder().collection("x"), Err(QueryError::MissingCollection)));

    let cfg = QueryConfig::default().with_connection(Arc::new(MemoryStore::new()));
    assert!(cfg.builder().collection("x").is_ok());
}

#[test]
fn log_config_with_pipeline_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = logger::file_config(dir.path(), logger::parse_level(Some("debug")), 2, true).unwrap();
    assert_eq!(cfg.appenders().len(), 2);
    assert_eq!(cfg.loggers().len(), 1);
    assert_eq!(cfg.root().level(), log::LevelFilter::Debug);
}
