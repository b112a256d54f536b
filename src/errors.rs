use thiserror::Error;

/// Boxed failure reported by an execution backend. Passed through untouched.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Collections can only be set by name when a connection is configured")]
    MissingCollection,

    #[error("A collection must be set before running a query")]
    NoCollection,

    #[error("A filter (where clause) is required to {0} records")]
    MissingFilter(&'static str),

    #[error("Insert: expecting at least one document")]
    EmptyInsert,

    #[error("Insert: all documents must share one type (expected {expected}, found {found})")]
    MixedInsertTypes { expected: &'static str, found: &'static str },

    #[error("Property '{0}' not selected")]
    UnselectedIndexKey(String),

    #[error("Indexing is only available for multi-document results")]
    IndexOnSingleResult,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Backend(BackendError),
}

impl From<std::io::Error> for QueryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for QueryError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
