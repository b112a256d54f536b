//! Process-scoped configuration.
//!
//! `QueryConfig` is built once at startup and handed to every place that creates
//! builders. Builders read it at construction and never write back to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::Backend;
use crate::builder::QueryBuilder;
use crate::errors::QueryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Refuse multi-document inserts whose records are of different types.
    pub strict_insert_types: bool,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    /// Route assembled pipelines to their own log file.
    pub trace_pipelines: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { strict_insert_types: true, log_level: None, log_dir: None, trace_pipelines: false }
    }
}

impl Settings {
    /// # Errors
    /// `QueryError::Config` on malformed TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, QueryError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, QueryError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Overlays `SEQUELDOC_STRICT_INSERTS`, `SEQUELDOC_LOG_LEVEL` and `SEQUELDOC_LOG_DIR`.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_vars(|k| std::env::var(k).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(s) = var("SEQUELDOC_STRICT_INSERTS") {
            self.strict_insert_types =
                matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(s) = var("SEQUELDOC_LOG_LEVEL") {
            self.log_level = Some(s);
        }
        if let Some(s) = var("SEQUELDOC_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(s));
        }
        self
    }
}

/// Default connection plus settings shared by every builder it creates.
#[derive(Clone, Default)]
pub struct QueryConfig {
    pub connection: Option<Arc<dyn Backend>>,
    pub settings: Settings,
}

impl QueryConfig {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self { connection: None, settings }
    }

    #[must_use]
    pub fn with_connection(mut self, backend: Arc<dyn Backend>) -> Self {
        self.connection = Some(backend);
        self
    }

    /// A fresh builder inheriting the default connection and insert policy.
    #[must_use]
    pub fn builder(&self) -> QueryBuilder {
        QueryBuilder::with_config(self)
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("connection", &self.connection.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
