//! The execution collaborator: whatever actually runs pipelines and mutations.

use bson::{Bson, Document};
use std::fmt;
use std::sync::Arc;

use crate::errors::BackendError;

pub trait Backend: Send + Sync {
    /// Runs `pipeline` against `collection`.
    ///
    /// # Errors
    /// Store or transport failures, surfaced unmodified to the caller.
    fn aggregate(&self, collection: &str, pipeline: &[Document]) -> Result<Cursor, BackendError>;

    /// # Errors
    /// Store or transport failures.
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<InsertReport, BackendError>;

    /// # Errors
    /// Store or transport failures.
    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateReport, BackendError>;

    /// # Errors
    /// Store or transport failures.
    fn delete_many(&self, collection: &str, filter: &Document)
    -> Result<DeleteReport, BackendError>;
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Backend")
    }
}

/// A resolved collection: backend plus collection name.
#[derive(Clone, Debug)]
pub struct Collection {
    pub backend: Arc<dyn Backend>,
    pub name: String,
}

impl Collection {
    pub fn new(backend: Arc<dyn Backend>, name: impl Into<String>) -> Self {
        Self { backend, name: name.into() }
    }
}

/// Documents returned by [`Backend::aggregate`].
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    docs: Vec<Document>,
    pos: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs, pos: 0 }
    }

    pub fn advance(&mut self) -> Option<Document> {
        let d = self.docs.get(self.pos).cloned()?;
        self.pos += 1;
        Some(d)
    }

    /// Remaining documents.
    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        self.docs.split_off(self.pos.min(self.docs.len()))
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InsertReport {
    pub inserted_ids: Vec<Bson>,
}

impl InsertReport {
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserted_ids.len()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
