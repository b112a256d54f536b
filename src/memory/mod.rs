//! In-process reference backend.
//!
//! `MemoryStore` interprets the stage and operator subset the builder emits,
//! which makes it suitable for tests and for embedding without a server.
//! It is not a general-purpose document database.

pub mod eval;
pub mod mutate;
pub mod stages;

use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::backend::{Backend, Cursor, DeleteReport, InsertReport, UpdateReport};
use crate::errors::BackendError;
use stages::Collections;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unsupported stage: {0}")]
    UnsupportedStage(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Replaces the contents of `collection` without assigning ids.
    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        self.collections.write().insert(collection.to_string(), documents);
    }

    /// Snapshot of `collection` in insertion order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Backend for MemoryStore {
    fn aggregate(&self, collection: &str, pipeline: &[Document]) -> Result<Cursor, BackendError> {
        let start = Instant::now();
        let guard = self.collections.read();
        let docs = guard.get(collection).cloned().unwrap_or_default();
        let out = stages::run_pipeline(&guard, docs, pipeline, &Document::new())?;
        crate::pipeline_trace!(
            "{{\"op\":\"aggregate\",\"collection\":\"{}\",\"stages\":{},\"rows\":{},\"duration_us\":{}}}",
            collection,
            pipeline.len(),
            out.len(),
            start.elapsed().as_micros()
        );
        Ok(Cursor::new(out))
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<InsertReport, BackendError> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut prepared = Vec::with_capacity(documents.len());
        for mut d in documents {
            let id = match d.get("_id") {
                Some(id) => id.clone(),
                None => {
                    let id = Bson::ObjectId(ObjectId::new());
                    let mut with_id = Document::new();
                    with_id.insert("_id", id.clone());
                    for (k, v) in d {
                        with_id.insert(k, v);
                    }
                    d = with_id;
                    id
                }
            };
            ids.push(id);
            prepared.push(d);
        }
        self.collections.write().entry(collection.to_string()).or_default().extend(prepared);
        log::debug!("memory store: inserted {} into {}", ids.len(), collection);
        Ok(InsertReport { inserted_ids: ids })
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> Result<UpdateReport, BackendError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(UpdateReport::default());
        };
        let vars = Document::new();
        let mut report = UpdateReport::default();
        for d in docs.iter_mut() {
            if !eval::matches(d, filter, &vars)? {
                continue;
            }
            report.matched += 1;
            let mut candidate = d.clone();
            if mutate::apply_update(&mut candidate, update)? {
                *d = candidate;
                report.modified += 1;
            }
        }
        crate::pipeline_trace!(
            "{{\"op\":\"update_many\",\"collection\":\"{}\",\"matched\":{},\"modified\":{}}}",
            collection,
            report.matched,
            report.modified
        );
        Ok(report)
    }

    fn delete_many(&self, collection: &str, filter: &Document) -> Result<DeleteReport, BackendError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(DeleteReport::default());
        };
        let vars = Document::new();
        let mut keep = Vec::with_capacity(docs.len());
        for d in docs.iter() {
            keep.push(!eval::matches(d, filter, &vars)?);
        }
        let before = docs.len();
        let mut flags = keep.into_iter();
        docs.retain(|_| flags.next().unwrap_or(true));
        let deleted = u64::try_from(before - docs.len()).unwrap_or(u64::MAX);
        crate::pipeline_trace!(
            "{{\"op\":\"delete_many\",\"collection\":\"{}\",\"deleted\":{}}}",
            collection,
            deleted
        );
        Ok(DeleteReport { deleted })
    }
}
