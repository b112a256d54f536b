//! Update payloads and their decomposition into mutation operators.

use bson::{Bson, Document};
use serde::Serialize;

use crate::errors::QueryError;
use crate::functions::{ArrayPull, ArrayPush, Increment};
use crate::utils::json;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    Set(Bson),
    Increment(Increment),
    Push(ArrayPush),
    Pull(ArrayPull),
}

impl From<Bson> for UpdateValue {
    fn from(v: Bson) -> Self {
        Self::Set(v)
    }
}

impl From<Increment> for UpdateValue {
    fn from(f: Increment) -> Self {
        Self::Increment(f)
    }
}

impl From<ArrayPush> for UpdateValue {
    fn from(f: ArrayPush) -> Self {
        Self::Push(f)
    }
}

impl From<ArrayPull> for UpdateValue {
    fn from(f: ArrayPull) -> Self {
        Self::Pull(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Flat field -> value payload; special functions are split out.
    Fields(Vec<(String, UpdateValue)>),
    /// Whole object written with `$set`.
    Replacement(Document),
}

impl Update {
    #[must_use]
    pub fn fields() -> Self {
        Self::Fields(Vec::new())
    }

    #[must_use]
    pub fn set(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.with(field, UpdateValue::Set(value.into()))
    }

    /// Adds an entry under `field`. Special functions carry their own target field.
    #[must_use]
    pub fn with(self, field: impl Into<String>, value: impl Into<UpdateValue>) -> Self {
        match self {
            Self::Fields(mut entries) => {
                entries.push((field.into(), value.into()));
                Self::Fields(entries)
            }
            Self::Replacement(mut doc) => {
                match value.into() {
                    UpdateValue::Set(v) => {
                        doc.insert(field, v);
                    }
                    other => log::warn!("ignoring {other:?} on a replacement update"),
                }
                Self::Replacement(doc)
            }
        }
    }

    #[must_use]
    pub fn increment(self, inc: Increment) -> Self {
        let field = inc.field.clone();
        self.with(field, inc)
    }

    #[must_use]
    pub fn push(self, push: ArrayPush) -> Self {
        let field = push.field.clone();
        self.with(field, push)
    }

    #[must_use]
    pub fn pull(self, pull: ArrayPull) -> Self {
        let field = pull.field.clone();
        self.with(field, pull)
    }

    #[must_use]
    pub fn replacement(doc: Document) -> Self {
        Self::Replacement(doc)
    }

    /// Serializes `object` into a replacement payload.
    ///
    /// # Errors
    /// `QueryError::Serialization` if `object` does not serialize to a document.
    pub fn from_object<T: Serialize>(object: &T) -> Result<Self, QueryError> {
        Ok(Self::Replacement(json::to_document(object)?))
    }

    /// Builds the mutation document: `$set`, `$inc`, `$push`, `$pull`, in that order when present.
    #[must_use]
    pub fn decompose(&self) -> Document {
        let entries = match self {
            Self::Replacement(doc) => {
                let mut out = Document::new();
                out.insert("$set", doc.clone());
                return out;
            }
            Self::Fields(entries) => entries,
        };
        let mut set = Document::new();
        let mut inc = Document::new();
        let mut push = Document::new();
        let mut pull = Document::new();
        for (field, value) in entries {
            match value {
                UpdateValue::Set(v) => {
                    set.insert(field.clone(), v.clone());
                }
                UpdateValue::Increment(f) => merge_fragment(&mut inc, &f.as_document(), "$inc"),
                UpdateValue::Push(f) => merge_fragment(&mut push, &f.as_document(), "$push"),
                UpdateValue::Pull(f) => merge_fragment(&mut pull, &f.as_document(), "$pull"),
            }
        }
        let mut out = Document::new();
        for (key, part) in [("$set", set), ("$inc", inc), ("$push", push), ("$pull", pull)] {
            if !part.is_empty() {
                out.insert(key, part);
            }
        }
        out
    }
}

impl From<Document> for Update {
    fn from(doc: Document) -> Self {
        Self::Fields(doc.into_iter().map(|(k, v)| (k, UpdateValue::Set(v))).collect())
    }
}

/// Key-level merge of `fragment[operator]` into `target`; a repeated field is last-write-wins.
fn merge_fragment(target: &mut Document, fragment: &Document, operator: &str) {
    if let Ok(inner) = fragment.get_document(operator) {
        for (field, value) in inner {
            target.insert(field.clone(), value.clone());
        }
    }
}
