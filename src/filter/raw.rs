use bson::{Bson, Document};

use crate::operator::BoolOp;

/// Caller-built boolean group, rendered as `{ $and|$or: [conditions...] }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFilter {
    operator: BoolOp,
    conditions: Vec<Document>,
}

impl RawFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_operator(operator: BoolOp) -> Self {
        Self { operator, conditions: Vec::new() }
    }

    /// Seeds a group with a single condition.
    #[must_use]
    pub fn from_document(condition: Document) -> Self {
        let mut raw = Self::new();
        raw.push(condition);
        raw
    }

    pub fn from_documents(conditions: impl IntoIterator<Item = Document>) -> Self {
        let mut raw = Self::new();
        raw.push_many(conditions);
        raw
    }

    pub fn push(&mut self, condition: Document) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Nests another group as one condition.
    pub fn push_filter(&mut self, filter: &Self) -> &mut Self {
        self.conditions.push(filter.as_document());
        self
    }

    pub fn push_many(&mut self, conditions: impl IntoIterator<Item = Document>) -> &mut Self {
        self.conditions.extend(conditions);
        self
    }

    #[must_use]
    pub fn operator(&self) -> BoolOp {
        self.operator
    }

    #[must_use]
    pub fn conditions(&self) -> &[Document] {
        &self.conditions
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        let conditions: Vec<Bson> = self.conditions.iter().cloned().map(Bson::Document).collect();
        let mut out = Document::new();
        out.insert(self.operator.key(), conditions);
        out
    }
}
