//! Projection-side functions: array length, count, max and min.

use bson::{Bson, Document, doc};

/// Adds `{alias: {$size: "$field"}}` as a computed field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLength {
    pub field: String,
    pub alias: String,
}

impl ArrayLength {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        let alias = format!("{field}_length");
        Self { field, alias }
    }

    pub fn aliased(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { field: field.into(), alias: alias.into() }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        let mut out = Document::new();
        out.insert(self.alias.clone(), doc! { "$size": format!("${}", self.field) });
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Count {
    pub field: String,
    pub alias: String,
}

impl Count {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        let alias = format!("{field}_size");
        Self { field, alias }
    }

    pub fn aliased(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { field: field.into(), alias: alias.into() }
    }

    /// Terminal `$count` stage naming the output field.
    #[must_use]
    pub fn as_document(&self) -> Document {
        doc! { "$count": self.alias.clone() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Max {
    pub field: String,
    pub alias: String,
}

impl Max {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        let alias = format!("{field}_max");
        Self { field, alias }
    }

    pub fn aliased(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { field: field.into(), alias: alias.into() }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        group_stage(&self.alias, "$max", &self.field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Min {
    pub field: String,
    pub alias: String,
}

impl Min {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        let alias = format!("{field}_min");
        Self { field, alias }
    }

    pub fn aliased(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { field: field.into(), alias: alias.into() }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        group_stage(&self.alias, "$min", &self.field)
    }
}

fn group_stage(alias: &str, accumulator: &str, field: &str) -> Document {
    let mut group = doc! { "_id": Bson::Null };
    let mut expr = Document::new();
    expr.insert(accumulator, format!("${field}"));
    group.insert(alias, expr);
    doc! { "$group": group }
}
