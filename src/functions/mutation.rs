//! Update-side functions: increment, array push and array pull.

use bson::{Bson, Document, doc};

#[derive(Debug, Clone, PartialEq)]
pub struct Increment {
    pub field: String,
    pub amount: i64,
}

impl Increment {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), amount: 1 }
    }

    pub fn by(field: impl Into<String>, amount: i64) -> Self {
        Self { field: field.into(), amount }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        let mut inc = Document::new();
        inc.insert(self.field.clone(), self.amount);
        doc! { "$inc": inc }
    }
}

/// Appends every value with `$each`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPush {
    pub field: String,
    pub values: Vec<Bson>,
}

impl ArrayPush {
    pub fn new<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self { field: field.into(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn one(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), values: vec![value.into()] }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        let mut push = Document::new();
        push.insert(self.field.clone(), doc! { "$each": self.values.clone() });
        doc! { "$push": push }
    }
}

/// Removes matching elements.
///
/// A scalar is matched as-is, an array becomes `{$in: [...]}`, and inside a
/// sub-document condition every array member becomes its own `$in` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPull {
    pub field: String,
    pub value: Bson,
}

impl ArrayPull {
    pub fn new(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), value: value.into() }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        let condition = match &self.value {
            Bson::Array(values) => Bson::Document(doc! { "$in": values.clone() }),
            Bson::Document(members) => {
                let mut out = Document::new();
                for (key, member) in members {
                    match member {
                        Bson::Array(values) => {
                            out.insert(key.clone(), doc! { "$in": values.clone() });
                        }
                        other => {
                            out.insert(key.clone(), other.clone());
                        }
                    }
                }
                Bson::Document(out)
            }
            scalar => scalar.clone(),
        };
        let mut pull = Document::new();
        pull.insert(self.field.clone(), condition);
        doc! { "$pull": pull }
    }
}
