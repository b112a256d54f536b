//! Projection resolution for `select`.

use bson::{Bson, Document};

use crate::functions::{ArrayLength, Count, Max, Min};

/// One requested output field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Name(String),
    Alias { source: String, alias: String },
    Length(ArrayLength),
    Count(Count),
    Max(Max),
    Min(Min),
}

impl Field {
    /// Projects `source` under the name `alias`.
    pub fn alias(source: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Alias { source: source.into(), alias: alias.into() }
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<ArrayLength> for Field {
    fn from(f: ArrayLength) -> Self {
        Self::Length(f)
    }
}

impl From<Count> for Field {
    fn from(f: Count) -> Self {
        Self::Count(f)
    }
}

impl From<Max> for Field {
    fn from(f: Max) -> Self {
        Self::Max(f)
    }
}

impl From<Min> for Field {
    fn from(f: Min) -> Self {
        Self::Min(f)
    }
}

/// Stage fragments contributed by one `select` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub fields: Document,
    pub add_fields: Document,
    pub group: Option<Document>,
    pub count: Option<Document>,
}

impl Selection {
    pub fn resolve<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let mut out = Self::default();
        for field in fields {
            match field.into() {
                Field::Name(name) => {
                    out.fields.insert(name, 1);
                }
                Field::Alias { source, alias } => {
                    out.fields.insert(alias, format!("${source}"));
                }
                Field::Length(length) => {
                    for (key, expr) in length.as_document() {
                        out.add_fields.insert(key, expr);
                    }
                    out.fields.insert(length.alias, 1);
                }
                Field::Count(count) => out.count = Some(count.as_document()),
                // one group per query; the last aggregate wins
                Field::Max(max) => out.group = Some(max.as_document()),
                Field::Min(min) => out.group = Some(min.as_document()),
            }
        }
        // the store returns _id unless told otherwise
        if !out.fields.contains_key("_id") {
            out.fields.insert("_id", Bson::Int32(0));
        }
        out
    }
}
