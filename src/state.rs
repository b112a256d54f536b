//! Enumerated builder state and the merge policy between states.

use bson::Document;

use crate::filter::Filters;
use crate::pipeline::RawPipeline;

/// Everything a builder accumulates before assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuilderState {
    pub fields: Document,
    pub add_fields: Document,
    pub limit: u64,
    pub skip: u64,
    pub count: Option<Document>,
    /// `None` sorts by `{_id: 1}`.
    pub order: Option<Document>,
    pub filters: Filters,
    pub lookup: Option<Document>,
    pub unwind: Option<Document>,
    pub group: Option<Document>,
    pub pipeline: Option<RawPipeline>,
    pub index_by: Option<String>,
}

impl BuilderState {
    /// Folds `other` into `self`.
    ///
    /// Only members that differ from their default take part. `fields`,
    /// `filters`, `lookup` and `unwind` are concatenated with the running
    /// value; every other member replaces it.
    pub fn merge_from(&mut self, other: &Self) {
        concat_document(&mut self.fields, &other.fields);
        self.filters.extend(&other.filters);
        concat_stage(&mut self.lookup, other.lookup.as_ref());
        concat_stage(&mut self.unwind, other.unwind.as_ref());

        if !other.add_fields.is_empty() {
            self.add_fields = other.add_fields.clone();
        }
        if other.limit != 0 {
            self.limit = other.limit;
        }
        if other.skip != 0 {
            self.skip = other.skip;
        }
        replace(&mut self.count, &other.count);
        replace(&mut self.order, &other.order);
        replace(&mut self.group, &other.group);
        replace(&mut self.pipeline, &other.pipeline);
        replace(&mut self.index_by, &other.index_by);
    }

    /// Merges states left to right, starting from the first.
    pub fn merged<'a>(states: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut out = Self::default();
        for state in states {
            out.merge_from(state);
        }
        out
    }
}

fn concat_document(target: &mut Document, extra: &Document) {
    for (key, value) in extra {
        target.insert(key.clone(), value.clone());
    }
}

// Stage documents share their single top-level key, so concatenation keeps one stage.
fn concat_stage(target: &mut Option<Document>, extra: Option<&Document>) {
    if let Some(extra) = extra {
        concat_document(target.get_or_insert_with(Document::new), extra);
    }
}

fn replace<T: Clone>(target: &mut Option<T>, other: &Option<T>) {
    if other.is_some() {
        target.clone_from(other);
    }
}
