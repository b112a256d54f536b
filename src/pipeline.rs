//! Deterministic stage assembly.

use bson::{Bson, Document, doc};

use crate::state::BuilderState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Stages lead the pipeline, ahead of generated stages.
    Before,
    /// Stages are appended after generated stages.
    After,
}

/// Caller-supplied stages spliced into the generated pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPipeline {
    pub stages: Vec<Document>,
    pub placement: Placement,
}

impl RawPipeline {
    #[must_use]
    pub fn new(stages: Vec<Document>, placement: Placement) -> Self {
        Self { stages, placement }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Default sort when none is configured.
#[must_use]
pub fn default_order() -> Document {
    doc! { "_id": 1 }
}

/// Stage order: raw(before), `$lookup`, `$unwind`, `$addFields`, `$match`, `$sort`,
/// `$skip`, `$limit`, `$count`, `$project`, `$group`, raw(after).
///
/// `$sort` is omitted whenever a non-empty raw pipeline is configured.
#[must_use]
pub fn assemble(state: &BuilderState) -> Vec<Document> {
    let raw = state.pipeline.as_ref().filter(|p| !p.is_empty());
    let mut stages = match raw {
        Some(p) if p.placement == Placement::Before => p.stages.clone(),
        _ => Vec::new(),
    };
    if let Some(lookup) = &state.lookup {
        stages.push(lookup.clone());
    }
    if let Some(unwind) = &state.unwind {
        stages.push(unwind.clone());
    }
    if !state.add_fields.is_empty() {
        stages.push(doc! { "$addFields": state.add_fields.clone() });
    }
    if !state.filters.is_empty() {
        stages.push(doc! { "$match": state.filters.normalized() });
    }
    if raw.is_none() {
        let order = state.order.clone().unwrap_or_else(default_order);
        stages.push(doc! { "$sort": order });
    }
    if state.skip > 0 {
        stages.push(doc! { "$skip": to_bson_count(state.skip) });
    }
    if state.limit > 0 {
        stages.push(doc! { "$limit": to_bson_count(state.limit) });
    }
    if let Some(count) = &state.count {
        stages.push(count.clone());
    }
    if !state.fields.is_empty() {
        stages.push(doc! { "$project": state.fields.clone() });
    }
    if let Some(group) = &state.group {
        stages.push(group.clone());
    }
    if let Some(p) = raw.filter(|p| p.placement == Placement::After) {
        stages.extend(p.stages.iter().cloned());
    }
    stages
}

fn to_bson_count(n: u64) -> Bson {
    i64::try_from(n).map_or(Bson::Int64(i64::MAX), Bson::Int64)
}
