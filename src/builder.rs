//! The fluent query builder.
//!
//! A builder owns its [`BuilderState`] exclusively. Configuration calls mutate
//! it in place; `find`, `find_all`, `count`, `update` and `delete` consume the
//! state by handing assembled documents to the configured [`Backend`].

use bson::{Bson, Document, doc};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::backend::{Backend, Collection, DeleteReport, InsertReport, UpdateReport};
use crate::config::QueryConfig;
use crate::errors::QueryError;
use crate::filter::{
    Predicate, RawFilter, contains_pattern, ends_with_pattern, resolve_value,
    starts_with_pattern,
};
use crate::join::{Join, unwind_stage};
use crate::operator::{BoolOp, Order, translate};
use crate::pipeline::{Placement, RawPipeline, assemble};
use crate::results::ResultSet;
use crate::select::{Field, Selection};
use crate::state::BuilderState;
use crate::update::Update;
use crate::utils::json;

/// Anything that can be written as one document of a multi-document insert.
pub trait Record {
    /// Concrete type name, compared when strict insert typing is on.
    fn record_type(&self) -> &'static str;

    /// # Errors
    /// `QueryError::Serialization` if the value is not document-shaped.
    fn to_record(&self) -> Result<Document, QueryError>;
}

impl<T: serde::Serialize> Record for T {
    fn record_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_record(&self) -> Result<Document, QueryError> {
        json::to_document(self)
    }
}

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    connection: Option<Arc<dyn Backend>>,
    collection: Option<Collection>,
    state: BuilderState,
    expect_many: bool,
    strict_inserts: bool,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            connection: None,
            collection: None,
            state: BuilderState::default(),
            expect_many: true,
            strict_inserts: true,
        }
    }
}

impl QueryBuilder {
    /// A builder with no connection; collections must be given as handles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: &QueryConfig) -> Self {
        Self {
            connection: config.connection.clone(),
            strict_inserts: config.settings.strict_insert_types,
            ..Self::default()
        }
    }

    /// Overrides the default connection.
    #[must_use]
    pub fn with_connection(mut self, backend: Arc<dyn Backend>) -> Self {
        self.connection = Some(backend);
        self
    }

    /// Resolves `name` through the builder's connection.
    ///
    /// # Errors
    /// `QueryError::MissingCollection` when no connection is configured.
    pub fn collection(&mut self, name: &str) -> Result<&mut Self, QueryError> {
        let backend = self.connection.clone().ok_or(QueryError::MissingCollection)?;
        self.collection = Some(Collection::new(backend, name));
        Ok(self)
    }

    pub fn collection_handle(&mut self, collection: Collection) -> &mut Self {
        self.collection = Some(collection);
        self
    }

    #[must_use]
    pub fn state(&self) -> &BuilderState {
        &self.state
    }

    pub fn strict_inserts(&mut self, strict: bool) -> &mut Self {
        self.strict_inserts = strict;
        self
    }

    // ---- selection ----

    /// Replaces the current selection.
    pub fn select<I, F>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let Selection { fields, add_fields, group, count } = Selection::resolve(fields);
        self.state.fields = fields;
        self.state.add_fields = add_fields;
        self.state.group = group;
        self.state.count = count;
        self
    }

    // ---- filters ----

    /// Two-argument form: `where(field, value)` compares with equality, unless
    /// `value` is itself a comparator token.
    pub fn where_(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.push_where(BoolOp::And, field, value.into());
        self
    }

    pub fn or_where(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.push_where(BoolOp::Or, field, value.into());
        self
    }

    /// # Errors
    /// `QueryError::InvalidOperator` for an unknown comparator token.
    pub fn where_op(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Bson>,
    ) -> Result<&mut Self, QueryError> {
        self.push_operator(BoolOp::And, field, operator, value.into())?;
        Ok(self)
    }

    /// # Errors
    /// `QueryError::InvalidOperator` for an unknown comparator token.
    pub fn or_where_op(
        &mut self,
        field: &str,
        operator: &str,
        value: impl Into<Bson>,
    ) -> Result<&mut Self, QueryError> {
        self.push_operator(BoolOp::Or, field, operator, value.into())?;
        Ok(self)
    }

    /// Compares against a UTC timestamp.
    ///
    /// # Errors
    /// `QueryError::InvalidOperator` for an unknown comparator token.
    pub fn where_date(
        &mut self,
        field: &str,
        operator: &str,
        value: DateTime<Utc>,
    ) -> Result<&mut Self, QueryError> {
        self.where_op(field, operator, utc_timestamp(value))
    }

    /// # Errors
    /// `QueryError::InvalidOperator` for an unknown comparator token.
    pub fn or_where_date(
        &mut self,
        field: &str,
        operator: &str,
        value: DateTime<Utc>,
    ) -> Result<&mut Self, QueryError> {
        self.or_where_op(field, operator, utc_timestamp(value))
    }

    /// Records a pre-built filter verbatim.
    pub fn where_filter(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
        self.state.filters.push(BoolOp::And, predicate.into().as_document());
        self
    }

    pub fn or_where_filter(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
        self.state.filters.push(BoolOp::Or, predicate.into().as_document());
        self
    }

    /// Parenthesised group: `build` fills a fresh builder whose normalized
    /// filter becomes one entry here.
    ///
    /// # Errors
    /// Whatever `build` returns.
    pub fn where_group<F>(&mut self, build: F) -> Result<&mut Self, QueryError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), QueryError>,
    {
        let group = Self::nested(build)?;
        Ok(self.where_filter(group))
    }

    /// # Errors
    /// Whatever `build` returns.
    pub fn or_where_group<F>(&mut self, build: F) -> Result<&mut Self, QueryError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), QueryError>,
    {
        let group = Self::nested(build)?;
        Ok(self.or_where_filter(group))
    }

    pub fn where_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.push_fixed(BoolOp::And, field, "$in", collect_values(values));
        self
    }

    pub fn where_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.push_fixed(BoolOp::And, field, "$nin", collect_values(values));
        self
    }

    pub fn or_where_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.push_fixed(BoolOp::Or, field, "$in", collect_values(values));
        self
    }

    pub fn or_where_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.push_fixed(BoolOp::Or, field, "$nin", collect_values(values));
        self
    }

    pub fn where_regex(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.push_fixed(BoolOp::And, field, "$regex", pattern.into());
        self
    }

    pub fn or_where_regex(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.push_fixed(BoolOp::Or, field, "$regex", pattern.into());
        self
    }

    pub fn where_contains(&mut self, field: &str, value: &str, case_sensitive: bool) -> &mut Self {
        self.where_regex(field, &contains_pattern(value, case_sensitive))
    }

    pub fn where_starts_with(&mut self, field: &str, value: &str, case_sensitive: bool) -> &mut Self {
        self.where_regex(field, &starts_with_pattern(value, case_sensitive))
    }

    pub fn where_ends_with(&mut self, field: &str, value: &str, case_sensitive: bool) -> &mut Self {
        self.where_regex(field, &ends_with_pattern(value, case_sensitive))
    }

    pub fn or_where_contains(&mut self, field: &str, value: &str, case_sensitive: bool) -> &mut Self {
        self.or_where_regex(field, &contains_pattern(value, case_sensitive))
    }

    pub fn or_where_starts_with(
        &mut self,
        field: &str,
        value: &str,
        case_sensitive: bool,
    ) -> &mut Self {
        self.or_where_regex(field, &starts_with_pattern(value, case_sensitive))
    }

    pub fn or_where_ends_with(&mut self, field: &str, value: &str, case_sensitive: bool) -> &mut Self {
        self.or_where_regex(field, &ends_with_pattern(value, case_sensitive))
    }

    /// The accumulated filters collapsed into one document.
    #[must_use]
    pub fn normalized_filters(&self) -> Document {
        self.state.filters.normalized()
    }

    fn nested<F>(build: F) -> Result<RawFilter, QueryError>
    where
        F: FnOnce(&mut QueryBuilder) -> Result<(), QueryError>,
    {
        let mut inner = Self::new();
        build(&mut inner)?;
        Ok(RawFilter::from_document(inner.normalized_filters()))
    }

    fn push_where(&mut self, prefix: BoolOp, field: &str, operator_or_value: Bson) {
        let (operator, value) = resolve_value(operator_or_value);
        self.state.filters.push_comparison(prefix, field, operator, value);
    }

    fn push_operator(&mut self, prefix: BoolOp, field: &str, token: &str, value: Bson) -> Result<(), QueryError> {
        let operator = translate(token)?;
        self.state.filters.push_comparison(prefix, field, operator, value);
        Ok(())
    }

    fn push_fixed(&mut self, prefix: BoolOp, field: &str, operator: &str, value: Bson) {
        self.state.filters.push_comparison(prefix, field, operator, value);
    }

    // ---- joins ----

    /// Equality join: `local_field == collection.foreign_field`.
    pub fn join(&mut self, collection: &str, local_field: &str, foreign_field: &str) -> &mut Self {
        self.join_with(&Join::new(collection, local_field, foreign_field))
    }

    /// # Errors
    /// `QueryError::InvalidOperator` for an unknown comparator token.
    pub fn join_op(
        &mut self,
        collection: &str,
        local_field: &str,
        operator: &str,
        foreign_field: &str,
    ) -> Result<&mut Self, QueryError> {
        let join = Join::with_operator(collection, local_field, operator, foreign_field)?;
        Ok(self.join_with(&join))
    }

    /// Replaces any previous join.
    pub fn join_with(&mut self, join: &Join) -> &mut Self {
        self.state.lookup = Some(join.lookup_stage());
        self.state.unwind = Some(join.unwind_stage());
        self
    }

    /// Replaces the unwind stage.
    pub fn unwind(
        &mut self,
        path: &str,
        include_array_index: Option<&str>,
        preserve_null_and_empty_arrays: bool,
    ) -> &mut Self {
        self.state.unwind =
            Some(unwind_stage(path, include_array_index, preserve_null_and_empty_arrays));
        self
    }

    // ---- paging and ordering ----

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.state.limit = limit;
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.state.skip = offset;
        self
    }

    pub fn order(&mut self, field: &str, direction: impl Into<Order>) -> &mut Self {
        let mut order = Document::new();
        order.insert(field, direction.into().as_i32());
        self.state.order = Some(order);
        self
    }

    /// Splices raw stages before or after the generated ones.
    pub fn pipeline(&mut self, stages: Vec<Document>, before: bool) -> &mut Self {
        let placement = if before { Placement::Before } else { Placement::After };
        self.state.pipeline = Some(RawPipeline::new(stages, placement));
        self
    }

    /// Keys `ResultSet::indexed` by `field`.
    ///
    /// # Errors
    /// `QueryError::UnselectedIndexKey` if a projection exists without `field`.
    pub fn index_by(&mut self, field: &str) -> Result<&mut Self, QueryError> {
        if !self.state.fields.is_empty() && !self.state.fields.contains_key(field) {
            return Err(QueryError::UnselectedIndexKey(field.to_string()));
        }
        self.state.index_by = Some(field.to_string());
        Ok(self)
    }

    // ---- execution ----

    /// The stage sequence `find_all` would send.
    #[must_use]
    pub fn pipeline_stages(&self) -> Vec<Document> {
        assemble(&self.state)
    }

    /// First matching document only.
    ///
    /// # Errors
    /// `QueryError::NoCollection` without a collection, or a backend failure.
    pub fn find(&mut self) -> Result<ResultSet, QueryError> {
        self.expect_many = false;
        self.limit(1);
        self.run()
    }

    /// # Errors
    /// `QueryError::NoCollection` without a collection, or a backend failure.
    pub fn find_all(&mut self) -> Result<ResultSet, QueryError> {
        self.expect_many = true;
        self.run()
    }

    /// Number of matching documents; zero when nothing matches.
    ///
    /// # Errors
    /// `QueryError::NoCollection` without a collection, or a backend failure.
    pub fn count(&mut self) -> Result<u64, QueryError> {
        self.state.count = Some(doc! { "$count": "count" });
        let rows = self.find_all()?.into_documents();
        let n = match rows.first().and_then(|r| r.get("count")) {
            Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
            Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Some(Bson::Double(n)) if *n > 0.0 => *n as u64,
            _ => 0,
        };
        Ok(n)
    }

    fn run(&self) -> Result<ResultSet, QueryError> {
        let collection = self.target()?;
        let stages = self.pipeline_stages();
        crate::pipeline_trace!(
            "aggregate collection={} stages={}",
            collection.name,
            Bson::from(stages.clone())
        );
        log::debug!("aggregate on {} with {} stages", collection.name, stages.len());
        let cursor =
            collection.backend.aggregate(&collection.name, &stages).map_err(QueryError::Backend)?;
        Ok(ResultSet::new(cursor.to_vec(), self.expect_many, self.state.index_by.clone()))
    }

    fn target(&self) -> Result<&Collection, QueryError> {
        self.collection.as_ref().ok_or(QueryError::NoCollection)
    }

    // ---- mutation ----

    /// # Errors
    /// `QueryError::EmptyInsert` for no documents, or a backend failure.
    pub fn insert(&self, documents: Vec<Document>) -> Result<InsertReport, QueryError> {
        if documents.is_empty() {
            return Err(QueryError::EmptyInsert);
        }
        let collection = self.target()?;
        log::info!("insert {} documents into {}", documents.len(), collection.name);
        collection.backend.insert_many(&collection.name, documents).map_err(QueryError::Backend)
    }

    /// # Errors
    /// A backend failure.
    pub fn insert_one(&self, document: Document) -> Result<InsertReport, QueryError> {
        self.insert(vec![document])
    }

    /// Inserts serializable records.
    ///
    /// # Errors
    /// `QueryError::EmptyInsert`, `QueryError::MixedInsertTypes` under strict typing,
    /// a serialization failure, or a backend failure.
    pub fn insert_records(&self, records: &[&dyn Record]) -> Result<InsertReport, QueryError> {
        let Some(first) = records.first() else {
            return Err(QueryError::EmptyInsert);
        };
        if self.strict_inserts {
            let expected = first.record_type();
            if let Some(other) = records.iter().find(|r| r.record_type() != expected) {
                return Err(QueryError::MixedInsertTypes { expected, found: other.record_type() });
            }
        }
        let documents = records.iter().map(|r| r.to_record()).collect::<Result<Vec<_>, _>>()?;
        self.insert(documents)
    }

    /// Applies `update` to every matching document.
    ///
    /// # Errors
    /// `QueryError::MissingFilter` without a where clause, or a backend failure.
    pub fn update(&self, update: impl Into<Update>) -> Result<UpdateReport, QueryError> {
        if self.state.filters.is_empty() {
            return Err(QueryError::MissingFilter("update"));
        }
        let collection = self.target()?;
        let filter = self.normalized_filters();
        let mutation = update.into().decompose();
        crate::pipeline_trace!("update collection={} filter={} update={}", collection.name, filter, mutation);
        log::debug!("update on {}", collection.name);
        collection
            .backend
            .update_many(&collection.name, &filter, &mutation)
            .map_err(QueryError::Backend)
    }

    /// # Errors
    /// `QueryError::MissingFilter` without a where clause, or a backend failure.
    pub fn delete(&self) -> Result<DeleteReport, QueryError> {
        if self.state.filters.is_empty() {
            return Err(QueryError::MissingFilter("delete"));
        }
        let collection = self.target()?;
        let filter = self.normalized_filters();
        crate::pipeline_trace!("delete collection={} filter={}", collection.name, filter);
        log::debug!("delete on {}", collection.name);
        collection.backend.delete_many(&collection.name, &filter).map_err(QueryError::Backend)
    }

    // ---- composition ----

    /// Combines independently built queries into a new builder.
    ///
    /// States merge left to right (see [`BuilderState::merge_from`]); the
    /// connection and collection are taken from the last builder that has one.
    /// Strict insert typing stays on unless some builder turned it off.
    pub fn merge(builders: impl IntoIterator<Item = QueryBuilder>) -> Self {
        let mut out = Self::new();
        for qb in builders {
            out.state.merge_from(&qb.state);
            if qb.connection.is_some() {
                out.connection = qb.connection;
            }
            if qb.collection.is_some() {
                out.collection = qb.collection;
            }
            if !qb.strict_inserts {
                out.strict_inserts = false;
            }
        }
        out
    }
}

/// Native UTC timestamp for a date/time operand.
#[must_use]
pub fn utc_timestamp(value: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_millis(value.timestamp_millis()))
}

fn collect_values<I, V>(values: I) -> Bson
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    Bson::Array(values.into_iter().map(Into::into).collect())
}
