use bson::{Bson, doc};
use chrono::{TimeZone, Utc};
use sequeldoc::operator::{OPERATOR_MAP, translate};
use sequeldoc::{ArrayContains, QueryBuilder, QueryError, RawFilter};

#[test]
fn translator_covers_every_token() {
    for (token, native) in OPERATOR_MAP {
        assert_eq!(translate(token).unwrap(), native);
    }
    assert!(matches!(translate("=="), Err(QueryError::InvalidOperator(t)) if t == "=="));
}

#[test]
fn and_only_filters_keep_and_root() {
    let mut q = QueryBuilder::new();
    q.where_("age", 30).where_op("score", ">=", 10).unwrap();
    assert_eq!(
        q.normalized_filters(),
        doc! {"$and": [
            {"$and": [{"age": {"$eq": 30}}]},
            {"$and": [{"score": {"$gte": 10}}]},
        ]}
    );
}

#[test]
fn or_only_filters_keep_or_root() {
    let mut q = QueryBuilder::new();
    q.or_where("a", 1).or_where("b", 2);
    assert_eq!(
        q.normalized_filters(),
        doc! {"$or": [{"$and": [{"a": {"$eq": 1}}]}, {"$and": [{"b": {"$eq": 2}}]}]}
    );
}

#[test]
fn mixed_prefixes_flatten_into_or() {
    let mut q = QueryBuilder::new();
    q.where_("a", 1).or_where("b", 2).where_("c", 3);
    let root = q.normalized_filters();
    assert_eq!(root.keys().collect::<Vec<_>>(), ["$or"]);
    assert_eq!(root.get_array("$or").unwrap().len(), 3);
}

#[test]
fn no_filters_is_empty_document() {
    assert!(QueryBuilder::new().normalized_filters().is_empty());
}

#[test]
fn two_argument_where_with_operator_token() {
    let mut q = QueryBuilder::new();
    q.where_("deleted", "!=");
    assert_eq!(
        q.normalized_filters(),
        doc! {"$and": [{"$and": [{"deleted": {"$ne": Bson::Null}}]}]}
    );
}

#[test]
fn unknown_operator_is_rejected() {
    let mut q = QueryBuilder::new();
    let err = q.where_op("age", "=>", 3).unwrap_err();
    assert!(matches!(err, QueryError::InvalidOperator(t) if t == "=>"));
    assert!(q.state().filters.is_empty());
}

#[test]
fn explicit_operator_is_checked_even_with_null_value() {
    let mut q = QueryBuilder::new();
    let err = q.where_op("x", "==", Bson::Null).unwrap_err();
    assert!(matches!(err, QueryError::InvalidOperator(t) if t == "=="));
    assert!(matches!(q.or_where_op("x", "like", Bson::Null), Err(QueryError::InvalidOperator(_))));
    assert!(q.state().filters.is_empty());

    q.where_op("x", "!=", Bson::Null).unwrap();
    assert_eq!(q.normalized_filters(), doc! {"$and": [{"$and": [{"x": {"$ne": Bson::Null}}]}]});
}

#[test]
fn in_and_not_in_lists() {
    let mut q = QueryBuilder::new();
    q.where_in("age", [1, 2]).or_where_not_in("name", ["x"]);
    assert_eq!(
        q.normalized_filters(),
        doc! {"$or": [
            {"$and": [{"age": {"$in": [1, 2]}}]},
            {"$and": [{"name": {"$nin": ["x"]}}]},
        ]}
    );
}

#[test]
fn text_helpers_emit_escaped_regex() {
    let mut q = QueryBuilder::new();
    q.where_starts_with("name", "a.b", false);
    assert_eq!(
        q.normalized_filters(),
        doc! {"$and": [{"$and": [{"name": {"$regex": "^(?i)a\\.b.*"}}]}]}
    );
}

#[test]
fn dates_become_native_timestamps() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut q = QueryBuilder::new();
    q.where_date("created", ">", at).unwrap();
    let expected = Bson::DateTime(bson::DateTime::from_millis(at.timestamp_millis()));
    assert_eq!(
        q.normalized_filters(),
        doc! {"$and": [{"$and": [{"created": {"$gt": expected}}]}]}
    );
}

#[test]
fn group_becomes_one_entry() {
    let mut q = QueryBuilder::new();
    q.where_("a", 1)
        .where_group(|g| {
            g.where_("b", 2).or_where("c", 3);
            Ok(())
        })
        .unwrap();
    assert_eq!(
        q.normalized_filters(),
        doc! {"$and": [
            {"$and": [{"a": {"$eq": 1}}]},
            {"$and": [{"$or": [{"$and": [{"b": {"$eq": 2}}]}, {"$and": [{"c": {"$eq": 3}}]}]}]},
        ]}
    );
}

#[test]
fn group_errors_propagate() {
    let mut q = QueryBuilder::new();
    let err = q
        .where_group(|g| {
            g.where_op("a", "~", 1)?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidOperator(_)));
}

#[test]
fn prebuilt_filters_are_recorded_verbatim() {
    let mut raw = RawFilter::new();
    raw.push(doc! {"x": {"$exists": true}});
    let mut q = QueryBuilder::new();
    q.where_filter(raw).or_where_filter(ArrayContains::new("tags", "red"));
    assert_eq!(
        q.normalized_filters(),
        doc! {"$or": [
            {"$and": [{"x": {"$exists": true}}]},
            {"tags": {"$exists": true, "$elemMatch": {"$in": ["red"]}}},
        ]}
    );
}
