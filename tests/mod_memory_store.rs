use bson::{Bson, doc};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sequeldoc::utils::trace;
use sequeldoc::{
    ArrayContains, ArrayLength, ArrayPull, ArrayPush, Field, Increment, Max, MemoryStore,
    QueryBuilder, QueryConfig, QueryError, Settings, Update,
};
use std::sync::Arc;

fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.seed(
        "users",
        vec![
            doc! {"_id": 1, "name": "ann", "age": 30, "tags": ["a", "b"]},
            doc! {"_id": 2, "name": "bob", "age": 40, "tags": ["b"]},
            doc! {"_id": 3, "name": "cy", "age": 25, "tags": []},
        ],
    );
    store.seed(
        "orders",
        vec![
            doc! {"_id": 10, "user_id": 1, "total": 5},
            doc! {"_id": 11, "user_id": 1, "total": 7},
            doc! {"_id": 12, "user_id": 2, "total": 1},
        ],
    );
    store
}

fn users(store: &Arc<MemoryStore>) -> QueryBuilder {
    let mut q = QueryBuilder::new().with_connection(store.clone());
    q.collection("users").unwrap();
    q
}

fn names(q: &mut QueryBuilder) -> Vec<Bson> {
    q.find_all().unwrap().column("name", false)
}

#[test]
fn filter_sort_and_page() {
    let s = store();
    let mut q = users(&s);
    q.where_op("age", ">", 26).unwrap();
    q.order("age", "DESC");
    assert_eq!(names(&mut q), vec![Bson::from("bob"), Bson::from("ann")]);
    q.offset(1).limit(1);
    assert_eq!(names(&mut q), vec![Bson::from("ann")]);
}

#[test]
fn or_where_and_groups() {
    let s = store();
    let mut q = users(&s);
    q.where_("name", "ann").or_where("age", 25);
    assert_eq!(names(&mut q), vec![Bson::from("ann"), Bson::from("cy")]);

    let mut q = users(&s);
    q.where_op("age", ">", 20)
        .unwrap()
        .where_group(|g| {
            g.where_("name", "bob").or_where("name", "cy");
            Ok(())
        })
        .unwrap();
    assert_eq!(names(&mut q), vec![Bson::from("bob"), Bson::from("cy")]);
}

#[test]
fn list_and_text_filters() {
    let s = store();
    let mut q = users(&s);
    q.where_in("age", [25, 40]);
    assert_eq!(q.find_all().unwrap().len(), 2);

    let mut q = users(&s);
    q.where_not_in("age", [25, 40]);
    assert_eq!(names(&mut q), vec![Bson::from("ann")]);

    let mut q = users(&s);
    q.where_contains("name", "N", false);
    assert_eq!(names(&mut q), vec![Bson::from("ann")]);

    let mut q = users(&s);
    q.where_ends_with("name", "b", true).or_where_starts_with("name", "C", false);
    assert_eq!(names(&mut q), vec![Bson::from("bob"), Bson::from("cy")]);
}

#[test]
fn array_contains_filter() {
    let s = store();
    let mut q = users(&s);
    q.where_filter(ArrayContains::new("tags", vec!["a", "z"]));
    assert_eq!(names(&mut q), vec![Bson::from("ann")]);
}

#[test]
fn projection_drops_id() {
    let s = store();
    let mut q = users(&s);
    q.select(["name"]).where_("_id", 2);
    let row = q.find().unwrap();
    assert_eq!(row.single(), Some(&doc! {"name": "bob"}));
}

#[test]
fn aliased_and_computed_fields() {
    let s = store();
    let mut q = users(&s);
    q.select([Field::alias("name", "who"), ArrayLength::new("tags").into()]);
    let rows = q.find_all().unwrap().into_documents();
    assert_eq!(rows[0], doc! {"who": "ann", "tags_length": 2});
    assert_eq!(rows[2], doc! {"who": "cy", "tags_length": 0});
}

#[test]
fn max_over_collection() {
    let s = store();
    let mut q = users(&s);
    q.select([Max::new("age")]);
    let rows = q.find_all().unwrap().into_documents();
    assert_eq!(rows, vec![doc! {"_id": Bson::Null, "age_max": 40}]);
}

#[test]
fn count_reports_zero_on_no_match() {
    let s = store();
    let mut q = users(&s);
    assert_eq!(q.count().unwrap(), 3);
    let mut q = users(&s);
    q.where_op("age", ">", 100).unwrap();
    assert_eq!(q.count().unwrap(), 0);
}

#[test]
fn join_unwinds_matches() {
    let s = store();
    let mut q = users(&s);
    q.join("orders", "_id", "user_id")
        .select([Field::from("name"), Field::alias("orders#joined.total", "total")]);
    let rows = q.find_all().unwrap().into_documents();
    assert_eq!(
        rows,
        vec![
            doc! {"name": "ann", "total": 5},
            doc! {"name": "ann", "total": 7},
            doc! {"name": "bob", "total": 1},
        ]
    );
}

#[test]
fn join_with_comparator() {
    let s = store();
    let mut q = users(&s);
    q.join_op("orders", "_id", ">", "user_id").unwrap();
    q.where_("name", "cy");
    assert_eq!(q.find_all().unwrap().len(), 0);
    let mut q = users(&s);
    q.join_op("orders", "_id", "<", "user_id").unwrap();
    q.where_("name", "bob");
    assert_eq!(q.find_all().unwrap().len(), 2);
}

#[test]
fn dates_compare_natively() {
    let s = store();
    let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    s.seed(
        "events",
        vec![
            doc! {"_id": 1, "at": bson::DateTime::from_millis(cutoff.timestamp_millis() - 1)},
            doc! {"_id": 2, "at": bson::DateTime::from_millis(cutoff.timestamp_millis() + 1)},
        ],
    );
    let mut q = QueryBuilder::new().with_connection(s.clone());
    q.collection("events").unwrap().where_date("at", ">=", cutoff).unwrap();
    let rows = q.find_all().unwrap().column("_id", false);
    assert_eq!(rows, vec![Bson::Int32(2)]);
}

#[test]
fn raw_pipeline_runs_first() {
    let s = store();
    let mut q = users(&s);
    q.pipeline(vec![doc! {"$match": {"age": {"$lt": 35}}}], true).where_("tags", "b");
    assert_eq!(names(&mut q), vec![Bson::from("ann")]);
}

#[test]
fn insert_then_delete_one() {
    let s = Arc::new(MemoryStore::new());
    let mut q = QueryBuilder::new().with_connection(s.clone());
    q.collection("tmp").unwrap();
    let report = q.insert(vec![doc! {"k": 1}, doc! {"k": 2}]).unwrap();
    assert_eq!(report.inserted(), 2);

    q.where_("k", 1);
    assert_eq!(q.delete().unwrap().deleted, 1);
    assert_eq!(s.documents("tmp").len(), 1);
}

#[test]
fn update_with_special_functions() {
    let s = store();
    let mut q = users(&s);
    q.where_("name", "ann");
    let report = q
        .update(
            Update::fields()
                .set("age", 31)
                .increment(Increment::by("visits", 2))
                .push(ArrayPush::new("tags", ["c", "d"]))
                .pull(ArrayPull::new("tags", vec!["a", "d"])),
        )
        .unwrap();
    assert_eq!((report.matched, report.modified), (1, 1));

    let ann = s.documents("users").remove(0);
    assert_eq!(ann.get_i32("age").unwrap(), 31);
    assert_eq!(ann.get_i64("visits").unwrap(), 2);
    assert_eq!(ann.get_array("tags").unwrap(), &vec![Bson::from("b"), Bson::from("c")]);
}

#[test]
fn mutations_without_filters_are_refused() {
    let s = store();
    let q = users(&s);
    assert!(matches!(q.update(Update::fields().set("a", 1)), Err(QueryError::MissingFilter("update"))));
    assert!(matches!(q.delete(), Err(QueryError::MissingFilter("delete"))));
    assert_eq!(s.documents("users").len(), 3);
}

#[test]
fn empty_insert_is_refused() {
    let s = store();
    assert!(matches!(users(&s).insert(vec![]), Err(QueryError::EmptyInsert)));
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Cat {
    name: String,
}

#[derive(Serialize)]
struct Dog {
    name: String,
}

#[test]
fn strict_insert_typing() {
    let s = Arc::new(MemoryStore::new());
    let cfg = QueryConfig::new(Settings::default()).with_connection(s.clone());
    let mut q = cfg.builder();
    q.collection("pets").unwrap();

    let tom = Cat { name: "tom".into() };
    let rex = Dog { name: "rex".into() };
    let err = q.insert_records(&[&tom, &rex]).unwrap_err();
    assert!(matches!(err, QueryError::MixedInsertTypes { .. }));
    assert!(s.documents("pets").is_empty());

    q.strict_inserts(false);
    assert_eq!(q.insert_records(&[&tom, &rex]).unwrap().inserted(), 2);

    let mut q = cfg.builder();
    q.collection("pets").unwrap().where_("name", "tom").select(["name"]);
    let cat: Option<Cat> = q.find().unwrap().into_object().unwrap();
    assert_eq!(cat, Some(Cat { name: "tom".into() }));
}

#[test]
fn indexed_results() {
    let s = store();
    let mut q = users(&s);
    q.select(["name", "age"]).index_by("name").unwrap();
    let idx = q.find_all().unwrap().indexed().unwrap();
    assert_eq!(idx.keys().collect::<Vec<_>>(), ["ann", "bob", "cy"]);
    assert_eq!(idx.get_document("bob").unwrap().get_i32("age").unwrap(), 40);
}

#[test]
fn inserted_records_index_by_hex_id() {
    let s = Arc::new(MemoryStore::new());
    let mut q = QueryBuilder::new().with_connection(s.clone());
    q.collection("pets").unwrap();
    q.insert_records(&[&Cat { name: "tom".into() }]).unwrap();

    let id = s.documents("pets")[0].get_object_id("_id").unwrap();
    q.index_by("_id").unwrap();
    let idx = q.find_all().unwrap().indexed().unwrap();
    assert_eq!(idx.keys().collect::<Vec<_>>(), [id.to_hex().as_str()]);
    assert_eq!(idx.get_document(id.to_hex()).unwrap().get_str("name").unwrap(), "tom");
}

#[test]
fn strict_typing_survives_merge_with_defaults() {
    let s = Arc::new(MemoryStore::new());
    let mut lenient = QueryBuilder::new().with_connection(s.clone());
    lenient.collection("pets").unwrap().strict_inserts(false);
    let merged = QueryBuilder::merge([lenient, QueryBuilder::new()]);
    let tom = Cat { name: "tom".into() };
    let rex = Dog { name: "rex".into() };
    assert_eq!(merged.insert_records(&[&tom, &rex]).unwrap().inserted(), 2);

    let mut strict = QueryBuilder::new().with_connection(s.clone());
    strict.collection("pets").unwrap();
    let merged = QueryBuilder::merge([QueryBuilder::new(), strict]);
    assert!(matches!(merged.insert_records(&[&tom, &rex]), Err(QueryError::MixedInsertTypes { .. })));
}

#[test]
fn collection_errors() {
    let mut q = QueryBuilder::new();
    assert!(matches!(q.collection("users"), Err(QueryError::MissingCollection)));
    assert!(matches!(q.find_all(), Err(QueryError::NoCollection)));
}

#[test]
fn backend_failures_pass_through() {
    let s = store();
    let mut q = users(&s);
    q.pipeline(vec![doc! {"$bucketAuto": {}}], false);
    let err = q.find_all().unwrap_err();
    assert!(matches!(err, QueryError::Backend(_)));
    assert_eq!(err.to_string(), "Unsupported stage: $bucketAuto");
}

#[test]
fn executed_pipelines_are_traced() {
    let cap = trace::capture();
    let s = store();
    let mut q = users(&s);
    q.where_("name", "ann").find_all().unwrap();
    let lines = cap.take();
    assert!(lines.iter().any(|l| l.starts_with("aggregate collection=users")));
    assert!(lines.iter().any(|l| l.contains("\"op\":\"aggregate\"")));
}
