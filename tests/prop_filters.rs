use bson::Bson;
use proptest::prelude::*;
use sequeldoc::operator::{OPERATOR_MAP, is_operator, translate};
use sequeldoc::{MemoryStore, QueryBuilder};
use std::sync::Arc;

proptest! {
    #[test]
    fn prop_translate_total_over_map(token in "[=!<>a-zA-Z~]{1,5}") {
        let known = OPERATOR_MAP.iter().any(|(t, _)| *t == token);
        prop_assert_eq!(translate(&token).is_ok(), known);
        prop_assert_eq!(is_operator(&token), known);
    }

    #[test]
    fn prop_root_follows_prefixes(prefixes in proptest::collection::vec(any::<bool>(), 1..12)) {
        let mut q = QueryBuilder::new();
        for (i, or) in prefixes.iter().enumerate() {
            if *or { q.or_where(&format!("f{i}"), 1); } else { q.where_(&format!("f{i}"), 1); }
        }
        let root = q.normalized_filters();
        let uniform = prefixes.iter().all(|p| *p == prefixes[0]);
        let expected = if uniform && !prefixes[0] { "$and" } else { "$or" };
        prop_assert_eq!(root.keys().collect::<Vec<_>>(), vec![expected]);
        prop_assert_eq!(root.get_array(expected).unwrap().len(), prefixes.len());
    }

    #[test]
    fn prop_memory_sort_non_decreasing(v in proptest::collection::vec(any::<i32>(), 0..40)) {
        let store = Arc::new(MemoryStore::new());
        store.seed("n", v.iter().map(|x| bson::doc! {"x": *x}).collect());
        let mut q = QueryBuilder::new().with_connection(store);
        q.collection("n").unwrap().order("x", "ASC");
        let xs: Vec<i32> = q
            .find_all()
            .unwrap()
            .column("x", false)
            .into_iter()
            .filter_map(|b| if let Bson::Int32(n) = b { Some(n) } else { None })
            .collect();
        prop_assert_eq!(xs.len(), v.len());
        prop_assert!(xs.windows(2).all(|w| w[0] <= w[1]));
    }
}
