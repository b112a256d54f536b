#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Clause {
    or: bool,
    field: String,
    operator: String,
    value: i64,
}

fuzz_target!(|clauses: Vec<Clause>| {
    if clauses.len() > 64 { return; }
    let mut q = sequeldoc::QueryBuilder::new();
    for c in &clauses {
        // unknown tokens must surface as errors, never panics
        let _ = if c.or {
            q.or_where_op(&c.field, &c.operator, c.value).map(|_| ())
        } else {
            q.where_op(&c.field, &c.operator, c.value).map(|_| ())
        };
    }
    let _ = q.pipeline_stages();
});
