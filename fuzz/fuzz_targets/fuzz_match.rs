#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(s) else { return };
    let Ok(query) = bson::Document::try_from(obj) else { return };
    let doc = bson::doc! {"a": 1, "b": {"c": [1, 2, "x"]}, "s": "text"};
    // malformed queries must be errors, never panics
    let _ = sequeldoc::memory::eval::matches(&doc, &query, &bson::Document::new());
});
