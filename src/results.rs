//! Reshaping of returned rows.

use bson::{Bson, Document};
use serde::de::DeserializeOwned;

use crate::errors::QueryError;
use crate::utils::json;

/// Rows returned by `find`/`find_all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Document>,
    expect_many: bool,
    index_by: Option<String>,
}

impl ResultSet {
    #[must_use]
    pub fn new(rows: Vec<Document>, expect_many: bool, index_by: Option<String>) -> Self {
        Self { rows, expect_many, index_by }
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.rows
    }

    #[must_use]
    pub fn into_documents(self) -> Vec<Document> {
        self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row, or `None` when nothing matched.
    #[must_use]
    pub fn single(&self) -> Option<&Document> {
        self.rows.first()
    }

    /// # Errors
    /// `QueryError::Serialization` if a row does not fit `T`.
    pub fn into_objects<T: DeserializeOwned>(self) -> Result<Vec<T>, QueryError> {
        self.rows.iter().map(json::from_document).collect()
    }

    /// # Errors
    /// `QueryError::Serialization` if the row does not fit `T`.
    pub fn into_object<T: DeserializeOwned>(self) -> Result<Option<T>, QueryError> {
        self.rows.first().map(json::from_document).transpose()
    }

    /// JSON array for multi-row queries, the single row (or `null`) otherwise.
    ///
    /// # Errors
    /// `QueryError::Json` if encoding fails.
    pub fn to_json(&self) -> Result<String, QueryError> {
        if self.expect_many {
            json::to_json(&self.rows)
        } else {
            json::to_json(&self.single())
        }
    }

    /// Values of `key` across rows, skipping rows that lack it.
    #[must_use]
    pub fn column(&self, key: &str, unique: bool) -> Vec<Bson> {
        let mut out: Vec<Bson> = Vec::new();
        for v in self.rows.iter().filter_map(|r| r.get(key)) {
            if unique && out.contains(v) {
                continue;
            }
            out.push(v.clone());
        }
        out
    }

    /// Rows keyed by the value of the index field; later rows overwrite earlier ones.
    ///
    /// Without an index field the key is the row position.
    ///
    /// # Errors
    /// `QueryError::IndexOnSingleResult` for `find` results.
    pub fn indexed(&self) -> Result<Document, QueryError> {
        if !self.expect_many {
            return Err(QueryError::IndexOnSingleResult);
        }
        let mut out = Document::new();
        for (pos, row) in self.rows.iter().enumerate() {
            let key = match self.index_by.as_deref().and_then(|k| row.get(k)) {
                Some(value) => index_key(value),
                None => {
                    if let Some(k) = &self.index_by {
                        log::warn!("row {pos} has no '{k}'; keyed by position");
                    }
                    pos.to_string()
                }
            };
            out.insert(key, row.clone());
        }
        Ok(out)
    }
}

/// Plain text of an index value: ids as hex, numbers without type wrappers.
fn index_key(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        other => other.to_string(),
    }
}

impl IntoIterator for ResultSet {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;
    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn rows() -> Vec<Document> {
        vec![doc! {"k": "a", "n": 1}, doc! {"k": "b", "n": 1}, doc! {"k": "a", "n": 2}]
    }

    #[test]
    fn column_with_and_without_unique() {
        let rs = ResultSet::new(rows(), true, None);
        assert_eq!(rs.column("n", false), vec![Bson::Int32(1), Bson::Int32(1), Bson::Int32(2)]);
        assert_eq!(rs.column("k", true), vec![Bson::from("a"), Bson::from("b")]);
    }

    #[test]
    fn indexed_last_row_wins() {
        let rs = ResultSet::new(rows(), true, Some("k".into()));
        let idx = rs.indexed().unwrap();
        assert_eq!(idx.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(idx.get_document("a").unwrap().get_i32("n").unwrap(), 2);
    }

    #[test]
    fn indexed_keys_are_plain_text() {
        let oid = bson::oid::ObjectId::new();
        let rows = vec![doc! {"k": oid}, doc! {"k": 7_i64}, doc! {"k": 2.5}, doc! {"k": 3}];
        let idx = ResultSet::new(rows, true, Some("k".into())).indexed().unwrap();
        assert_eq!(idx.keys().collect::<Vec<_>>(), [oid.to_hex().as_str(), "7", "2.5", "3"]);
    }

    #[test]
    fn single_result_shapes() {
        let rs = ResultSet::new(vec![], false, None);
        assert_eq!(rs.to_json().unwrap(), "null");
        assert!(matches!(rs.indexed(), Err(QueryError::IndexOnSingleResult)));
    }
}
