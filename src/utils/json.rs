//! Conversions between serde types, JSON and BSON documents.

use bson::Document;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::QueryError;

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
///
/// # Errors
/// `QueryError::Serialization` on a non-object value or an unrepresentable member.
pub fn json_value_to_document(val: serde_json::Value) -> Result<Document, QueryError> {
    let serde_json::Value::Object(obj) = val else {
        return Err(QueryError::Serialization("expected JSON object".into()));
    };
    Document::try_from(obj).map_err(|e| QueryError::Serialization(e.to_string()))
}

/// Serialize any value into a document, going through its JSON form.
///
/// # Errors
/// `QueryError::Serialization` if `value` does not serialize to an object.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document, QueryError> {
    let val = serde_json::to_value(value).map_err(|e| QueryError::Serialization(e.to_string()))?;
    json_value_to_document(val)
}

/// # Errors
/// `QueryError::Serialization` if the document does not fit `T`.
pub fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T, QueryError> {
    let val = serde_json::to_value(doc).map_err(|e| QueryError::Serialization(e.to_string()))?;
    serde_json::from_value(val).map_err(|e| QueryError::Serialization(e.to_string()))
}

/// JSON text for any serializable value.
///
/// # Errors
/// `QueryError::Json` if encoding fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, QueryError> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: i32,
    }

    #[test]
    fn struct_to_document_and_back() {
        let u = User { name: "alice".into(), age: 30 };
        let d = to_document(&u).unwrap();
        assert_eq!(d.get_str("name").unwrap(), "alice");
        let back: User = from_document(&d).unwrap();
        assert_eq!(back, u);
    }

    #[test]
    fn rejects_non_objects() {
        let e = to_document(&[1, 2, 3]).unwrap_err();
        assert!(matches!(e, QueryError::Serialization(_)));
    }
}
