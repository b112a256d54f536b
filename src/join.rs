//! Correlated-subquery joins expressed as `$lookup` + `$unwind`.

use bson::{Bson, Document, doc};

use crate::errors::QueryError;
use crate::operator::translate;

/// Suffix for the auto-generated joined collection alias.
pub const COLLECTION_ALIAS_SUFFIX: &str = "#joined";
/// Suffix for the auto-generated variable bound to the local field.
pub const FIELD_ALIAS_SUFFIX: &str = "SEQUELMONGOFieldAlias";

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub collection: String,
    pub alias: String,
    pub local_field: String,
    pub operator: &'static str,
    pub foreign_field: String,
    pub variable: String,
}

impl Join {
    /// Equality join between `local_field` and the foreign collection's `foreign_field`.
    pub fn new(
        collection: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        let collection = collection.into();
        let foreign_field = foreign_field.into();
        Self {
            alias: format!("{collection}{COLLECTION_ALIAS_SUFFIX}"),
            variable: format!("{foreign_field}{FIELD_ALIAS_SUFFIX}"),
            collection,
            local_field: local_field.into(),
            operator: "$eq",
            foreign_field,
        }
    }

    /// # Errors
    /// `QueryError::InvalidOperator` for an unknown comparator token.
    pub fn with_operator(
        collection: impl Into<String>,
        local_field: impl Into<String>,
        operator: &str,
        foreign_field: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let operator = translate(operator)?;
        Ok(Self { operator, ..Self::new(collection, local_field, foreign_field) })
    }

    /// Names the joined array instead of `<collection>#joined`.
    #[must_use]
    pub fn collection_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Names the bound variable instead of `<foreignField>SEQUELMONGOFieldAlias`.
    #[must_use]
    pub fn field_alias(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    #[must_use]
    pub fn lookup_stage(&self) -> Document {
        let mut cmp = Document::new();
        cmp.insert(
            self.operator,
            vec![
                Bson::String(format!("${}", self.foreign_field)),
                Bson::String(format!("$${}", self.variable)),
            ],
        );
        let mut bindings = Document::new();
        bindings.insert(self.variable.clone(), format!("${}", self.local_field));
        doc! {
            "$lookup": {
                "from": self.collection.clone(),
                "let": bindings,
                "pipeline": [ { "$match": { "$expr": { "$and": [cmp] } } } ],
                "as": self.alias.clone(),
            }
        }
    }

    /// Unwinds the joined array, dropping documents without a match.
    #[must_use]
    pub fn unwind_stage(&self) -> Document {
        doc! { "$unwind": { "path": format!("${}", self.alias) } }
    }
}

/// Explicit `$unwind` with its optional settings.
#[must_use]
pub fn unwind_stage(
    path: &str,
    include_array_index: Option<&str>,
    preserve_null_and_empty_arrays: bool,
) -> Document {
    let mut unwind = doc! {
        "path": format!("${path}"),
        "preserveNullAndEmptyArrays": preserve_null_and_empty_arrays,
    };
    if let Some(index) = include_array_index {
        unwind.insert("includeArrayIndex", index);
    }
    doc! { "$unwind": unwind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_argument_join() {
        let join = Join::new("products", "sku", "item");
        assert_eq!(
            join.lookup_stage(),
            doc! {
                "$lookup": {
                    "from": "products",
                    "let": {"itemSEQUELMONGOFieldAlias": "$sku"},
                    "pipeline": [{"$match": {"$expr": {"$and": [
                        {"$eq": ["$item", "$$itemSEQUELMONGOFieldAlias"]}
                    ]}}}],
                    "as": "products#joined",
                }
            }
        );
        assert_eq!(join.unwind_stage(), doc! {"$unwind": {"path": "$products#joined"}});
    }

    #[test]
    fn explicit_operator_and_aliases() {
        let join = Join::with_operator("stock", "qty", "<=", "available")
            .unwrap()
            .collection_alias("inventory")
            .field_alias("avail");
        let lookup = join.lookup_stage();
        let inner = lookup.get_document("$lookup").unwrap();
        assert_eq!(inner.get_str("as").unwrap(), "inventory");
        assert_eq!(inner.get_document("let").unwrap(), &doc! {"avail": "$qty"});
        assert!(Join::with_operator("stock", "qty", "=<", "available").is_err());
    }

    #[test]
    fn explicit_unwind_options() {
        assert_eq!(
            unwind_stage("items", Some("idx"), true),
            doc! {"$unwind": {"path": "$items", "preserveNullAndEmptyArrays": true, "includeArrayIndex": "idx"}}
        );
    }
}
