//! Filter accumulation and normalization.
//!
//! Every where-style call records one [`FilterEntry`]: the boolean prefix of
//! the call plus the filter document it produced. [`Filters::normalized`]
//! collapses the entries into the single document handed to `$match`.

pub mod raw;

pub use raw::RawFilter;

use bson::{Bson, Document};

use crate::functions::ArrayContains;
use crate::operator::{BoolOp, native};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    pub prefix: BoolOp,
    pub filter: Document,
}

/// Pre-built filters that are recorded verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Raw(RawFilter),
    ArrayContains(ArrayContains),
}

impl Predicate {
    #[must_use]
    pub fn as_document(&self) -> Document {
        match self {
            Self::Raw(raw) => raw.as_document(),
            Self::ArrayContains(contains) => contains.as_document(),
        }
    }
}

impl From<RawFilter> for Predicate {
    fn from(raw: RawFilter) -> Self {
        Self::Raw(raw)
    }
}

impl From<ArrayContains> for Predicate {
    fn from(contains: ArrayContains) -> Self {
        Self::ArrayContains(contains)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: Vec<FilterEntry>,
}

impl Filters {
    pub fn push(&mut self, prefix: BoolOp, filter: Document) {
        self.entries.push(FilterEntry { prefix, filter });
    }

    /// Records a `{field: {op: value}}` comparison under the `$and` wrapper.
    pub fn push_comparison(&mut self, prefix: BoolOp, field: &str, operator: &str, value: Bson) {
        self.push(prefix, comparison(field, operator, value));
    }

    pub fn extend(&mut self, other: &Self) {
        self.entries.extend(other.entries.iter().cloned());
    }

    #[must_use]
    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Collapses the entries into one boolean root.
    ///
    /// Uniform prefixes keep their operator. Mixed prefixes fall back to `$or`
    /// over every entry in order; the per-entry prefixes are not preserved.
    #[must_use]
    pub fn normalized(&self) -> Document {
        let Some(first) = self.entries.first() else {
            return Document::new();
        };
        let uniform = self.entries.iter().all(|e| e.prefix == first.prefix);
        let root = if uniform { first.prefix } else { BoolOp::Or };
        let filters: Vec<Bson> =
            self.entries.iter().map(|e| Bson::Document(e.filter.clone())).collect();
        let mut out = Document::new();
        out.insert(root.key(), filters);
        out
    }
}

/// Leaf comparison wrapped as `{ $and: [ {field: {op: value}} ] }`.
#[must_use]
pub fn comparison(field: &str, operator: &str, value: Bson) -> Document {
    let mut cmp = Document::new();
    cmp.insert(operator, value);
    let mut leaf = Document::new();
    leaf.insert(field, cmp);
    let mut out = Document::new();
    out.insert(BoolOp::And.key(), vec![Bson::Document(leaf)]);
    out
}

/// Resolves the two-argument `where(field, value)` form.
///
/// A comparator token in value position compares the field against null;
/// any other value is an equality operand.
#[must_use]
pub fn resolve_value(operator_or_value: Bson) -> (&'static str, Bson) {
    let token = match &operator_or_value {
        Bson::String(s) => native(s),
        _ => None,
    };
    match token {
        Some(operator) => (operator, Bson::Null),
        None => ("$eq", operator_or_value),
    }
}

/// Regex matching `value` anywhere.
#[must_use]
pub fn contains_pattern(value: &str, case_sensitive: bool) -> String {
    format!(".*{}.*", literal(value, case_sensitive))
}

#[must_use]
pub fn starts_with_pattern(value: &str, case_sensitive: bool) -> String {
    format!("^{}.*", literal(value, case_sensitive))
}

#[must_use]
pub fn ends_with_pattern(value: &str, case_sensitive: bool) -> String {
    format!(".*{}$", literal(value, case_sensitive))
}

fn literal(value: &str, case_sensitive: bool) -> String {
    let escaped = regex::escape(value);
    if case_sensitive { escaped } else { format!("(?i){escaped}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn empty_filters_match_everything() {
        assert_eq!(Filters::default().normalized(), Document::new());
    }

    #[test]
    fn two_argument_form_defaults_to_eq() {
        assert_eq!(resolve_value("value".into()), ("$eq", Bson::from("value")));
        assert_eq!(resolve_value(Bson::Int32(4)), ("$eq", Bson::Int32(4)));
        assert_eq!(resolve_value(Bson::Null), ("$eq", Bson::Null));
    }

    #[test]
    fn bare_operator_token_keeps_null_value() {
        assert_eq!(resolve_value("!=".into()), ("$ne", Bson::Null));
        assert_eq!(resolve_value("==".into()), ("$eq", Bson::from("==")));
    }

    #[test]
    fn comparison_shape() {
        assert_eq!(comparison("age", "$gte", 18.into()), doc! {"$and": [{"age": {"$gte": 18}}]});
    }

    #[test]
    fn patterns_escape_literals() {
        assert_eq!(contains_pattern("a.b", true), ".*a\\.b.*");
        assert_eq!(starts_with_pattern("ab", false), "^(?i)ab.*");
        assert_eq!(ends_with_pattern("x+", true), ".*x\\+$");
    }
}
