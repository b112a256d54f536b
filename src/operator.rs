//! SQL-style comparator tokens and their native counterparts.

use crate::errors::QueryError;
use serde::{Deserialize, Serialize};

/// Comparator tokens accepted by the DSL, paired with the native operator.
pub const OPERATOR_MAP: [(&str, &str); 10] = [
    ("=", "$eq"),
    ("!=", "$ne"),
    ("<>", "$ne"),
    (">", "$gt"),
    (">=", "$gte"),
    ("<", "$lt"),
    ("<=", "$lte"),
    ("in", "$in"),
    ("notIn", "$nin"),
    ("regx", "$regex"),
];

/// Translates a comparator token into the store's operator.
///
/// # Errors
/// Returns `QueryError::InvalidOperator` for any token outside [`OPERATOR_MAP`].
pub fn translate(token: &str) -> Result<&'static str, QueryError> {
    native(token).ok_or_else(|| QueryError::InvalidOperator(token.to_string()))
}

/// The native operator for `token`, if it is a comparator token.
#[must_use]
pub fn native(token: &str) -> Option<&'static str> {
    OPERATOR_MAP.iter().find(|(sql, _)| *sql == token).map(|(_, native)| *native)
}

#[must_use]
pub fn is_operator(token: &str) -> bool {
    native(token).is_some()
}

/// Boolean prefix recorded with every filter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoolOp {
    #[default]
    And,
    Or,
}

impl BoolOp {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// `"DESC"` sorts descending, any other label ascending.
impl From<&str> for Order {
    fn from(label: &str) -> Self {
        if label == "DESC" { Self::Desc } else { Self::Asc }
    }
}

impl From<i32> for Order {
    fn from(n: i32) -> Self {
        if n < 0 { Self::Desc } else { Self::Asc }
    }
}
