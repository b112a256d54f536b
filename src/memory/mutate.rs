use bson::{Bson, Document};

use super::StoreError;
use super::eval::{field_matches, get_path, is_operator_doc, matches, remove_path, set_path, values_equal};

/// Applies an operator-form update to `doc`. Returns whether anything changed.
///
/// # Errors
/// Unsupported update operators or operands of the wrong shape.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, StoreError> {
    let mut changed = false;
    for (op, operand) in update {
        let Bson::Document(fields) = operand else {
            return Err(StoreError::InvalidOperand(format!("{op} expects a document")));
        };
        for (path, arg) in fields {
            changed |= match op.as_str() {
                "$set" => set(doc, path, arg.clone())?,
                "$unset" => remove_path(doc, path).is_some(),
                "$inc" => increment(doc, path, arg)?,
                "$push" => push(doc, path, arg)?,
                "$pull" => pull(doc, path, arg)?,
                other => return Err(StoreError::UnsupportedOperator(other.into())),
            };
        }
    }
    Ok(changed)
}

fn set(doc: &mut Document, path: &str, value: Bson) -> Result<bool, StoreError> {
    if get_path(doc, path) == Some(&value) {
        return Ok(false);
    }
    set_path(doc, path, value)?;
    Ok(true)
}

fn increment(doc: &mut Document, path: &str, by: &Bson) -> Result<bool, StoreError> {
    let current = get_path(doc, path).cloned().unwrap_or(Bson::Int32(0));
    let next = match (&current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a).saturating_add(*b)),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.saturating_add(i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.saturating_add(*b)),
        (a, b) => match (super::eval::as_f64(a), super::eval::as_f64(b)) {
            (Some(x), Some(y)) => Bson::Double(x + y),
            _ => return Err(StoreError::TypeMismatch(format!("cannot increment '{path}'"))),
        },
    };
    let changed = next != current;
    set_path(doc, path, next)?;
    Ok(changed)
}

fn push(doc: &mut Document, path: &str, arg: &Bson) -> Result<bool, StoreError> {
    let items = match arg {
        Bson::Document(d) if d.contains_key("$each") => match d.get("$each") {
            Some(Bson::Array(items)) => items.clone(),
            _ => return Err(StoreError::InvalidOperand("$each expects an array".into())),
        },
        other => vec![other.clone()],
    };
    let mut array = match get_path(doc, path) {
        Some(Bson::Array(a)) => a.clone(),
        None | Some(Bson::Null) => Vec::new(),
        Some(_) => return Err(StoreError::TypeMismatch(format!("'{path}' is not an array"))),
    };
    if items.is_empty() {
        return Ok(false);
    }
    array.extend(items);
    set_path(doc, path, Bson::Array(array))?;
    Ok(true)
}

fn pull(doc: &mut Document, path: &str, cond: &Bson) -> Result<bool, StoreError> {
    let Some(Bson::Array(array)) = get_path(doc, path) else {
        return Ok(false);
    };
    let empty = Document::new();
    let mut kept = Vec::with_capacity(array.len());
    for item in array {
        let remove = match cond {
            Bson::Document(c) if is_operator_doc(c) => field_matches(Some(item), c, &empty)?,
            Bson::Document(c) => match item {
                Bson::Document(sub) => matches(sub, c, &empty)?,
                _ => false,
            },
            other => values_equal(item, other),
        };
        if !remove {
            kept.push(item.clone());
        }
    }
    if kept.len() == array.len() {
        return Ok(false);
    }
    set_path(doc, path, Bson::Array(kept))?;
    Ok(true)
}
