//! Query-document matching and aggregation-expression evaluation.

use bson::{Bson, Document};
use std::cmp::Ordering;

use super::StoreError;

const MAX_PATH_DEPTH: usize = 32;

pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        cur = match cur {
            Bson::Document(d) => d.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Sets `path`, creating intermediate documents as needed.
///
/// # Errors
/// `StoreError::TypeMismatch` if a non-document sits on the path.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<(), StoreError> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(StoreError::TypeMismatch(format!("'{head}' is not a document"))),
            }
        }
    }
}

pub fn remove_path(doc: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(inner)) => remove_path(inner, rest),
            _ => None,
        },
    }
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
pub fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Total order over values: numbers across widths, then by type rank.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::Symbol(_) | Bson::String(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) | Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 12,
        Bson::MaxKey => 255,
    }
}

pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

/// Range operators only compare values of the same kind.
fn comparable(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || type_rank(a) == type_rank(b)
}

pub fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        other => as_f64(other).is_none_or(|n| n != 0.0),
    }
}

/// Does `doc` satisfy the query document?
///
/// # Errors
/// Unsupported operators or malformed operands.
pub fn matches(doc: &Document, query: &Document, vars: &Document) -> Result<bool, StoreError> {
    for (key, cond) in query {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_queries(key, cond)? {
                    if !matches(doc, sub, vars)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_queries(key, cond)? {
                    if matches(doc, sub, vars)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for sub in sub_queries(key, cond)? {
                    if matches(doc, sub, vars)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            "$expr" => truthy(&eval_expr(doc, cond, vars)?),
            op if op.starts_with('$') => return Err(StoreError::UnsupportedOperator(op.into())),
            field => match cond {
                Bson::Document(ops) if is_operator_doc(ops) => {
                    field_matches(get_path(doc, field), ops, vars)?
                }
                literal => eq_matches(get_path(doc, field), literal),
            },
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_queries<'a>(key: &str, cond: &'a Bson) -> Result<Vec<&'a Document>, StoreError> {
    let Bson::Array(items) = cond else {
        return Err(StoreError::InvalidOperand(format!("{key} expects an array")));
    };
    items
        .iter()
        .map(|b| match b {
            Bson::Document(d) => Ok(d),
            _ => Err(StoreError::InvalidOperand(format!("{key} expects documents"))),
        })
        .collect()
}

pub fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}

fn eq_matches(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => *target == Bson::Null,
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => {
            items.iter().any(|x| values_equal(x, target))
        }
        Some(v) => values_equal(v, target),
    }
}

fn in_matches(value: Option<&Bson>, set: &Bson) -> Result<bool, StoreError> {
    let Bson::Array(candidates) = set else {
        return Err(StoreError::InvalidOperand("$in/$nin expect an array".into()));
    };
    Ok(candidates.iter().any(|c| eq_matches(value, c)))
}

fn range_matches(value: Option<&Bson>, target: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let check = |v: &Bson| comparable(v, target) && accept(compare_bson(v, target));
    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(v) => check(v),
    }
}

fn regex_matches(value: Option<&Bson>, ops: &Document) -> Result<bool, StoreError> {
    let Ok(pattern) = ops.get_str("$regex") else {
        return Err(StoreError::InvalidOperand("$regex expects a string".into()));
    };
    let options = ops.get_str("$options").unwrap_or_default();
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
        .map_err(|e| StoreError::InvalidRegex(e.to_string()))?;
    let check = |v: &Bson| matches!(v, Bson::String(s) if re.is_match(s));
    Ok(match value {
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(v) => check(v),
        None => false,
    })
}

/// Applies a `{ $op: operand, ... }` condition to one field value.
///
/// # Errors
/// Unsupported operators or malformed operands.
pub fn field_matches(
    value: Option<&Bson>,
    ops: &Document,
    vars: &Document,
) -> Result<bool, StoreError> {
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => eq_matches(value, operand),
            "$ne" => !eq_matches(value, operand),
            "$gt" => range_matches(value, operand, Ordering::is_gt),
            "$gte" => range_matches(value, operand, Ordering::is_ge),
            "$lt" => range_matches(value, operand, Ordering::is_lt),
            "$lte" => range_matches(value, operand, Ordering::is_le),
            "$in" => in_matches(value, operand)?,
            "$nin" => !in_matches(value, operand)?,
            "$regex" => regex_matches(value, ops)?,
            "$options" => true,
            "$exists" => value.is_some() == truthy(operand),
            "$size" => match (value, as_f64(operand)) {
                #[allow(clippy::cast_precision_loss)]
                (Some(Bson::Array(items)), Some(n)) => (items.len() as f64 - n).abs() < f64::EPSILON,
                _ => false,
            },
            "$not" => match operand {
                Bson::Document(inner) => !field_matches(value, inner, vars)?,
                _ => return Err(StoreError::InvalidOperand("$not expects a document".into())),
            },
            "$elemMatch" => {
                let Bson::Document(cond) = operand else {
                    return Err(StoreError::InvalidOperand("$elemMatch expects a document".into()));
                };
                match value {
                    Some(Bson::Array(items)) => {
                        let mut any = false;
                        for item in items {
                            let hit = if is_operator_doc(cond) {
                                field_matches(Some(item), cond, vars)?
                            } else if let Bson::Document(d) = item {
                                matches(d, cond, vars)?
                            } else {
                                false
                            };
                            if hit {
                                any = true;
                                break;
                            }
                        }
                        any
                    }
                    _ => false,
                }
            }
            other => return Err(StoreError::UnsupportedOperator(other.into())),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates an aggregation expression against `doc`, with `$$name` bound from `vars`.
///
/// # Errors
/// Unsupported operators or operands of the wrong type.
pub fn eval_expr(doc: &Document, expr: &Bson, vars: &Document) -> Result<Bson, StoreError> {
    match expr {
        Bson::String(s) if s.starts_with("$$") => {
            let path = &s[2..];
            let (name, rest) = path.split_once('.').map_or((path, None), |(n, r)| (n, Some(r)));
            let bound = vars.get(name).cloned().unwrap_or(Bson::Null);
            Ok(match (rest, bound) {
                (Some(rest), Bson::Document(d)) => get_path(&d, rest).cloned().unwrap_or(Bson::Null),
                (Some(_), _) => Bson::Null,
                (None, v) => v,
            })
        }
        Bson::String(s) if s.starts_with('$') => {
            Ok(get_path(doc, &s[1..]).cloned().unwrap_or(Bson::Null))
        }
        Bson::Array(items) => {
            Ok(Bson::Array(items.iter().map(|e| eval_expr(doc, e, vars)).collect::<Result<_, _>>()?))
        }
        Bson::Document(d) if d.len() == 1 && d.keys().all(|k| k.starts_with('$')) => {
            let (op, arg) = d.iter()
                .next()
                .ok_or_else(|| StoreError::InvalidOperand("empty expression".into()))?;
            eval_operator(doc, op, arg, vars)
        }
        Bson::Document(d) => {
            let mut out = Document::new();
            for (k, v) in d {
                out.insert(k.clone(), eval_expr(doc, v, vars)?);
            }
            Ok(Bson::Document(out))
        }
        literal => Ok(literal.clone()),
    }
}

fn args(doc: &Document, arg: &Bson, vars: &Document) -> Result<Vec<Bson>, StoreError> {
    match arg {
        Bson::Array(items) => items.iter().map(|e| eval_expr(doc, e, vars)).collect(),
        single => Ok(vec![eval_expr(doc, single, vars)?]),
    }
}

fn two_args(op: &str, values: Vec<Bson>) -> Result<(Bson, Bson), StoreError> {
    let mut it = values.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(StoreError::InvalidOperand(format!("{op} expects two arguments"))),
    }
}

fn eval_operator(doc: &Document, op: &str, arg: &Bson, vars: &Document) -> Result<Bson, StoreError> {
    let cmp = |accept: fn(Ordering) -> bool| -> Result<Bson, StoreError> {
        let (a, b) = two_args(op, args(doc, arg, vars)?)?;
        Ok(Bson::Boolean(accept(compare_bson(&a, &b))))
    };
    match op {
        "$and" => Ok(Bson::Boolean(args(doc, arg, vars)?.iter().all(truthy))),
        "$or" => Ok(Bson::Boolean(args(doc, arg, vars)?.iter().any(truthy))),
        "$not" => Ok(Bson::Boolean(!args(doc, arg, vars)?.first().is_some_and(truthy))),
        "$eq" => cmp(Ordering::is_eq),
        "$ne" => cmp(Ordering::is_ne),
        "$gt" => cmp(Ordering::is_gt),
        "$gte" => cmp(Ordering::is_ge),
        "$lt" => cmp(Ordering::is_lt),
        "$lte" => cmp(Ordering::is_le),
        "$in" => {
            let (needle, haystack) = two_args(op, args(doc, arg, vars)?)?;
            match haystack {
                Bson::Array(items) => Ok(Bson::Boolean(items.iter().any(|x| values_equal(x, &needle)))),
                _ => Err(StoreError::InvalidOperand("$in expects an array".into())),
            }
        }
        "$size" => match eval_expr(doc, arg, vars)? {
            Bson::Array(items) => Ok(Bson::Int32(i32::try_from(items.len()).unwrap_or(i32::MAX))),
            _ => Err(StoreError::InvalidOperand("$size expects an array".into())),
        },
        "$literal" => Ok(arg.clone()),
        other => Err(StoreError::UnsupportedOperator(other.into())),
    }
}
