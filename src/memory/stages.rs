//! Aggregation stage interpreter.

use bson::{Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::StoreError;
use super::eval::{
    as_f64, compare_bson, eval_expr, get_path, matches, remove_path, set_path, values_equal,
};

pub type Collections = HashMap<String, Vec<Document>>;

/// Runs `pipeline` over `docs`. `collections` backs `$lookup`.
///
/// # Errors
/// Malformed or unsupported stages.
pub fn run_pipeline(
    collections: &Collections,
    mut docs: Vec<Document>,
    pipeline: &[Document],
    vars: &Document,
) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let mut it = stage.iter();
        let (Some((name, body)), None) = (it.next(), it.next()) else {
            return Err(StoreError::InvalidStage(format!("stage must have one key: {stage}")));
        };
        docs = match name.as_str() {
            "$match" => {
                let query = stage_doc(name, body)?;
                let mut kept = Vec::with_capacity(docs.len());
                for d in docs {
                    if matches(&d, query, vars)? {
                        kept.push(d);
                    }
                }
                kept
            }
            "$sort" => {
                let keys = stage_doc(name, body)?;
                docs.sort_by(|a, b| compare_docs(a, b, keys));
                docs
            }
            "$skip" => docs.into_iter().skip(stage_count(name, body)?).collect(),
            "$limit" => docs.into_iter().take(stage_count(name, body)?).collect(),
            "$count" => {
                let Bson::String(field) = body else {
                    return Err(StoreError::InvalidStage("$count expects a field name".into()));
                };
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let n = i32::try_from(docs.len()).map_or(Bson::Int64(i64::MAX), Bson::Int32);
                    let mut out = Document::new();
                    out.insert(field.clone(), n);
                    vec![out]
                }
            }
            "$project" => {
                let projection = stage_doc(name, body)?;
                docs.iter().map(|d| project(d, projection, vars)).collect::<Result<_, _>>()?
            }
            "$addFields" | "$set" => {
                let fields = stage_doc(name, body)?;
                let mut out = Vec::with_capacity(docs.len());
                for mut d in docs {
                    for (k, expr) in fields {
                        let v = eval_expr(&d, expr, vars)?;
                        set_path(&mut d, k, v)?;
                    }
                    out.push(d);
                }
                out
            }
            "$group" => group(&docs, stage_doc(name, body)?, vars)?,
            "$lookup" => lookup(collections, docs, stage_doc(name, body)?)?,
            "$unwind" => unwind(docs, body)?,
            other => return Err(StoreError::UnsupportedStage(other.into())),
        };
    }
    Ok(docs)
}

fn stage_doc<'a>(name: &str, body: &'a Bson) -> Result<&'a Document, StoreError> {
    match body {
        Bson::Document(d) => Ok(d),
        _ => Err(StoreError::InvalidStage(format!("{name} expects a document"))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stage_count(name: &str, body: &Bson) -> Result<usize, StoreError> {
    match as_f64(body) {
        Some(n) if n >= 0.0 => Ok(n as usize),
        _ => Err(StoreError::InvalidStage(format!("{name} expects a non-negative number"))),
    }
}

fn compare_docs(a: &Document, b: &Document, keys: &Document) -> Ordering {
    for (field, dir) in keys {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let desc = as_f64(dir).is_some_and(|d| d < 0.0);
            return if desc { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

fn is_exclusion(v: &Bson) -> bool {
    matches!(v, Bson::Boolean(false)) || as_f64(v) == Some(0.0)
}

fn is_inclusion(v: &Bson) -> bool {
    matches!(v, Bson::Boolean(true)) || as_f64(v).is_some_and(|n| n != 0.0)
}

fn project(doc: &Document, projection: &Document, vars: &Document) -> Result<Document, StoreError> {
    let inclusive = projection.iter().any(|(k, v)| k != "_id" && !is_exclusion(v));
    if !inclusive {
        let mut out = doc.clone();
        for (k, _) in projection.iter().filter(|(_, v)| is_exclusion(v)) {
            remove_path(&mut out, k);
        }
        return Ok(out);
    }
    let mut out = Document::new();
    let hide_id = projection.get("_id").is_some_and(is_exclusion);
    if !hide_id && !projection.contains_key("_id") {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for (k, v) in projection {
        if is_exclusion(v) {
            continue;
        }
        if is_inclusion(v) {
            if let Some(found) = get_path(doc, k) {
                set_path(&mut out, k, found.clone())?;
            }
        } else {
            let value = eval_expr(doc, v, vars)?;
            set_path(&mut out, k, value)?;
        }
    }
    Ok(out)
}

fn group(docs: &[Document], body: &Document, vars: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = body.get("_id").cloned().unwrap_or(Bson::Null);
    let mut groups: Vec<(Bson, Vec<&Document>)> = Vec::new();
    for d in docs {
        let key = eval_expr(d, &key_expr, vars)?;
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(d),
            None => groups.push((key, vec![d])),
        }
    }
    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut row = Document::new();
        row.insert("_id", key);
        for (alias, acc) in body.iter().filter(|(k, _)| k.as_str() != "_id") {
            let Bson::Document(acc) = acc else {
                return Err(StoreError::InvalidStage(format!("accumulator '{alias}' must be a document")));
            };
            let mut it = acc.iter();
            let (Some((op, expr)), None) = (it.next(), it.next()) else {
                return Err(StoreError::InvalidStage(format!("accumulator '{alias}' needs one operator")));
            };
            let values = members
                .iter()
                .map(|m| eval_expr(m, expr, vars))
                .collect::<Result<Vec<_>, _>>()?;
            row.insert(alias.clone(), accumulate(op, values)?);
        }
        out.push(row);
    }
    Ok(out)
}

fn accumulate(op: &str, values: Vec<Bson>) -> Result<Bson, StoreError> {
    Ok(match op {
        "$max" => present(&values).max_by(|a, b| compare_bson(a, b)).cloned().unwrap_or(Bson::Null),
        "$min" => present(&values).min_by(|a, b| compare_bson(a, b)).cloned().unwrap_or(Bson::Null),
        "$sum" => sum(values.iter().filter_map(as_f64), values.iter().all(|v| !matches!(v, Bson::Double(_)))),
        "$avg" => {
            let nums: Vec<f64> = values.iter().filter_map(as_f64).collect();
            if nums.is_empty() {
                Bson::Null
            } else {
                #[allow(clippy::cast_precision_loss)]
                let avg = nums.iter().sum::<f64>() / nums.len() as f64;
                Bson::Double(avg)
            }
        }
        "$first" => values.first().cloned().unwrap_or(Bson::Null),
        "$last" => values.last().cloned().unwrap_or(Bson::Null),
        "$push" => Bson::Array(values),
        other => return Err(StoreError::UnsupportedOperator(other.into())),
    })
}

fn present(values: &[Bson]) -> impl Iterator<Item = &Bson> {
    values.iter().filter(|v| !matches!(v, Bson::Null | Bson::Undefined))
}

#[allow(clippy::cast_possible_truncation)]
fn sum(nums: impl Iterator<Item = f64>, integral: bool) -> Bson {
    let total: f64 = nums.sum();
    if integral && total.fract() == 0.0 && total.abs() < 9.0e15 {
        let n = total as i64;
        i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32)
    } else {
        Bson::Double(total)
    }
}

fn lookup(
    collections: &Collections,
    docs: Vec<Document>,
    body: &Document,
) -> Result<Vec<Document>, StoreError> {
    let from = body.get_str("from").map_err(|_| StoreError::InvalidStage("$lookup needs 'from'".into()))?;
    let alias = body.get_str("as").map_err(|_| StoreError::InvalidStage("$lookup needs 'as'".into()))?;
    let foreign = collections.get(from).cloned().unwrap_or_default();
    let mut out = Vec::with_capacity(docs.len());
    for mut d in docs {
        let joined: Vec<Bson> = if let Ok(pipeline) = body.get_array("pipeline") {
            let mut bindings = Document::new();
            if let Ok(lets) = body.get_document("let") {
                for (name, expr) in lets {
                    bindings.insert(name.clone(), eval_expr(&d, expr, &Document::new())?);
                }
            }
            let stages = pipeline
                .iter()
                .map(|s| match s {
                    Bson::Document(s) => Ok(s.clone()),
                    _ => Err(StoreError::InvalidStage("$lookup pipeline stages must be documents".into())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            run_pipeline(collections, foreign.clone(), &stages, &bindings)?
                .into_iter()
                .map(Bson::Document)
                .collect()
        } else {
            let local = body.get_str("localField").map_err(|_| StoreError::InvalidStage("$lookup needs 'localField' or 'pipeline'".into()))?;
            let foreign_field = body.get_str("foreignField").map_err(|_| StoreError::InvalidStage("$lookup needs 'foreignField'".into()))?;
            let key = get_path(&d, local).cloned().unwrap_or(Bson::Null);
            foreign
                .iter()
                .filter(|f| values_equal(get_path(f, foreign_field).unwrap_or(&Bson::Null), &key))
                .cloned()
                .map(Bson::Document)
                .collect()
        };
        d.insert(alias, joined);
        out.push(d);
    }
    Ok(out)
}

fn unwind(docs: Vec<Document>, body: &Bson) -> Result<Vec<Document>, StoreError> {
    let (path, preserve, index_field) = match body {
        Bson::String(p) => (p.clone(), false, None),
        Bson::Document(d) => (
            d.get_str("path").map_err(|_| StoreError::InvalidStage("$unwind needs 'path'".into()))?.to_string(),
            d.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
            d.get_str("includeArrayIndex").ok().map(str::to_string),
        ),
        _ => return Err(StoreError::InvalidStage("$unwind expects a path".into())),
    };
    let Some(path) = path.strip_prefix('$') else {
        return Err(StoreError::InvalidStage("$unwind path must start with '$'".into()));
    };
    let mut out = Vec::new();
    for d in docs {
        match get_path(&d, path).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for (i, item) in items.into_iter().enumerate() {
                    let mut copy = d.clone();
                    set_path(&mut copy, path, item)?;
                    if let Some(field) = &index_field {
                        copy.insert(field.clone(), i64::try_from(i).unwrap_or(i64::MAX));
                    }
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve {
                    let mut copy = d;
                    if let Some(field) = &index_field {
                        copy.insert(field.clone(), Bson::Null);
                    }
                    out.push(copy);
                }
            }
            Some(_) => {
                let mut copy = d;
                if let Some(field) = &index_field {
                    copy.insert(field.clone(), Bson::Null);
                }
                out.push(copy);
            }
        }
    }
    Ok(out)
}
