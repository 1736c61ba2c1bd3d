use crate::common::document::{Document, DOC_ID};
use crate::common::{field, Value};
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};

/// Applies a find projection to a document.
///
/// Plain keys select inclusion (`1`) or exclusion (`0`) by dotted path;
/// the two modes cannot be mixed except for `_id`, which may always be
/// suppressed. Operator keys reshape array fields in place: `$slice` keeps a
/// bounded sub-range (negative offsets count from the end), `$elemMatch`
/// keeps only elements matching a sub-filter, and a trailing `.$` keeps the
/// first element. Projection is idempotent: re-projecting an already
/// projected document with the same spec is a no-op.
pub fn project(doc: &Document, projection: Option<&Document>) -> DolomiteResult<Document> {
    let projection = match projection {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(doc.clone()),
    };

    let mut included: Vec<String> = Vec::new();
    let mut excluded: Vec<String> = Vec::new();
    let mut operations: Vec<Operation> = Vec::new();
    let mut include_id = true;

    for (key, value) in projection.iter() {
        if key == DOC_ID {
            match truthy(value) {
                Some(true) => {}
                Some(false) => include_id = false,
                None => {
                    return Err(DolomiteError::new(
                        "projection value for _id must be 0 or 1",
                        ErrorKind::Client,
                    ))
                }
            }
            continue;
        }
        if let Some(operation) = Operation::parse(key, value)? {
            // Operator fields double as inclusion selectors.
            included.push(operation.field.clone());
            operations.push(operation);
            continue;
        }
        match truthy(value) {
            Some(true) => included.push(key.clone()),
            Some(false) => excluded.push(key.clone()),
            None => {
                log::error!("Unrecognized projection value for '{}': {:?}", key, value);
                return Err(DolomiteError::new(
                    &format!("unsupported projection value for field '{}'", key),
                    ErrorKind::Client,
                ));
            }
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(DolomiteError::new(
            "cannot mix inclusion and exclusion in a projection",
            ErrorKind::Client,
        ));
    }

    let mut result = if !included.is_empty() {
        let paths: Vec<&str> = included.iter().map(String::as_str).collect();
        let mut kept = include_fields(doc, &paths);
        if include_id {
            if let Some(id) = doc.get(DOC_ID) {
                let id = id.clone();
                // _id leads regardless of where the projection listed it.
                let mut with_id = Document::new();
                with_id.put(DOC_ID, id);
                for (key, value) in kept.iter() {
                    if key != DOC_ID {
                        with_id.put(key.clone(), value.clone());
                    }
                }
                with_id
            } else {
                kept
            }
        } else {
            kept.remove(DOC_ID);
            kept
        }
    } else if !excluded.is_empty() {
        let paths: Vec<&str> = excluded.iter().map(String::as_str).collect();
        let mut kept = exclude_fields(doc, &paths);
        if !include_id {
            kept.remove(DOC_ID);
        }
        kept
    } else {
        let mut kept = doc.clone();
        if !include_id {
            kept.remove(DOC_ID);
        }
        kept
    };

    for operation in &operations {
        operation.apply(&mut result)?;
    }
    Ok(result)
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        _ => value.as_number().map(|n| n != 0.0),
    }
}

fn include_fields(doc: &Document, paths: &[&str]) -> Document {
    let mut out = Document::new();
    for (key, value) in doc.iter() {
        let terminal = paths.iter().any(|p| p == key);
        let sub: Vec<&str> = paths
            .iter()
            .filter_map(|p| p.strip_prefix(key.as_str()).and_then(|r| r.strip_prefix('.')))
            .collect();
        if terminal {
            out.put(key.clone(), value.clone());
        } else if !sub.is_empty() {
            match value {
                Value::Document(nested) => {
                    out.put(key.clone(), Value::Document(include_fields(nested, &sub)));
                }
                Value::Array(items) => {
                    let projected: Vec<Value> = items
                        .iter()
                        .filter_map(|item| match item {
                            Value::Document(nested) => {
                                Some(Value::Document(include_fields(nested, &sub)))
                            }
                            _ => None,
                        })
                        .collect();
                    out.put(key.clone(), Value::Array(projected));
                }
                _ => {}
            }
        }
    }
    out
}

fn exclude_fields(doc: &Document, paths: &[&str]) -> Document {
    let mut out = Document::new();
    for (key, value) in doc.iter() {
        if paths.iter().any(|p| p == key) {
            continue;
        }
        let sub: Vec<&str> = paths
            .iter()
            .filter_map(|p| p.strip_prefix(key.as_str()).and_then(|r| r.strip_prefix('.')))
            .collect();
        if sub.is_empty() {
            out.put(key.clone(), value.clone());
            continue;
        }
        match value {
            Value::Document(nested) => {
                out.put(key.clone(), Value::Document(exclude_fields(nested, &sub)));
            }
            Value::Array(items) => {
                let projected: Vec<Value> = items
                    .iter()
                    .map(|item| match item {
                        Value::Document(nested) => {
                            Value::Document(exclude_fields(nested, &sub))
                        }
                        other => other.clone(),
                    })
                    .collect();
                out.put(key.clone(), Value::Array(projected));
            }
            _ => {
                out.put(key.clone(), value.clone());
            }
        }
    }
    out
}

/// A projection operation targeting one array field.
#[derive(Debug, Clone)]
struct Operation {
    field: String,
    kind: OperationKind,
}

#[derive(Debug, Clone)]
enum OperationKind {
    /// Keep a bounded sub-range: (skip, limit). No limit means "count from
    /// an end" semantics on the skip value alone.
    Slice { skip: i64, limit: Option<i64> },
    /// Keep only elements matching the sub-filter.
    ElemMatch(Document),
}

impl Operation {
    fn parse(key: &str, value: &Value) -> DolomiteResult<Option<Operation>> {
        // A trailing `.$` with an inclusion value keeps the first element.
        if let Some(base) = key.strip_suffix(".$") {
            if truthy(value) == Some(true) {
                return Ok(Some(Operation {
                    field: base.to_string(),
                    kind: OperationKind::Slice { skip: 0, limit: Some(1) },
                }));
            }
            return Err(DolomiteError::new(
                "positional projection requires an inclusion value",
                ErrorKind::Client,
            ));
        }
        let spec = match value.as_document() {
            Some(spec) => spec,
            None => return Ok(None),
        };
        if let Some(slice) = spec.get("$slice") {
            let kind = match slice {
                Value::Array(bounds) if bounds.len() == 2 => {
                    let skip = bounds[0].as_integer();
                    let limit = bounds[1].as_integer();
                    match (skip, limit) {
                        (Some(skip), Some(limit)) if limit > 0 => OperationKind::Slice {
                            skip,
                            limit: Some(limit),
                        },
                        _ => {
                            return Err(DolomiteError::new(
                                "$slice bounds must be [skip, positive limit]",
                                ErrorKind::Client,
                            ))
                        }
                    }
                }
                other => match other.as_integer() {
                    Some(skip) => OperationKind::Slice { skip, limit: None },
                    None => {
                        return Err(DolomiteError::new(
                            "$slice requires an integer or a [skip, limit] pair",
                            ErrorKind::Client,
                        ))
                    }
                },
            };
            return Ok(Some(Operation {
                field: key.to_string(),
                kind,
            }));
        }
        if let Some(filter) = spec.get("$elemMatch") {
            let filter = filter.as_document().ok_or_else(|| {
                DolomiteError::new("$elemMatch projection requires a document", ErrorKind::Client)
            })?;
            return Ok(Some(Operation {
                field: key.to_string(),
                kind: OperationKind::ElemMatch(filter.clone()),
            }));
        }
        Ok(None)
    }

    fn apply(&self, doc: &mut Document) -> DolomiteResult<()> {
        let mut failure: Option<DolomiteError> = None;
        field::set_values_transform(doc, &self.field, |current| {
            let items = match current {
                Some(Value::Array(items)) => items,
                _ => return None,
            };
            match &self.kind {
                OperationKind::Slice { skip, limit } => {
                    Some(field::SetAction::Put(Value::Array(slice_array(
                        items, *skip, *limit,
                    ))))
                }
                OperationKind::ElemMatch(filter) => {
                    let mut kept = Vec::new();
                    for item in items {
                        if let Value::Document(element) = item {
                            match crate::filter::is_match(element, filter) {
                                Ok(true) => kept.push(item.clone()),
                                Ok(false) => {}
                                Err(err) => {
                                    failure.get_or_insert(err);
                                    return None;
                                }
                            }
                        }
                    }
                    Some(field::SetAction::Put(Value::Array(kept)))
                }
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn slice_array(items: &[Value], skip: i64, limit: Option<i64>) -> Vec<Value> {
    let len = items.len() as i64;
    let (start, count) = match limit {
        Some(limit) => {
            let start = if skip < 0 { (len + skip).max(0) } else { skip.min(len) };
            (start, limit)
        }
        // A bare count: positive keeps the head, negative the tail.
        None => {
            if skip >= 0 {
                (0, skip)
            } else {
                ((len + skip).max(0), -skip)
            }
        }
    };
    let start = start.max(0) as usize;
    let end = (start + count.max(0) as usize).min(items.len());
    if start >= items.len() {
        return Vec::new();
    }
    items[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn inclusion_keeps_listed_fields_and_id() {
        let doc = doc! { "_id": 1, "a": 1, "b": 2, "c": 3 };
        let out = project(&doc, Some(&doc! { "a": 1, "c": 1 })).unwrap();
        assert_eq!(out, doc! { "_id": 1, "a": 1, "c": 3 });
    }

    #[test]
    fn id_can_be_suppressed() {
        let doc = doc! { "_id": 1, "a": 1, "b": 2 };
        let out = project(&doc, Some(&doc! { "a": 1, "_id": 0 })).unwrap();
        assert_eq!(out, doc! { "a": 1 });
    }

    #[test]
    fn exclusion_drops_listed_fields() {
        let doc = doc! { "_id": 1, "a": 1, "b": 2 };
        let out = project(&doc, Some(&doc! { "b": 0 })).unwrap();
        assert_eq!(out, doc! { "_id": 1, "a": 1 });
    }

    #[test]
    fn mixing_modes_is_rejected() {
        let doc = doc! { "a": 1 };
        assert!(project(&doc, Some(&doc! { "a": 1, "b": 0 })).is_err());
    }

    #[test]
    fn dotted_inclusion_reaches_into_nested_documents() {
        let doc = doc! { "_id": 1, "a": { "b": 2, "c": 3 }, "d": 4 };
        let out = project(&doc, Some(&doc! { "a.b": 1 })).unwrap();
        assert_eq!(out, doc! { "_id": 1, "a": { "b": 2 } });
    }

    #[test]
    fn dotted_inclusion_projects_array_elements() {
        let doc = doc! { "_id": 1, "items": [ { "n": 1, "x": 9 }, { "n": 2 } ] };
        let out = project(&doc, Some(&doc! { "items.n": 1 })).unwrap();
        assert_eq!(out, doc! { "_id": 1, "items": [ { "n": 1 }, { "n": 2 } ] });
    }

    #[test]
    fn slice_keeps_head_tail_or_range() {
        let doc = doc! { "_id": 1, "items": [1, 2, 3, 4, 5] };
        let head = project(&doc, Some(&doc! { "items": { "$slice": 2 } })).unwrap();
        assert_eq!(head.get("items"), doc! { "x": [1, 2] }.get("x"));
        let tail = project(&doc, Some(&doc! { "items": { "$slice": (-2) } })).unwrap();
        assert_eq!(tail.get("items"), doc! { "x": [4, 5] }.get("x"));
        let range = project(&doc, Some(&doc! { "items": { "$slice": [1, 2] } })).unwrap();
        assert_eq!(range.get("items"), doc! { "x": [2, 3] }.get("x"));
        let zero = project(&doc, Some(&doc! { "items": { "$slice": 0 } })).unwrap();
        assert_eq!(zero.get("items"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn elem_match_keeps_matching_elements() {
        let doc = doc! { "_id": 1, "items": [ { "n": 1 }, { "n": 5 }, { "n": 9 } ] };
        let out = project(
            &doc,
            Some(&doc! { "items": { "$elemMatch": { "n": { "$gt": 2 } } } }),
        )
        .unwrap();
        assert_eq!(out.get("items"), doc! { "x": [{ "n": 5 }, { "n": 9 }] }.get("x"));
    }

    #[test]
    fn positional_keeps_first_element() {
        let doc = doc! { "_id": 1, "items": [7, 8, 9] };
        let out = project(&doc, Some(&doc! { "items.$": 1 })).unwrap();
        assert_eq!(out.get("items"), Some(&Value::Array(vec![Value::Int32(7)])));
    }

    #[test]
    fn projection_is_idempotent() {
        let doc = doc! { "_id": 1, "a": { "b": 2 }, "items": [1, 2, 3] };
        let spec = doc! { "a.b": 1, "items": { "$slice": 2 } };
        let once = project(&doc, Some(&spec)).unwrap();
        let twice = project(&once, Some(&spec)).unwrap();
        assert_eq!(once, twice);
    }
}
