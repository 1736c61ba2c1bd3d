//! The update engine: operator application, modification tracking and
//! upsert synthesis.

use crate::common::document::{Document, DOC_ID};
use crate::common::{compare, field, SortSpec, Value};
use crate::errors::{codes, DolomiteError, DolomiteResult, ErrorKind};

/// The closed set of update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Set,
    Unset,
    Inc,
    Mul,
    Rename,
    Min,
    Max,
    CurrentDate,
    SetOnInsert,
    Push,
    Pop,
    Pull,
    PullAll,
    AddToSet,
}

impl UpdateOperator {
    pub fn from_key(key: &str) -> DolomiteResult<UpdateOperator> {
        let operator = match key {
            "$set" => UpdateOperator::Set,
            "$unset" => UpdateOperator::Unset,
            "$inc" => UpdateOperator::Inc,
            "$mul" => UpdateOperator::Mul,
            "$rename" => UpdateOperator::Rename,
            "$min" => UpdateOperator::Min,
            "$max" => UpdateOperator::Max,
            "$currentDate" => UpdateOperator::CurrentDate,
            "$setOnInsert" => UpdateOperator::SetOnInsert,
            "$push" => UpdateOperator::Push,
            "$pop" => UpdateOperator::Pop,
            "$pull" => UpdateOperator::Pull,
            "$pullAll" => UpdateOperator::PullAll,
            "$addToSet" => UpdateOperator::AddToSet,
            _ => {
                log::error!("Unknown update operator: {}", key);
                return Err(DolomiteError::with_code(
                    &format!("unknown update operator: {}", key),
                    ErrorKind::Client,
                    codes::BAD_VALUE,
                ));
            }
        };
        Ok(operator)
    }
}

/// How an update body is to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateBody {
    /// No `$`-prefixed keys: the body replaces the whole document.
    Replacement,
    /// Every key is an operator.
    Operators,
}

/// Classifies an update body; mixing operator and plain keys is an error.
pub fn classify(update: &Document) -> DolomiteResult<UpdateBody> {
    let operators = update.keys().filter(|key| key.starts_with('$')).count();
    if operators == 0 {
        return Ok(UpdateBody::Replacement);
    }
    if operators != update.len() {
        return Err(DolomiteError::new(
            "update cannot mix operators and replacement fields",
            ErrorKind::Client,
        ));
    }
    Ok(UpdateBody::Operators)
}

/// Applies an operator document to `doc`, returning whether anything
/// actually changed.
pub fn apply_operators(doc: &mut Document, spec: &Document) -> DolomiteResult<bool> {
    let mut modified = false;
    for (key, operand) in spec.iter() {
        let operator = UpdateOperator::from_key(key)?;
        let fields = operand.as_document().ok_or_else(|| {
            DolomiteError::new(
                &format!("{} requires a document of fields", key),
                ErrorKind::Client,
            )
        })?;
        for (path, argument) in fields.iter() {
            modified |= apply_one(operator, doc, path, argument)?;
        }
    }
    Ok(modified)
}

fn apply_one(
    operator: UpdateOperator,
    doc: &mut Document,
    path: &str,
    argument: &Value,
) -> DolomiteResult<bool> {
    match operator {
        UpdateOperator::Set => Ok(field::set_values(doc, path, argument.clone())),
        UpdateOperator::Unset => Ok(field::remove_values(doc, path)),
        UpdateOperator::SetOnInsert => Ok(false),
        UpdateOperator::Inc => apply_arithmetic(doc, path, argument, Arithmetic::Add),
        UpdateOperator::Mul => apply_arithmetic(doc, path, argument, Arithmetic::Multiply),
        UpdateOperator::Rename => apply_rename(doc, path, argument),
        UpdateOperator::Min => {
            let argument = argument.clone();
            Ok(field::set_values_conditional(
                doc,
                path,
                |current| match current {
                    None => true,
                    Some(current) => compare::compare(&argument, current).is_lt(),
                },
                argument.clone(),
            ))
        }
        UpdateOperator::Max => {
            let argument = argument.clone();
            Ok(field::set_values_conditional(
                doc,
                path,
                |current| match current {
                    None => true,
                    Some(current) => compare::compare(&argument, current).is_gt(),
                },
                argument.clone(),
            ))
        }
        UpdateOperator::CurrentDate => {
            let now = chrono::Utc::now();
            let value = current_date_value(argument, now.timestamp_millis())?;
            Ok(field::set_values(doc, path, value))
        }
        UpdateOperator::Push => apply_push(doc, path, argument),
        UpdateOperator::Pop => apply_pop(doc, path, argument),
        UpdateOperator::Pull => apply_pull(doc, path, argument),
        UpdateOperator::PullAll => apply_pull_all(doc, path, argument),
        UpdateOperator::AddToSet => apply_add_to_set(doc, path, argument),
    }
}

#[derive(Clone, Copy)]
enum Arithmetic {
    Add,
    Multiply,
}

fn apply_arithmetic(
    doc: &mut Document,
    path: &str,
    argument: &Value,
    op: Arithmetic,
) -> DolomiteResult<bool> {
    if !argument.is_number() {
        // A non-numeric argument leaves the document untouched.
        return Ok(false);
    }
    let argument = argument.clone();
    Ok(field::set_values_transform(doc, path, |current| {
        let current = match current {
            // A missing field starts from zero, typed like the argument.
            None => zero_like(&argument),
            Some(value) if value.is_number() => value.clone(),
            // A non-numeric target stays untouched.
            Some(_) => return None,
        };
        Some(field::SetAction::Put(numeric_combine(&current, &argument, op)))
    }))
}

fn zero_like(argument: &Value) -> Value {
    match argument {
        Value::Double(_) => Value::Double(0.0),
        Value::Int64(_) => Value::Int64(0),
        _ => Value::Int32(0),
    }
}

/// Combines two numerics, widening to the larger representation.
fn numeric_combine(a: &Value, b: &Value, op: Arithmetic) -> Value {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => match op {
            Arithmetic::Add => Value::Int32(x.wrapping_add(*y)),
            Arithmetic::Multiply => Value::Int32(x.wrapping_mul(*y)),
        },
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            let x = a.as_number().unwrap_or(0.0);
            let y = b.as_number().unwrap_or(0.0);
            match op {
                Arithmetic::Add => Value::Double(x + y),
                Arithmetic::Multiply => Value::Double(x * y),
            }
        }
        _ => {
            let x = a.as_integer().unwrap_or(0);
            let y = b.as_integer().unwrap_or(0);
            match op {
                Arithmetic::Add => Value::Int64(x.wrapping_add(y)),
                Arithmetic::Multiply => Value::Int64(x.wrapping_mul(y)),
            }
        }
    }
}

fn apply_rename(doc: &mut Document, path: &str, argument: &Value) -> DolomiteResult<bool> {
    let new_name = argument.as_string().ok_or_else(|| {
        DolomiteError::new("$rename target must be a string", ErrorKind::Client)
    })?;
    if new_name == path {
        return Ok(false);
    }
    let resolved = field::get_values(doc, path);
    // Moving is only well-defined for exactly one resolved location.
    if resolved.values.len() != 1 {
        return Ok(false);
    }
    let value = resolved.values.into_iter().next().unwrap_or(Value::Null);
    field::remove_values(doc, path);
    Ok(field::set_values(doc, new_name, value))
}

fn current_date_value(argument: &Value, now_millis: i64) -> DolomiteResult<Value> {
    match argument {
        Value::Bool(true) => Ok(Value::DateTime(now_millis)),
        Value::String(kind) if kind == "date" => Ok(Value::DateTime(now_millis)),
        Value::String(kind) if kind == "timestamp" => Ok(Value::Timestamp(now_millis as u64)),
        Value::Document(spec) => match spec.get("$type").and_then(Value::as_string) {
            Some("date") => Ok(Value::DateTime(now_millis)),
            Some("timestamp") => Ok(Value::Timestamp(now_millis as u64)),
            _ => Err(DolomiteError::new(
                "invalid $currentDate type specification",
                ErrorKind::Client,
            )),
        },
        _ => Err(DolomiteError::new(
            "invalid $currentDate format",
            ErrorKind::Client,
        )),
    }
}

/// The `$push` modifiers carried in an `$each` document.
struct PushSpec {
    values: Vec<Value>,
    position: Option<i64>,
    sort: Option<Value>,
    slice: Option<i64>,
}

impl PushSpec {
    fn parse(argument: &Value) -> DolomiteResult<PushSpec> {
        let spec = match argument.as_document() {
            Some(spec) if spec.contains_key("$each") => spec,
            _ => {
                return Ok(PushSpec {
                    values: vec![argument.clone()],
                    position: None,
                    sort: None,
                    slice: None,
                })
            }
        };
        let values = spec
            .get("$each")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                DolomiteError::new("$each requires an array", ErrorKind::Client)
            })?;
        let position = match spec.get("$position") {
            None => None,
            Some(value) => Some(value.as_integer().ok_or_else(|| {
                DolomiteError::new("$position requires an integer", ErrorKind::Client)
            })?),
        };
        let slice = match spec.get("$slice") {
            None => None,
            Some(value) => Some(value.as_integer().ok_or_else(|| {
                DolomiteError::new("$slice requires an integer", ErrorKind::Client)
            })?),
        };
        let sort = spec.get("$sort").cloned();
        Ok(PushSpec {
            values,
            position,
            sort,
            slice,
        })
    }
}

fn apply_push(doc: &mut Document, path: &str, argument: &Value) -> DolomiteResult<bool> {
    let spec = PushSpec::parse(argument)?;
    let mut failure: Option<DolomiteError> = None;
    let modified = field::set_values_transform(doc, path, |current| {
        let mut items = match current {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            // Pushing onto a non-array slot is left untouched.
            Some(_) => return None,
        };
        let insert_at = match spec.position {
            None => items.len(),
            Some(position) if position < 0 => {
                items.len().saturating_sub((-position) as usize)
            }
            Some(position) => (position as usize).min(items.len()),
        };
        items.splice(insert_at..insert_at, spec.values.iter().cloned());
        if let Some(sort) = &spec.sort {
            if let Err(err) = sort_pushed(&mut items, sort) {
                failure.get_or_insert(err);
                return None;
            }
        }
        if let Some(slice) = spec.slice {
            items = slice_kept(items, slice);
        }
        Some(field::SetAction::Put(Value::Array(items)))
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(modified),
    }
}

/// `$slice` retention: zero empties, positive keeps the head, negative the
/// tail.
fn slice_kept(items: Vec<Value>, slice: i64) -> Vec<Value> {
    if slice == 0 {
        return Vec::new();
    }
    let len = items.len();
    if slice > 0 {
        let keep = (slice as usize).min(len);
        items.into_iter().take(keep).collect()
    } else {
        let keep = ((-slice) as usize).min(len);
        items.into_iter().skip(len - keep).collect()
    }
}

fn sort_pushed(items: &mut [Value], sort: &Value) -> DolomiteResult<()> {
    // ±1 orders whole values.
    if let Some(direction) = sort.as_integer() {
        items.sort_by(compare::compare);
        if direction < 0 {
            items.reverse();
        }
        return Ok(());
    }
    match sort {
        Value::Document(spec) => {
            let spec = SortSpec::from_document(spec)?;
            items.sort_by(|a, b| match (a.as_document(), b.as_document()) {
                (Some(da), Some(db)) => compare::compare_by(da, db, &spec),
                _ => std::cmp::Ordering::Equal,
            });
            Ok(())
        }
        _ => Err(DolomiteError::new(
            "$sort requires 1, -1 or a sort document",
            ErrorKind::Client,
        )),
    }
}

fn apply_pop(doc: &mut Document, path: &str, argument: &Value) -> DolomiteResult<bool> {
    let direction = argument.as_integer().unwrap_or(0);
    if direction != 1 && direction != -1 {
        return Err(DolomiteError::new(
            "$pop requires 1 or -1",
            ErrorKind::Client,
        ));
    }
    Ok(field::set_values_transform(doc, path, |current| {
        let items = match current {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return None,
        };
        let mut items = items.clone();
        if direction == -1 {
            items.remove(0);
        } else {
            items.pop();
        }
        Some(field::SetAction::Put(Value::Array(items)))
    }))
}

fn apply_pull(doc: &mut Document, path: &str, argument: &Value) -> DolomiteResult<bool> {
    let mut failure: Option<DolomiteError> = None;
    let modified = field::set_values_transform(doc, path, |current| {
        let items = match current {
            Some(Value::Array(items)) => items,
            _ => return None,
        };
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            match pull_condition_matches(item, argument) {
                Ok(true) => {}
                Ok(false) => kept.push(item.clone()),
                Err(err) => {
                    failure.get_or_insert(err);
                    return None;
                }
            }
        }
        Some(field::SetAction::Put(Value::Array(kept)))
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(modified),
    }
}

/// Evaluates the `$pull` condition against one element by funneling both
/// through the matcher under a synthetic field, which buys the standard
/// literal/operator/regex normalization.
fn pull_condition_matches(item: &Value, condition: &Value) -> DolomiteResult<bool> {
    let mut candidate = Document::new();
    candidate.put("item", item.clone());
    let mut filter = Document::new();
    filter.put("item", condition.clone());
    crate::filter::is_match(&candidate, &filter)
}

fn apply_pull_all(doc: &mut Document, path: &str, argument: &Value) -> DolomiteResult<bool> {
    let members = argument.as_array().ok_or_else(|| {
        DolomiteError::new("$pullAll requires an array of values", ErrorKind::Client)
    })?;
    let members = members.clone();
    Ok(field::set_values_transform(doc, path, |current| {
        let items = match current {
            Some(Value::Array(items)) => items,
            _ => return None,
        };
        let kept: Vec<Value> = items
            .iter()
            .filter(|item| !members.iter().any(|member| compare::equal(item, member)))
            .cloned()
            .collect();
        Some(field::SetAction::Put(Value::Array(kept)))
    }))
}

fn apply_add_to_set(doc: &mut Document, path: &str, argument: &Value) -> DolomiteResult<bool> {
    let additions: Vec<Value> = match argument.as_document() {
        Some(spec) if spec.contains_key("$each") => spec
            .get("$each")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                DolomiteError::new("$each requires an array", ErrorKind::Client)
            })?,
        _ => vec![argument.clone()],
    };
    Ok(field::set_values_transform(doc, path, |current| {
        let mut items = match current {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return None,
        };
        for addition in &additions {
            if !items.iter().any(|item| compare::equal(item, addition)) {
                items.push(addition.clone());
            }
        }
        Some(field::SetAction::Put(Value::Array(items)))
    }))
}

/// Applies a replacement body over an existing document, preserving its
/// `_id`. Returns the new document and whether it differs from the old.
pub fn apply_replacement(old: &Document, body: &Document) -> (Document, bool) {
    let mut replacement = Document::new();
    if let Some(id) = old.id() {
        replacement.put(DOC_ID, id.clone());
    }
    for (key, value) in body.iter() {
        if key != DOC_ID {
            replacement.put(key.clone(), value.clone());
        }
    }
    let modified = replacement != *old;
    (replacement, modified)
}

/// Synthesizes the document an upsert inserts when nothing matched.
///
/// The operator case merges `$setOnInsert` over `$set`; the replacement case
/// overlays the body on the filter's equality fields. Either way a target
/// that would need dot-notation keys is rejected.
pub fn synthesize_upsert(filter: &Document, update: &Document) -> DolomiteResult<Document> {
    let mut target = Document::new();
    match classify(update)? {
        UpdateBody::Operators => {
            for source_key in ["$set", "$setOnInsert"] {
                if let Some(fields) = update.get(source_key).and_then(Value::as_document) {
                    for (key, value) in fields.iter() {
                        reject_dotted(key)?;
                        target.put(key.clone(), value.clone());
                    }
                }
            }
        }
        UpdateBody::Replacement => {
            for (key, value) in filter.iter() {
                if key.starts_with('$') {
                    continue;
                }
                // Only equality fields seed the target.
                if let Some(spec) = value.as_document() {
                    if spec.keys().any(|k| k.starts_with('$')) {
                        continue;
                    }
                }
                reject_dotted(key)?;
                target.put(key.clone(), value.clone());
            }
            for (key, value) in update.iter() {
                reject_dotted(key)?;
                target.put(key.clone(), value.clone());
            }
        }
    }
    target.ensure_id();
    Ok(target)
}

fn reject_dotted(key: &str) -> DolomiteResult<()> {
    if key.contains('.') {
        return Err(DolomiteError::new(
            &format!("cannot synthesize upsert document with dotted key '{}'", key),
            ErrorKind::Constraint,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn classify_distinguishes_bodies() {
        assert_eq!(classify(&doc! { "a": 1 }).unwrap(), UpdateBody::Replacement);
        assert_eq!(
            classify(&doc! { "$set": { "a": 1 } }).unwrap(),
            UpdateBody::Operators
        );
        assert!(classify(&doc! { "$set": { "a": 1 }, "b": 2 }).is_err());
    }

    #[test]
    fn set_and_unset() {
        let mut doc = doc! { "a": 1, "b": 2 };
        assert!(apply_operators(&mut doc, &doc! { "$set": { "a": 9, "c": 3 } }).unwrap());
        assert_eq!(doc, doc! { "a": 9, "b": 2, "c": 3 });
        assert!(apply_operators(&mut doc, &doc! { "$unset": { "b": 1 } }).unwrap());
        assert!(!doc.contains_key("b"));
    }

    #[test]
    fn set_with_equal_value_reports_unmodified() {
        let mut doc = doc! { "a": 1 };
        assert!(!apply_operators(&mut doc, &doc! { "$set": { "a": 1 } }).unwrap());
    }

    #[test]
    fn inc_starts_missing_fields_at_zero() {
        let mut doc = doc! { "n": 5 };
        assert!(apply_operators(&mut doc, &doc! { "$inc": { "n": 2, "m": 3 } }).unwrap());
        assert_eq!(doc.get("n"), Some(&Value::Int32(7)));
        assert_eq!(doc.get("m"), Some(&Value::Int32(3)));
    }

    #[test]
    fn inc_leaves_non_numeric_targets_untouched() {
        let mut doc = doc! { "s": "text" };
        assert!(!apply_operators(&mut doc, &doc! { "$inc": { "s": 1 } }).unwrap());
        assert_eq!(doc.get("s"), Some(&Value::String("text".into())));
    }

    #[test]
    fn mul_on_missing_field_yields_zero() {
        let mut doc = doc! {};
        assert!(apply_operators(&mut doc, &doc! { "$mul": { "n": 4 } }).unwrap());
        assert_eq!(doc.get("n"), Some(&Value::Int32(0)));
    }

    #[test]
    fn arithmetic_widens_numeric_subtypes() {
        let mut doc = doc! { "n": 1 };
        apply_operators(&mut doc, &doc! { "$inc": { "n": 0.5 } }).unwrap();
        assert_eq!(doc.get("n"), Some(&Value::Double(1.5)));
        let mut doc = doc! { "m": 1i64 };
        apply_operators(&mut doc, &doc! { "$inc": { "m": 2 } }).unwrap();
        assert_eq!(doc.get("m"), Some(&Value::Int64(3)));
    }

    #[test]
    fn rename_moves_single_values_only() {
        let mut doc = doc! { "a": 1 };
        assert!(apply_operators(&mut doc, &doc! { "$rename": { "a": "b" } }).unwrap());
        assert_eq!(doc, doc! { "b": 1 });
        // Fan-out into multiple locations is a no-op.
        let mut doc = doc! { "items": [ { "n": 1 }, { "n": 2 } ] };
        assert!(!apply_operators(&mut doc, &doc! { "$rename": { "items.n": "x" } }).unwrap());
    }

    #[test]
    fn min_max_are_comparator_conditional() {
        let mut doc = doc! { "n": 5 };
        assert!(!apply_operators(&mut doc, &doc! { "$min": { "n": 7 } }).unwrap());
        assert!(apply_operators(&mut doc, &doc! { "$min": { "n": 3 } }).unwrap());
        assert_eq!(doc.get("n"), Some(&Value::Int32(3)));
        assert!(apply_operators(&mut doc, &doc! { "$max": { "n": 9 } }).unwrap());
        assert_eq!(doc.get("n"), Some(&Value::Int32(9)));
        // Missing fields are always set.
        let mut doc = doc! {};
        assert!(apply_operators(&mut doc, &doc! { "$min": { "n": 4 } }).unwrap());
        assert_eq!(doc.get("n"), Some(&Value::Int32(4)));
    }

    #[test]
    fn current_date_sets_date_or_timestamp() {
        let mut doc = doc! {};
        let spec = doc! { "$currentDate": {
            "d": true,
            "t": { "$type": "timestamp" }
        } };
        assert!(apply_operators(&mut doc, &spec).unwrap());
        assert!(matches!(doc.get("d"), Some(Value::DateTime(_))));
        assert!(matches!(doc.get("t"), Some(Value::Timestamp(_))));
        let bad = doc! { "$currentDate": { "x": "tomorrow" } };
        assert!(apply_operators(&mut doc! {}, &bad).is_err());
    }

    #[test]
    fn set_on_insert_is_a_no_op_on_updates() {
        let mut doc = doc! { "a": 1 };
        assert!(!apply_operators(&mut doc, &doc! { "$setOnInsert": { "b": 2 } }).unwrap());
        assert!(!doc.contains_key("b"));
    }

    #[test]
    fn push_appends_and_creates_missing_arrays() {
        let mut doc = doc! { "r": [1] };
        assert!(apply_operators(&mut doc, &doc! { "$push": { "r": 2, "s": 9 } }).unwrap());
        assert_eq!(doc.get("r"), doc! { "x": [1, 2] }.get("x"));
        assert_eq!(doc.get("s"), doc! { "x": [9] }.get("x"));
    }

    #[test]
    fn push_each_with_position() {
        let mut doc = doc! { "r": [1, 4] };
        let spec = doc! { "$push": { "r": { "$each": [2, 3], "$position": 1 } } };
        apply_operators(&mut doc, &spec).unwrap();
        assert_eq!(doc.get("r"), doc! { "x": [1, 2, 3, 4] }.get("x"));
    }

    #[test]
    fn push_slice_sign_semantics() {
        let spec = |slice: i32| doc! { "$push": { "r": { "$each": [4, 5], "$slice": slice } } };
        let mut doc = doc! { "r": [1, 2, 3] };
        apply_operators(&mut doc, &spec(3)).unwrap();
        assert_eq!(doc.get("r"), doc! { "x": [1, 2, 3] }.get("x"));
        let mut doc = doc! { "r": [1, 2, 3] };
        apply_operators(&mut doc, &spec(-3)).unwrap();
        assert_eq!(doc.get("r"), doc! { "x": [3, 4, 5] }.get("x"));
        let mut doc = doc! { "r": [1, 2, 3] };
        apply_operators(&mut doc, &spec(0)).unwrap();
        assert_eq!(doc.get("r"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn push_sort_by_value_and_by_key() {
        let mut doc = doc! { "r": [3, 1] };
        let spec = doc! { "$push": { "r": { "$each": [2], "$sort": 1 } } };
        apply_operators(&mut doc, &spec).unwrap();
        assert_eq!(doc.get("r"), doc! { "x": [1, 2, 3] }.get("x"));

        let mut doc = doc! { "r": [ { "n": 3 }, { "n": 1 } ] };
        let spec = doc! { "$push": { "r": { "$each": [{ "n": 2 }], "$sort": { "n": (-1) } } } };
        apply_operators(&mut doc, &spec).unwrap();
        assert_eq!(
            doc.get("r"),
            doc! { "x": [{ "n": 3 }, { "n": 2 }, { "n": 1 }] }.get("x")
        );
    }

    #[test]
    fn pop_removes_first_or_last() {
        let mut doc = doc! { "r": [1, 2, 3] };
        apply_operators(&mut doc, &doc! { "$pop": { "r": (-1) } }).unwrap();
        assert_eq!(doc.get("r"), doc! { "x": [2, 3] }.get("x"));
        apply_operators(&mut doc, &doc! { "$pop": { "r": 1 } }).unwrap();
        assert_eq!(doc.get("r"), doc! { "x": [2] }.get("x"));
        assert!(apply_operators(&mut doc, &doc! { "$pop": { "r": 2 } }).is_err());
    }

    #[test]
    fn push_then_pop_restores_length() {
        let mut doc = doc! { "r": [1, 2] };
        apply_operators(&mut doc, &doc! { "$push": { "r": 9 } }).unwrap();
        apply_operators(&mut doc, &doc! { "$pop": { "r": 1 } }).unwrap();
        assert_eq!(doc.get("r").and_then(Value::as_array).map(Vec::len), Some(2));
    }

    #[test]
    fn pull_by_literal_and_by_predicate() {
        let mut doc = doc! { "r": [1, 2, 3, 2] };
        assert!(apply_operators(&mut doc, &doc! { "$pull": { "r": 2 } }).unwrap());
        assert_eq!(doc.get("r"), doc! { "x": [1, 3] }.get("x"));

        let mut doc = doc! { "r": [1, 5, 9] };
        let spec = doc! { "$pull": { "r": { "$gt": 4 } } };
        assert!(apply_operators(&mut doc, &spec).unwrap());
        assert_eq!(doc.get("r"), doc! { "x": [1] }.get("x"));
    }

    #[test]
    fn pull_all_removes_exact_matches() {
        let mut doc = doc! { "r": [1, 2, 3, 2] };
        assert!(apply_operators(&mut doc, &doc! { "$pullAll": { "r": [2, 3] } }).unwrap());
        assert_eq!(doc.get("r"), doc! { "x": [1] }.get("x"));
        assert!(apply_operators(&mut doc, &doc! { "$pullAll": { "r": 1 } }).is_err());
    }

    #[test]
    fn add_to_set_deduplicates_by_equality() {
        let mut doc = doc! { "r": [1, 2] };
        assert!(!apply_operators(&mut doc, &doc! { "$addToSet": { "r": 2 } }).unwrap());
        assert!(apply_operators(&mut doc, &doc! { "$addToSet": { "r": 3 } }).unwrap());
        let spec = doc! { "$addToSet": { "r": { "$each": [3, 4] } } };
        assert!(apply_operators(&mut doc, &spec).unwrap());
        assert_eq!(doc.get("r"), doc! { "x": [1, 2, 3, 4] }.get("x"));
    }

    #[test]
    fn replacement_preserves_id_and_tracks_difference() {
        let old = doc! { "_id": 7, "a": 1 };
        let (new_doc, modified) = apply_replacement(&old, &doc! { "a": 2, "b": 3 });
        assert!(modified);
        assert_eq!(new_doc, doc! { "_id": 7, "a": 2, "b": 3 });
        let (_, modified) = apply_replacement(&old, &doc! { "a": 1 });
        assert!(!modified);
    }

    #[test]
    fn upsert_synthesis_from_operators() {
        let filter = doc! { "k": 1 };
        let update = doc! { "$set": { "a": 1 }, "$setOnInsert": { "b": 2 } };
        let target = synthesize_upsert(&filter, &update).unwrap();
        assert_eq!(target.get("a"), Some(&Value::Int32(1)));
        assert_eq!(target.get("b"), Some(&Value::Int32(2)));
        assert!(target.has_id());
    }

    #[test]
    fn upsert_synthesis_from_replacement_uses_equality_fields() {
        let filter = doc! { "k": 1, "n": { "$gt": 5 } };
        let update = doc! { "a": 2 };
        let target = synthesize_upsert(&filter, &update).unwrap();
        assert_eq!(target.get("k"), Some(&Value::Int32(1)));
        assert!(!target.contains_key("n"));
        assert_eq!(target.get("a"), Some(&Value::Int32(2)));
    }

    #[test]
    fn upsert_synthesis_rejects_dotted_keys() {
        let filter = doc! { "a.b": 1 };
        let update = doc! { "x": 1 };
        let err = synthesize_upsert(&filter, &update).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Constraint);
        let update = doc! { "$set": { "a.b": 1 } };
        assert!(synthesize_upsert(&doc! {}, &update).is_err());
    }
}
