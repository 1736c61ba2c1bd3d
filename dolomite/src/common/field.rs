use crate::common::document::Document;
use crate::common::Value;
use smallvec::SmallVec;

/// One segment of a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A property name; on arrays it fans out through every element.
    Name(String),
    /// A non-negative element index; on objects it addresses the decimal key.
    Index(usize),
    /// The positional marker `$`, coerced to index 0 on arrays.
    Positional,
}

impl Segment {
    /// The property name this segment addresses on an object.
    fn key(&self) -> String {
        match self {
            Segment::Name(name) => name.clone(),
            Segment::Index(index) => index.to_string(),
            Segment::Positional => "$".to_string(),
        }
    }

    /// The element index this segment addresses on an array, if any.
    fn index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Positional => Some(0),
            Segment::Name(_) => None,
        }
    }
}

/// Parses a dotted path such as `"items.0.name"` into segments. Parsed per
/// resolution call; paths are never cached across mutations.
pub fn parse_path(path: &str) -> SmallVec<[Segment; 4]> {
    path.split('.')
        .map(|part| {
            if part == "$" {
                Segment::Positional
            } else if let Ok(index) = part.parse::<usize>() {
                Segment::Index(index)
            } else {
                Segment::Name(part.to_string())
            }
        })
        .collect()
}

/// The outcome of resolving a path against a document.
///
/// `values` is the concatenation of everything the path reached, in traversal
/// order. `exists` reports whether at least one addressed slot actually held
/// a value; an empty `values` with `exists == false` is the explicit absent
/// result, distinct from a stored null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedValues {
    pub values: Vec<Value>,
    pub exists: bool,
}

/// Resolves `path` against `doc`, collecting every reachable value.
pub fn get_values(doc: &Document, path: &str) -> ResolvedValues {
    let segments = parse_path(path);
    let mut resolved = ResolvedValues::default();
    collect_in_document(doc, &segments, &mut resolved);
    resolved
}

/// The first value the path reaches, or [None] when nothing resolves.
pub fn first_value(doc: &Document, path: &str) -> Option<Value> {
    get_values(doc, path).values.into_iter().next()
}

/// Whether the path reaches at least one existing value.
pub fn exists(doc: &Document, path: &str) -> bool {
    get_values(doc, path).exists
}

fn collect_in_document(doc: &Document, segments: &[Segment], out: &mut ResolvedValues) {
    let key = segments[0].key();
    if segments.len() == 1 {
        if let Some(value) = doc.get(&key) {
            out.values.push(value.clone());
            out.exists = true;
        }
    } else if let Some(value) = doc.get(&key) {
        collect_in_value(value, &segments[1..], out);
    }
}

fn collect_in_value(value: &Value, segments: &[Segment], out: &mut ResolvedValues) {
    match value {
        Value::Document(doc) => collect_in_document(doc, segments, out),
        Value::Array(items) => match segments[0].index() {
            Some(index) => {
                if let Some(element) = items.get(index) {
                    if segments.len() == 1 {
                        out.values.push(element.clone());
                        out.exists = true;
                    } else {
                        collect_in_value(element, &segments[1..], out);
                    }
                }
            }
            // A name segment fans out: the same segments resolve against
            // every element that is itself a container.
            None => {
                for element in items {
                    if element.is_document() || element.is_array() {
                        collect_in_value(element, segments, out);
                    }
                }
            }
        },
        _ => {}
    }
}

/// What to do with a settable slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SetAction {
    /// Store this value in the slot.
    Put(Value),
    /// Vacate the slot: deletes an object key, nulls an array element
    /// (array length is preserved).
    Remove,
}

/// Writes `value` into every settable slot `path` resolves to. Returns true
/// when any slot actually changed, tracked by structural equality.
pub fn set_values(doc: &mut Document, path: &str, value: Value) -> bool {
    set_values_transform(doc, path, |_| Some(SetAction::Put(value.clone())))
}

/// Vacates every settable slot `path` resolves to.
pub fn remove_values(doc: &mut Document, path: &str) -> bool {
    set_values_transform(doc, path, |_| Some(SetAction::Remove))
}

/// Writes `value` into each settable slot whose current content passes
/// `condition`. The condition sees [None] for an addressable-but-absent slot.
pub fn set_values_conditional<C>(
    doc: &mut Document,
    path: &str,
    condition: C,
    value: Value,
) -> bool
where
    C: Fn(Option<&Value>) -> bool,
{
    set_values_transform(doc, path, |current| {
        if condition(current) {
            Some(SetAction::Put(value.clone()))
        } else {
            None
        }
    })
}

/// The general setter: for every settable slot, `transform` receives the
/// current content and returns the action to take, or [None] to leave the
/// slot untouched.
///
/// Settable slots follow the resolution rules: an object property addressed
/// by a terminal segment is settable whether or not it exists yet; a missing
/// intermediate property is a dead end (no intermediate containers are
/// created); an array element addressed by a terminal index is settable, and
/// a write past the end extends the array with nulls. Whole arrays are never
/// settable.
pub fn set_values_transform<F>(doc: &mut Document, path: &str, mut transform: F) -> bool
where
    F: FnMut(Option<&Value>) -> Option<SetAction>,
{
    let segments = parse_path(path);
    let mut modified = false;
    apply_in_document(doc, &segments, &mut transform, &mut modified);
    modified
}

fn apply_in_document<F>(doc: &mut Document, segments: &[Segment], f: &mut F, modified: &mut bool)
where
    F: FnMut(Option<&Value>) -> Option<SetAction>,
{
    let key = segments[0].key();
    if segments.len() == 1 {
        match f(doc.get(&key)) {
            Some(SetAction::Put(value)) => {
                // Structural inequality, not the canonical comparator: the
                // canonical array order treats a prefix as equal to its
                // extension, which would swallow element-level edits.
                let differs = match doc.get(&key) {
                    Some(current) => current != &value,
                    None => true,
                };
                if differs {
                    doc.put(key, value);
                    *modified = true;
                }
            }
            Some(SetAction::Remove) => {
                if doc.remove(&key).is_some() {
                    *modified = true;
                }
            }
            None => {}
        }
    } else if let Some(value) = doc.get_mut(&key) {
        apply_in_value(value, &segments[1..], f, modified);
    }
}

fn apply_in_value<F>(value: &mut Value, segments: &[Segment], f: &mut F, modified: &mut bool)
where
    F: FnMut(Option<&Value>) -> Option<SetAction>,
{
    match value {
        Value::Document(doc) => apply_in_document(doc, segments, f, modified),
        Value::Array(items) => match segments[0].index() {
            Some(index) => {
                if segments.len() == 1 {
                    apply_to_element(items, index, f, modified);
                } else if let Some(element) = items.get_mut(index) {
                    apply_in_value(element, &segments[1..], f, modified);
                }
            }
            None => {
                for element in items.iter_mut() {
                    if element.is_document() || element.is_array() {
                        apply_in_value(element, segments, f, modified);
                    }
                }
            }
        },
        _ => {}
    }
}

fn apply_to_element<F>(items: &mut Vec<Value>, index: usize, f: &mut F, modified: &mut bool)
where
    F: FnMut(Option<&Value>) -> Option<SetAction>,
{
    match f(items.get(index)) {
        Some(SetAction::Put(value)) => {
            if index < items.len() {
                if items[index] != value {
                    items[index] = value;
                    *modified = true;
                }
            } else {
                items.resize(index, Value::Null);
                items.push(value);
                *modified = true;
            }
        }
        Some(SetAction::Remove) => {
            if let Some(element) = items.get_mut(index) {
                if !element.is_null() {
                    *element = Value::Null;
                    *modified = true;
                }
            }
        }
        None => {}
    }
}
