use crate::common::object_id::ObjectId;
use crate::common::Value;
use indexmap::IndexMap;
use std::fmt::{Debug, Display, Formatter};

/// The reserved name of the unique collection key field.
pub const DOC_ID: &str = "_id";

/// An ordered mapping of field name to [Value].
///
/// # Purpose
/// `Document` is the unit of storage, filtering and update. Field order is
/// preserved (insertion order), which matters for object comparison and for
/// faithful round-trips through the codec. Documents are value-owned: a
/// stored document and an in-flight copy never alias.
///
/// # Usage
/// ```text
/// let mut doc = Document::new();
/// doc.put("name", "John Doe");
/// doc.put("age", 30i64);
/// let doc = doc! { "name": "John Doe", "age": 30 };
/// ```
#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            fields: IndexMap::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Puts a field into the document, replacing any existing value under
    /// the same name while keeping its position.
    pub fn put<T: Into<Value>>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the value stored directly under `key`, if present.
    ///
    /// This is plain key access; dotted-path resolution lives in
    /// [crate::common::field].
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Removes a field, preserving the order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// The field names in document order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    /// Returns the collection key value, if assigned.
    #[inline]
    pub fn id(&self) -> Option<&Value> {
        self.fields.get(DOC_ID)
    }

    #[inline]
    pub fn has_id(&self) -> bool {
        self.fields.contains_key(DOC_ID)
    }

    /// Returns the collection key, synthesizing a fresh [ObjectId] when the
    /// document has none yet.
    pub fn ensure_id(&mut self) -> Value {
        if let Some(id) = self.fields.get(DOC_ID) {
            return id.clone();
        }
        let id = Value::ObjectId(ObjectId::new());
        // New ids go first so serialized documents lead with their key.
        self.fields.shift_insert(0, DOC_ID.to_string(), id.clone());
        id
    }
}

impl PartialEq for Document {
    /// Order-sensitive structural equality: the key sequences must match,
    /// then the value sequences.
    fn eq(&self, other: &Self) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }
        self.fields
            .iter()
            .zip(other.fields.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl Eq for Document {}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Document {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Strips the surrounding quotes `stringify!` leaves on string-literal keys.
pub fn normalize(key: &str) -> String {
    key.trim_matches('"').to_string()
}

/// A macro to create a [Document] from key-value pairs.
///
/// # Examples
///
/// ```rust
/// use dolomite::doc;
///
/// let doc = doc! { "name": "Jane", "age": 40, "tags": ["a", "b"] };
/// assert_eq!(doc.len(), 3);
///
/// let empty = doc! {};
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_mut)]
            let mut doc = $crate::common::Document::new();
            $(
                doc.put($crate::common::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro for [doc!]; converts nested braces and brackets into
/// [crate::common::Value::Document] and [crate::common::Value::Array].
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
