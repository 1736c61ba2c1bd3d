use crate::common::document::Document;
use crate::common::object_id::ObjectId;
use std::fmt::{Debug, Display, Formatter};

/// Represents a [Document] value. It can be a simple value like [Value::Int32],
/// [Value::String] or a complex value like [Value::Document] or [Value::Array].
///
/// # Purpose
/// Provides a unified representation for every value the engine can store,
/// filter on, or sort by. The variant set is deliberately closed: the
/// comparator in [crate::common::compare] classifies each variant into
/// exactly one canonical type category, and the query and update engines
/// dispatch on variants rather than runtime type inspection.
///
/// # Variants
/// - MinKey / MaxKey: sort below / above everything else
/// - Null: absence of a value stored explicitly
/// - Int32 / Int64 / Double: the three numeric subtypes, each a distinct
///   comparator category
/// - Symbol / String: text values (Symbol is the legacy text type)
/// - Document: a nested ordered mapping
/// - Array: ordered collection of values
/// - Binary: raw bytes with a subtype tag
/// - ObjectId: 12-byte document identifier
/// - DateTime: milliseconds since the epoch
/// - Timestamp: internal 64-bit timestamp
/// - Regex: an uncompiled pattern plus option flags
///
/// # Usage
/// Create values using the From trait or the `val!` macro:
/// ```text
/// let v1: Value = 42.into();        // Value::Int32
/// let v2 = Value::from("hello");    // Value::String
/// let v3 = val!(3.5);               // Value::Double
/// ```
#[derive(Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// Sorts before every other value.
    MinKey,
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a 32-bit integer value.
    Int32(i32),
    /// Represents a 64-bit integer value.
    Int64(i64),
    /// Represents a 64-bit floating point value.
    Double(f64),
    /// Represents a symbol value (legacy text type).
    Symbol(String),
    /// Represents a string value.
    String(String),
    /// Represents a nested document.
    Document(Document),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents binary data with a subtype tag. It cannot be text-searched.
    Binary { subtype: u8, data: Vec<u8> },
    /// Represents a document identifier.
    ObjectId(ObjectId),
    /// Represents a point in time as milliseconds since the epoch.
    DateTime(i64),
    /// Represents an internal timestamp value.
    Timestamp(u64),
    /// Represents an uncompiled regular expression.
    Regex { pattern: String, options: String },
    /// Sorts after every other value.
    MaxKey,
}

// `==` is structural: variant and raw contents must match exactly. Query
// semantics (cross-subtype numbers, NaN, prefix arrays) go through
// `compare::equal` instead.

impl Value {
    /// Creates a new [Value] from anything implementing [`Into<Value>`].
    pub fn from<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    /// Creates a new [Value] from an [Option], mapping [None] to [Value::Null].
    pub fn from_option<T: Into<Value>>(value: Option<T>) -> Value {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }

    /// Returns the boolean value if the [Value] is [Value::Bool].
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i32 value if the [Value] is [Value::Int32].
    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if the [Value] is [Value::Int64].
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if the [Value] is [Value::Double].
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens any numeric variant to i64, when it is integral.
    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Widens any numeric variant to f64.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value if the [Value] is [Value::String].
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the nested document if the [Value] is [Value::Document].
    #[inline]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the mutable nested document if the [Value] is [Value::Document].
    #[inline]
    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the array if the [Value] is [Value::Array].
    #[inline]
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the mutable array if the [Value] is [Value::Array].
    #[inline]
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the [ObjectId] if the [Value] is [Value::ObjectId].
    #[inline]
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(v) => Some(v),
            _ => None,
        }
    }

    /// Checks if the [Value] is [Value::Null].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Checks if the [Value] is any numeric variant.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_) | Value::Double(_))
    }

    /// Checks if the [Value] is [Value::String].
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Checks if the [Value] is [Value::Document].
    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    /// Checks if the [Value] is [Value::Array].
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Checks if the [Value] is [Value::Regex].
    #[inline]
    pub fn is_regex(&self) -> bool {
        matches!(self, Value::Regex { .. })
    }

    /// Takes the value, replacing it with [Value::Null].
    pub fn take(&mut self) -> Value {
        std::mem::replace(self, Value::Null)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::MinKey => write!(f, "minKey"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "bool({})", v),
            Value::Int32(v) => write!(f, "int32({})", v),
            Value::Int64(v) => write!(f, "int64({})", v),
            Value::Double(v) => write!(f, "double({})", v),
            Value::Symbol(v) => write!(f, "symbol(\"{}\")", v),
            Value::String(v) => write!(f, "string(\"{}\")", v),
            Value::Document(v) => write!(f, "object({:?})", v),
            Value::Array(v) => {
                write!(f, "array([")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                write!(f, "])")
            }
            Value::Binary { subtype, data } => {
                write!(f, "binary(subtype: {}, {} bytes)", subtype, data.len())
            }
            Value::ObjectId(v) => write!(f, "{:?}", v),
            Value::DateTime(v) => write!(f, "dateTime({})", v),
            Value::Timestamp(v) => write!(f, "timestamp({})", v),
            Value::Regex { pattern, options } => write!(f, "regex(/{}/{})", pattern, options),
            Value::MaxKey => write!(f, "maxKey"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::MinKey => write!(f, "{{\"$minKey\": 1}}"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Symbol(v) => write!(f, "\"{}\"", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Document(v) => write!(f, "{}", v),
            Value::Array(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Binary { subtype, data } => {
                write!(f, "{{\"$binary\": {} bytes, \"$type\": {}}}", data.len(), subtype)
            }
            Value::ObjectId(v) => write!(f, "{{\"$oid\": \"{}\"}}", v),
            Value::DateTime(v) => write!(f, "{{\"$date\": {}}}", v),
            Value::Timestamp(v) => write!(f, "{{\"$timestamp\": {}}}", v),
            Value::Regex { pattern, options } => {
                write!(f, "{{\"$regex\": \"{}\", \"$options\": \"{}\"}}", pattern, options)
            }
            Value::MaxKey => write!(f, "{{\"$maxKey\": 1}}"),
        }
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(|v| v.into()).collect())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// A macro to create a [Value] from a given expression.
///
/// # Examples
///
/// ```rust
/// use dolomite::common::Value;
/// use dolomite::val;
///
/// let int_value = val!(42);
/// assert_eq!(int_value, Value::Int32(42));
///
/// let string_value = val!("hello");
/// assert_eq!(string_value, Value::String("hello".to_string()));
/// ```
#[macro_export]
macro_rules! val {
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_from_i32() {
        assert_eq!(Value::from(42i32), Value::Int32(42));
    }

    #[test]
    fn value_from_i64() {
        assert_eq!(Value::from(42i64), Value::Int64(42));
    }

    #[test]
    fn value_from_f64() {
        assert_eq!(Value::from(42.0f64), Value::Double(42.0));
    }

    #[test]
    fn value_from_str() {
        assert_eq!(Value::from("value"), Value::String("value".to_string()));
    }

    #[test]
    fn value_from_vec() {
        assert_eq!(
            Value::from(vec![1, 2]),
            Value::Array(vec![Value::Int32(1), Value::Int32(2)])
        );
    }

    #[test]
    fn value_from_option() {
        assert_eq!(Value::from_option::<i32>(None), Value::Null);
        assert_eq!(Value::from_option(Some(7)), Value::Int32(7));
    }

    #[test]
    fn as_number_widens_all_numerics() {
        assert_eq!(Value::Int32(2).as_number(), Some(2.0));
        assert_eq!(Value::Int64(3).as_number(), Some(3.0));
        assert_eq!(Value::Double(4.5).as_number(), Some(4.5));
        assert_eq!(Value::String("x".into()).as_number(), None);
    }

    #[test]
    fn equality_is_structural() {
        assert_ne!(Value::Int32(1), Value::Int64(1));
        assert_ne!(
            Value::Array(vec![Value::Int32(1)]),
            Value::Array(vec![Value::Int32(1), Value::Int32(2)])
        );
        assert_eq!(Value::Int32(5), Value::Int32(5));
    }

    #[test]
    fn take_leaves_null_behind() {
        let mut value = Value::Int32(9);
        let taken = value.take();
        assert_eq!(taken, Value::Int32(9));
        assert!(value.is_null());
    }

    #[test]
    fn val_macro_converts() {
        assert_eq!(val!(true), Value::Bool(true));
        assert_eq!(val!(1.25), Value::Double(1.25));
    }
}
