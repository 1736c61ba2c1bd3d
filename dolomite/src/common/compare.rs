use crate::common::document::Document;
use crate::common::sort_order::{SortOrder, SortSpec};
use crate::common::Value;
use std::cmp::Ordering;

/// The canonical type categories used for cross-type comparison and `$type`
/// classification.
///
/// Every comparison first classifies both operands against the fixed
/// [SORT_ORDER] ranking; the first category whose membership test holds for
/// both operands decides the outcome. A pair matched by no single category is
/// *incomparable*: it sorts as equal but never satisfies strict equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    MinKey,
    Null,
    /// Plain 32-bit integers.
    Number,
    /// 64-bit integers.
    Long,
    Double,
    Symbol,
    String,
    Object,
    Array,
    BinData,
    ObjectId,
    Boolean,
    Date,
    Timestamp,
    RegularExpression,
    MaxKey,
    /// Classifications with no value representation; never matches.
    Unknown,
}

/// The fixed canonical ranking used by [compare].
pub const SORT_ORDER: [TypeCategory; 16] = [
    TypeCategory::MinKey,
    TypeCategory::Null,
    TypeCategory::Number,
    TypeCategory::Long,
    TypeCategory::Double,
    TypeCategory::Symbol,
    TypeCategory::String,
    TypeCategory::Object,
    TypeCategory::Array,
    TypeCategory::BinData,
    TypeCategory::ObjectId,
    TypeCategory::Boolean,
    TypeCategory::Date,
    TypeCategory::Timestamp,
    TypeCategory::RegularExpression,
    TypeCategory::MaxKey,
];

impl TypeCategory {
    /// Membership test for this category.
    ///
    /// The numeric categories are each closed: an Int64 is never a member of
    /// Number, a Double never a member of Long. The one sanctioned overlap is
    /// Timestamp, whose membership also accepts plain integers so that raw
    /// counters stored as numbers still compare against timestamp values.
    pub fn is(&self, value: &Value) -> bool {
        match self {
            TypeCategory::MinKey => matches!(value, Value::MinKey),
            TypeCategory::Null => matches!(value, Value::Null),
            TypeCategory::Number => matches!(value, Value::Int32(_)),
            TypeCategory::Long => matches!(value, Value::Int64(_)),
            TypeCategory::Double => matches!(value, Value::Double(_)),
            TypeCategory::Symbol => matches!(value, Value::Symbol(_)),
            TypeCategory::String => matches!(value, Value::String(_)),
            TypeCategory::Object => matches!(value, Value::Document(_)),
            TypeCategory::Array => matches!(value, Value::Array(_)),
            TypeCategory::BinData => matches!(value, Value::Binary { .. }),
            TypeCategory::ObjectId => matches!(value, Value::ObjectId(_)),
            TypeCategory::Boolean => matches!(value, Value::Bool(_)),
            TypeCategory::Date => matches!(value, Value::DateTime(_)),
            TypeCategory::Timestamp => matches!(
                value,
                Value::Timestamp(_) | Value::Int32(_) | Value::Int64(_)
            ),
            TypeCategory::RegularExpression => matches!(value, Value::Regex { .. }),
            TypeCategory::MaxKey => matches!(value, Value::MaxKey),
            TypeCategory::Unknown => false,
        }
    }

    /// Orders two members of this category. Callers must have verified
    /// membership for both operands.
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            TypeCategory::MinKey | TypeCategory::Null | TypeCategory::MaxKey => Ordering::Equal,
            TypeCategory::Number => match (a, b) {
                (Value::Int32(x), Value::Int32(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
            TypeCategory::Long => match (a, b) {
                (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
            TypeCategory::Double => match (a, b) {
                (Value::Double(x), Value::Double(y)) => cmp_float(*x, *y),
                _ => Ordering::Equal,
            },
            TypeCategory::Symbol => match (a, b) {
                (Value::Symbol(x), Value::Symbol(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
            TypeCategory::String => match (a, b) {
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
            TypeCategory::Object => match (a, b) {
                (Value::Document(x), Value::Document(y)) => compare_objects(x, y),
                _ => Ordering::Equal,
            },
            TypeCategory::Array => match (a, b) {
                (Value::Array(x), Value::Array(y)) => compare_arrays(x, y),
                _ => Ordering::Equal,
            },
            TypeCategory::BinData => match (a, b) {
                (
                    Value::Binary { subtype: sa, data: da },
                    Value::Binary { subtype: sb, data: db },
                ) => da
                    .len()
                    .cmp(&db.len())
                    .then(sa.cmp(sb))
                    .then_with(|| da.cmp(db)),
                _ => Ordering::Equal,
            },
            TypeCategory::ObjectId => match (a, b) {
                // The timestamp is the leading bytes, so a byte compare
                // orders ids by creation time first.
                (Value::ObjectId(x), Value::ObjectId(y)) => x.bytes().cmp(y.bytes()),
                _ => Ordering::Equal,
            },
            TypeCategory::Boolean => match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
            TypeCategory::Date => match (a, b) {
                (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
            TypeCategory::Timestamp => {
                let x = timestamp_value(a);
                let y = timestamp_value(b);
                x.cmp(&y)
            }
            TypeCategory::RegularExpression => match (a, b) {
                (
                    Value::Regex { pattern: pa, options: oa },
                    Value::Regex { pattern: pb, options: ob },
                ) => pa.cmp(pb).then_with(|| oa.cmp(ob)),
                _ => Ordering::Equal,
            },
            TypeCategory::Unknown => Ordering::Equal,
        }
    }

    /// The classification name used by `$type`.
    pub fn name(&self) -> &'static str {
        match self {
            TypeCategory::MinKey => "minKey",
            TypeCategory::Null => "null",
            TypeCategory::Number => "int",
            TypeCategory::Long => "long",
            TypeCategory::Double => "double",
            TypeCategory::Symbol => "symbol",
            TypeCategory::String => "string",
            TypeCategory::Object => "object",
            TypeCategory::Array => "array",
            TypeCategory::BinData => "binData",
            TypeCategory::ObjectId => "objectId",
            TypeCategory::Boolean => "bool",
            TypeCategory::Date => "date",
            TypeCategory::Timestamp => "timestamp",
            TypeCategory::RegularExpression => "regex",
            TypeCategory::MaxKey => "maxKey",
            TypeCategory::Unknown => "unknown",
        }
    }

    /// Resolves a `$type` operand given by name.
    pub fn from_name(name: &str) -> Option<TypeCategory> {
        match name {
            "double" => Some(TypeCategory::Double),
            "string" => Some(TypeCategory::String),
            "object" => Some(TypeCategory::Object),
            "array" => Some(TypeCategory::Array),
            "binData" => Some(TypeCategory::BinData),
            "undefined" | "null" => Some(TypeCategory::Null),
            "objectId" => Some(TypeCategory::ObjectId),
            "bool" => Some(TypeCategory::Boolean),
            "date" => Some(TypeCategory::Date),
            "regex" => Some(TypeCategory::RegularExpression),
            "symbol" => Some(TypeCategory::Symbol),
            "int" => Some(TypeCategory::Number),
            "timestamp" => Some(TypeCategory::Timestamp),
            "long" => Some(TypeCategory::Long),
            "minKey" => Some(TypeCategory::MinKey),
            "maxKey" => Some(TypeCategory::MaxKey),
            "dbPointer" | "javascript" | "javascriptWithScope" => Some(TypeCategory::Unknown),
            _ => None,
        }
    }

    /// Resolves a `$type` operand given by numeric code.
    pub fn from_code(code: i64) -> Option<TypeCategory> {
        match code {
            1 => Some(TypeCategory::Double),
            2 => Some(TypeCategory::String),
            3 => Some(TypeCategory::Object),
            4 => Some(TypeCategory::Array),
            5 => Some(TypeCategory::BinData),
            6 | 10 => Some(TypeCategory::Null),
            7 => Some(TypeCategory::ObjectId),
            8 => Some(TypeCategory::Boolean),
            9 => Some(TypeCategory::Date),
            11 => Some(TypeCategory::RegularExpression),
            12 | 13 | 15 => Some(TypeCategory::Unknown),
            14 => Some(TypeCategory::Symbol),
            16 => Some(TypeCategory::Number),
            17 => Some(TypeCategory::Timestamp),
            18 => Some(TypeCategory::Long),
            -1 => Some(TypeCategory::MinKey),
            127 => Some(TypeCategory::MaxKey),
            _ => None,
        }
    }
}

/// Total-order float comparison: NaN equals NaN and sorts above everything.
fn cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Widens a Timestamp-category member to a common numeric representation.
fn timestamp_value(value: &Value) -> i128 {
    match value {
        Value::Timestamp(v) => *v as i128,
        Value::Int32(v) => *v as i128,
        Value::Int64(v) => *v as i128,
        _ => 0,
    }
}

fn compare_objects(a: &Document, b: &Document) -> Ordering {
    let keys_a: Vec<&String> = a.keys().collect();
    let keys_b: Vec<&String> = b.keys().collect();
    for (i, key_a) in keys_a.iter().enumerate() {
        match keys_b.get(i) {
            Some(key_b) => {
                let ordering = key_a.cmp(key_b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            None => return Ordering::Greater,
        }
    }
    if keys_b.len() > keys_a.len() {
        return Ordering::Less;
    }
    for key in keys_a {
        let va = a.get(key).unwrap_or(&Value::Null);
        let vb = b.get(key).unwrap_or(&Value::Null);
        let ordering = compare(va, vb);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_arrays(a: &[Value], b: &[Value]) -> Ordering {
    for (i, item_a) in a.iter().enumerate() {
        // A missing right-hand element is an incomparable pair and
        // contributes nothing to the ordering.
        if let Some(item_b) = b.get(i) {
            let ordering = compare(item_a, item_b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
    }
    Ordering::Equal
}

/// Finds the first canonical category that accepts both operands.
fn winning_category(a: &Value, b: &Value) -> Option<TypeCategory> {
    SORT_ORDER
        .iter()
        .copied()
        .find(|category| category.is(a) && category.is(b))
}

/// Orders two values by the canonical type order.
///
/// Incomparable pairs (no single category accepts both operands, such as an
/// Int64 against a Double) return [Ordering::Equal] so they are stable under
/// sorting, but they never satisfy [equal].
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match winning_category(a, b) {
        Some(category) => category.compare(a, b),
        None => Ordering::Equal,
    }
}

/// Strict equality: the winning category must confirm membership for both
/// sides *and* order them as equal.
pub fn equal(a: &Value, b: &Value) -> bool {
    match winning_category(a, b) {
        Some(category) => category.compare(a, b) == Ordering::Equal,
        None => false,
    }
}

/// Orders two documents by a multi-key sort specification, applying each
/// requested field left-to-right and short-circuiting on the first
/// non-equal field. A field that resolves to nothing sorts as Null.
pub fn compare_by(a: &Document, b: &Document, spec: &SortSpec) -> Ordering {
    for entry in spec.entries() {
        let field_a = crate::common::field::first_value(a, &entry.field);
        let field_b = crate::common::field::first_value(b, &entry.field);
        let ordering = compare(
            field_a.as_ref().unwrap_or(&Value::Null),
            field_b.as_ref().unwrap_or(&Value::Null),
        );
        let ordering = match entry.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable multi-key sort of a document buffer.
pub fn sort_by(documents: &mut [Document], spec: &SortSpec) {
    documents.sort_by(|a, b| compare_by(a, b, spec));
}

/// `$type` classification by category name or numeric code.
pub fn is_type(type_spec: &Value, value: &Value) -> Option<bool> {
    let category = match type_spec {
        Value::String(name) => TypeCategory::from_name(name),
        Value::Int32(code) => TypeCategory::from_code(*code as i64),
        Value::Int64(code) => TypeCategory::from_code(*code),
        Value::Double(code) if code.fract() == 0.0 => TypeCategory::from_code(*code as i64),
        _ => None,
    };
    category.map(|c| c.is(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn same_category_orders_numerically() {
        assert_eq!(compare(&Value::Int32(1), &Value::Int32(2)), Ordering::Less);
        assert_eq!(compare(&Value::Int64(5), &Value::Int64(5)), Ordering::Equal);
        assert_eq!(
            compare(&Value::Double(2.5), &Value::Double(1.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn integers_never_meet_doubles() {
        // Doubles are their own closed category; integers share the
        // integer-accepting categories with each other but never with them.
        assert_eq!(compare(&Value::Int64(1), &Value::Double(2.0)), Ordering::Equal);
        assert!(!equal(&Value::Int64(1), &Value::Double(1.0)));
        assert!(!equal(&Value::Int32(1), &Value::Double(1.0)));
    }

    #[test]
    fn integers_meet_timestamps_in_timestamp_category() {
        assert!(equal(&Value::Int32(5), &Value::Timestamp(5)));
        assert_eq!(
            compare(&Value::Int64(3), &Value::Timestamp(9)),
            Ordering::Less
        );
        // And Int32 vs Int64 also meet there, ordered numerically.
        assert_eq!(
            compare(&Value::Int32(3), &Value::Int64(9)),
            Ordering::Less
        );
    }

    #[test]
    fn antisymmetry_within_category() {
        let pairs = [
            (Value::Int32(1), Value::Int32(2)),
            (Value::String("a".into()), Value::String("b".into())),
            (Value::Bool(false), Value::Bool(true)),
            (Value::DateTime(10), Value::DateTime(20)),
        ];
        for (a, b) in pairs {
            assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }
    }

    #[test]
    fn equal_requires_category_membership() {
        // Incomparable pairs sort as equal but are not equal.
        assert_eq!(
            compare(&Value::String("a".into()), &Value::Bool(true)),
            Ordering::Equal
        );
        assert!(!equal(&Value::String("a".into()), &Value::Bool(true)));
        assert!(equal(&Value::Null, &Value::Null));
    }

    #[test]
    fn nan_equals_nan_and_sorts_last_among_doubles() {
        assert!(equal(&Value::Double(f64::NAN), &Value::Double(f64::NAN)));
        assert_eq!(
            compare(&Value::Double(f64::NAN), &Value::Double(f64::MAX)),
            Ordering::Greater
        );
    }

    #[test]
    fn min_and_max_key_bracket_everything() {
        for value in [Value::Null, Value::Int32(0), Value::String("z".into())] {
            // MinKey/MaxKey share no category with other values, so ordering
            // falls to the sort layer; within category they are equal.
            assert!(equal(&Value::MinKey, &Value::MinKey));
            assert!(equal(&Value::MaxKey, &Value::MaxKey));
            assert!(!equal(&Value::MinKey, &value));
        }
    }

    #[test]
    fn arrays_compare_elementwise() {
        let a = Value::Array(vec![Value::Int32(1), Value::Int32(2)]);
        let b = Value::Array(vec![Value::Int32(1), Value::Int32(3)]);
        assert_eq!(compare(&a, &b), Ordering::Less);
        let c = Value::Array(vec![Value::Int32(1), Value::Int32(2)]);
        assert!(equal(&a, &c));
    }

    #[test]
    fn objects_compare_keys_then_values() {
        let a = Value::Document(doc! { "a": 1 });
        let b = Value::Document(doc! { "b": 1 });
        assert_eq!(compare(&a, &b), Ordering::Less);
        let c = Value::Document(doc! { "a": 2 });
        assert_eq!(compare(&a, &c), Ordering::Less);
        let longer = Value::Document(doc! { "a": 1, "b": 1 });
        assert_eq!(compare(&a, &longer), Ordering::Less);
    }

    #[test]
    fn binary_compares_length_then_subtype_then_bytes() {
        let short = Value::Binary { subtype: 0, data: vec![9] };
        let long = Value::Binary { subtype: 0, data: vec![0, 0] };
        assert_eq!(compare(&short, &long), Ordering::Less);
        let sub_a = Value::Binary { subtype: 0, data: vec![1, 2] };
        let sub_b = Value::Binary { subtype: 1, data: vec![1, 2] };
        assert_eq!(compare(&sub_a, &sub_b), Ordering::Less);
        let bytes_a = Value::Binary { subtype: 0, data: vec![1, 2] };
        let bytes_b = Value::Binary { subtype: 0, data: vec![1, 3] };
        assert_eq!(compare(&bytes_a, &bytes_b), Ordering::Less);
    }

    #[test]
    fn sort_by_applies_direction_per_field() {
        let mut docs = vec![
            doc! { "a": 1, "b": 2 },
            doc! { "a": 1, "b": 1 },
            doc! { "a": 0, "b": 9 },
        ];
        let spec = SortSpec::from_document(&doc! { "a": 1, "b": (-1) }).unwrap();
        sort_by(&mut docs, &spec);
        assert_eq!(docs[0], doc! { "a": 0, "b": 9 });
        assert_eq!(docs[1], doc! { "a": 1, "b": 2 });
        assert_eq!(docs[2], doc! { "a": 1, "b": 1 });
    }

    #[test]
    fn sort_reaches_through_dotted_fields() {
        let mut docs = vec![doc! { "n": { "v": 2 } }, doc! { "n": { "v": 1 } }];
        let spec = SortSpec::from_document(&doc! { "n.v": 1 }).unwrap();
        sort_by(&mut docs, &spec);
        assert_eq!(docs[0], doc! { "n": { "v": 1 } });
    }

    #[test]
    fn type_classification_by_name_and_code() {
        assert_eq!(is_type(&Value::String("int".into()), &Value::Int32(1)), Some(true));
        assert_eq!(is_type(&Value::String("long".into()), &Value::Int64(1)), Some(true));
        assert_eq!(is_type(&Value::Int32(2), &Value::String("x".into())), Some(true));
        assert_eq!(is_type(&Value::Int32(4), &Value::Array(vec![])), Some(true));
        assert_eq!(is_type(&Value::Int32(127), &Value::MaxKey), Some(true));
        assert_eq!(is_type(&Value::String("bogus".into()), &Value::Null), None);
        // dbPointer has no representation here, so nothing matches it.
        assert_eq!(
            is_type(&Value::String("dbPointer".into()), &Value::Null),
            Some(false)
        );
    }
}
