use crate::common::document::Document;
use crate::common::field::ResolvedValues;
use crate::common::{compare, field, Value};
use crate::errors::{codes, DolomiteError, DolomiteResult, ErrorKind};
use crate::filter::geo;

/// The closed set of field-level filter operators.
///
/// Dispatch is by explicit enumeration; an unknown `$`-prefixed key is a
/// client error rather than a silent non-match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
    Type,
    Mod,
    Regex,
    Options,
    ElemMatch,
    All,
    Size,
    BitsAllSet,
    BitsAnySet,
    BitsAllClear,
    BitsAnyClear,
    GeoWithin,
    GeoIntersects,
    Near,
    NearSphere,
    MaxDistance,
    MinDistance,
    Comment,
}

impl FilterOperator {
    pub fn from_key(key: &str) -> DolomiteResult<FilterOperator> {
        let operator = match key {
            "$eq" => FilterOperator::Eq,
            "$ne" => FilterOperator::Ne,
            "$gt" => FilterOperator::Gt,
            "$gte" => FilterOperator::Gte,
            "$lt" => FilterOperator::Lt,
            "$lte" => FilterOperator::Lte,
            "$in" => FilterOperator::In,
            "$nin" => FilterOperator::Nin,
            "$exists" => FilterOperator::Exists,
            "$type" => FilterOperator::Type,
            "$mod" => FilterOperator::Mod,
            "$regex" => FilterOperator::Regex,
            "$options" => FilterOperator::Options,
            "$elemMatch" => FilterOperator::ElemMatch,
            "$all" => FilterOperator::All,
            "$size" => FilterOperator::Size,
            "$bitsAllSet" => FilterOperator::BitsAllSet,
            "$bitsAnySet" => FilterOperator::BitsAnySet,
            "$bitsAllClear" => FilterOperator::BitsAllClear,
            "$bitsAnyClear" => FilterOperator::BitsAnyClear,
            "$geoWithin" => FilterOperator::GeoWithin,
            "$geoIntersects" => FilterOperator::GeoIntersects,
            "$near" => FilterOperator::Near,
            "$nearSphere" => FilterOperator::NearSphere,
            "$maxDistance" => FilterOperator::MaxDistance,
            "$minDistance" => FilterOperator::MinDistance,
            "$comment" => FilterOperator::Comment,
            _ => {
                log::error!("Unknown filter operator: {}", key);
                return Err(DolomiteError::with_code(
                    &format!("unknown operator: {}", key),
                    ErrorKind::Client,
                    codes::BAD_VALUE,
                ));
            }
        };
        Ok(operator)
    }
}

/// Normalizes a field's filter value into an operator document: a regex
/// literal becomes `{$regex, $options}`, a plain literal becomes `{$eq}`,
/// and an object made solely of `$`-keys passes through unchanged.
pub fn normalize_filter(filter_value: &Value) -> Document {
    if let Value::Regex { pattern, options } = filter_value {
        let mut normalized = Document::new();
        normalized.put("$regex", Value::String(pattern.clone()));
        normalized.put("$options", Value::String(options.clone()));
        return normalized;
    }
    if let Some(spec) = filter_value.as_document() {
        let all_operators =
            !spec.is_empty() && spec.keys().all(|key| key.starts_with('$'));
        if all_operators {
            return spec.clone();
        }
    }
    let mut normalized = Document::new();
    normalized.put("$eq", filter_value.clone());
    normalized
}

/// Evaluates a field's normalized operator document: every operator must be
/// satisfied by the values the field resolved to.
pub fn field_matches(
    doc: &Document,
    field_key: &str,
    filter_value: &Value,
) -> DolomiteResult<bool> {
    let normalized = normalize_filter(filter_value);
    let resolved = field::get_values(doc, field_key);
    for (key, operand) in normalized.iter() {
        let operator = FilterOperator::from_key(key)?;
        if !operator_satisfied(operator, operand, &normalized, &resolved)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The candidate values an operator quantifies over. Array values also
/// contribute their elements, so element-level operators see through the
/// fan-out; an empty resolution contributes the single absent candidate.
fn candidates(resolved: &ResolvedValues, expand_arrays: bool) -> Vec<Option<&Value>> {
    if resolved.values.is_empty() {
        return vec![None];
    }
    let mut out: Vec<Option<&Value>> = Vec::with_capacity(resolved.values.len());
    for value in &resolved.values {
        out.push(Some(value));
        if expand_arrays {
            if let Value::Array(items) = value {
                out.extend(items.iter().map(Some));
            }
        }
    }
    out
}

fn operator_satisfied(
    operator: FilterOperator,
    operand: &Value,
    normalized: &Document,
    resolved: &ResolvedValues,
) -> DolomiteResult<bool> {
    match operator {
        FilterOperator::Comment => Ok(true),
        FilterOperator::Exists => {
            let wanted = truthy_operand(operand);
            Ok(wanted == resolved.exists)
        }
        // Companion keys carried alongside $regex / $near.
        FilterOperator::Options => validate_options(operand, normalized),
        FilterOperator::MaxDistance | FilterOperator::MinDistance => {
            let has_near = normalized.contains_key("$near")
                || normalized.contains_key("$nearSphere");
            if !has_near {
                return Err(DolomiteError::new(
                    "$maxDistance/$minDistance require $near or $nearSphere",
                    ErrorKind::Client,
                ));
            }
            Ok(true)
        }

        // Negated operators quantify universally: no candidate may violate.
        FilterOperator::Ne => {
            let satisfied = candidates(resolved, true)
                .into_iter()
                .all(|candidate| !equals_candidate(operand, candidate));
            Ok(satisfied)
        }
        FilterOperator::Nin => {
            let members = operand_array(operand, "$nin")?;
            let satisfied = candidates(resolved, true)
                .into_iter()
                .all(|candidate| !in_members(members, candidate));
            Ok(satisfied)
        }

        // Structural operators see the resolved values unexpanded.
        FilterOperator::Size => {
            let expected = operand.as_integer().ok_or_else(|| {
                DolomiteError::new("$size requires an integer", ErrorKind::Client)
            })?;
            if expected < 0 {
                return Ok(false);
            }
            Ok(resolved.values.iter().any(|value| {
                value
                    .as_array()
                    .is_some_and(|items| items.len() as i64 == expected)
            }))
        }
        FilterOperator::All => {
            let members = operand_array(operand, "$all")?;
            if members.is_empty() {
                return Ok(false);
            }
            Ok(resolved.values.iter().any(|value| match value {
                Value::Array(items) => members
                    .iter()
                    .all(|member| items.iter().any(|item| compare::equal(item, member))),
                single => members.len() == 1 && compare::equal(single, &members[0]),
            }))
        }
        FilterOperator::ElemMatch => {
            let spec = operand.as_document().ok_or_else(|| {
                DolomiteError::new("$elemMatch requires a document", ErrorKind::Client)
            })?;
            elem_match(spec, resolved)
        }
        FilterOperator::Type => {
            let mut satisfied = false;
            for value in &resolved.values {
                match compare::is_type(operand, value) {
                    Some(matched) => satisfied |= matched,
                    None => {
                        return Err(DolomiteError::new(
                            "unknown $type specification",
                            ErrorKind::Client,
                        ))
                    }
                }
            }
            Ok(satisfied)
        }
        // Containment quantifies over the whole field value: every point of
        // a multi-point geometry must sit inside for $geoWithin.
        FilterOperator::GeoWithin | FilterOperator::GeoIntersects => {
            for value in &resolved.values {
                if !matches!(value, Value::Array(_) | Value::Document(_)) {
                    continue;
                }
                let contained = if operator == FilterOperator::GeoWithin {
                    geo::geo_within(value, operand)?
                } else {
                    geo::geo_intersects(value, operand)?
                };
                if contained {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        // Everything else is existential over the expanded candidates.
        _ => {
            for candidate in candidates(resolved, true) {
                if single_candidate(operator, operand, normalized, candidate)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn single_candidate(
    operator: FilterOperator,
    operand: &Value,
    normalized: &Document,
    candidate: Option<&Value>,
) -> DolomiteResult<bool> {
    match operator {
        FilterOperator::Eq => Ok(equals_candidate(operand, candidate)),
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            let value = match candidate {
                Some(value) => value,
                None => return Ok(false),
            };
            let equal = compare::equal(value, operand);
            let ordering = compare::compare(value, operand);
            Ok(match operator {
                FilterOperator::Gt => !equal && ordering.is_gt(),
                FilterOperator::Gte => equal || (ordering.is_gt() && comparable(value, operand)),
                FilterOperator::Lt => !equal && ordering.is_lt(),
                FilterOperator::Lte => equal || (ordering.is_lt() && comparable(value, operand)),
                _ => unreachable!(),
            })
        }
        FilterOperator::In => {
            let members = operand_array(operand, "$in")?;
            Ok(in_members(members, candidate))
        }
        FilterOperator::Mod => {
            let (divisor, remainder) = parse_mod(operand)?;
            let value = match candidate.and_then(Value::as_number) {
                Some(number) => number,
                None => return Ok(false),
            };
            Ok(((value % divisor) + divisor) % divisor == remainder)
        }
        FilterOperator::Regex => {
            let regex = compile_regex(operand, normalized)?;
            Ok(candidate
                .and_then(|v| match v {
                    Value::String(s) | Value::Symbol(s) => Some(s.as_str()),
                    _ => None,
                })
                .is_some_and(|text| regex.is_match(text)))
        }
        FilterOperator::BitsAllSet
        | FilterOperator::BitsAnySet
        | FilterOperator::BitsAllClear
        | FilterOperator::BitsAnyClear => {
            let mask = parse_bit_mask(operand)?;
            let value = match candidate.and_then(integral_bits) {
                Some(bits) => bits,
                None => return Ok(false),
            };
            Ok(match operator {
                FilterOperator::BitsAllSet => value & mask == mask,
                FilterOperator::BitsAnySet => value & mask != 0,
                FilterOperator::BitsAllClear => value & mask == 0,
                FilterOperator::BitsAnyClear => value & mask != mask,
                _ => unreachable!(),
            })
        }
        FilterOperator::Near | FilterOperator::NearSphere => {
            let value = match candidate {
                Some(value) => value,
                None => return Ok(false),
            };
            let max = distance_bound(normalized, "$maxDistance")?;
            let min = distance_bound(normalized, "$minDistance")?;
            geo::near(value, operand, max, min, operator == FilterOperator::NearSphere)
        }
        _ => Ok(false),
    }
}

/// Equality against a candidate; the absent candidate only equals a null
/// operand, and regex operands match as patterns.
fn equals_candidate(operand: &Value, candidate: Option<&Value>) -> bool {
    match candidate {
        None => operand.is_null(),
        Some(value) => {
            if let Value::Regex { .. } = operand {
                if let Ok(regex) = compile_regex_value(operand) {
                    if let Value::String(text) = value {
                        return regex.is_match(text);
                    }
                }
                return false;
            }
            compare::equal(value, operand)
        }
    }
}

fn in_members(members: &[Value], candidate: Option<&Value>) -> bool {
    members
        .iter()
        .any(|member| equals_candidate(member, candidate))
}

fn operand_array<'a>(operand: &'a Value, name: &str) -> DolomiteResult<&'a Vec<Value>> {
    operand.as_array().ok_or_else(|| {
        DolomiteError::new(&format!("{} requires an array", name), ErrorKind::Client)
    })
}

fn truthy_operand(operand: &Value) -> bool {
    match operand {
        Value::Bool(b) => *b,
        other => other.as_number().map(|n| n != 0.0).unwrap_or(true),
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    // An Equal ordering from incomparable operands must not satisfy $gte/$lte.
    compare::equal(a, b) || compare::compare(a, b) != std::cmp::Ordering::Equal
}

fn elem_match(spec: &Document, resolved: &ResolvedValues) -> DolomiteResult<bool> {
    let operator_spec = !spec.is_empty() && spec.keys().all(|key| key.starts_with('$'));
    for value in &resolved.values {
        let items = match value.as_array() {
            Some(items) => items,
            None => continue,
        };
        for item in items {
            let matched = if operator_spec {
                // Element-level operators apply to the element itself.
                let element = ResolvedValues {
                    values: vec![item.clone()],
                    exists: true,
                };
                let mut all = true;
                for (key, operand) in spec.iter() {
                    let operator = FilterOperator::from_key(key)?;
                    if !operator_satisfied(operator, operand, spec, &element)? {
                        all = false;
                        break;
                    }
                }
                all
            } else {
                match item.as_document() {
                    Some(element) => crate::filter::is_match(element, spec)?,
                    None => false,
                }
            };
            if matched {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn distance_bound(normalized: &Document, key: &str) -> DolomiteResult<Option<f64>> {
    match normalized.get(key) {
        None => Ok(None),
        Some(value) => value.as_number().map(Some).ok_or_else(|| {
            DolomiteError::new(
                &format!("{} must be a number", key),
                ErrorKind::Client,
            )
        }),
    }
}

fn parse_mod(operand: &Value) -> DolomiteResult<(f64, f64)> {
    let parts = operand.as_array().ok_or_else(|| {
        DolomiteError::with_code(
            "malformed mod, not enough elements",
            ErrorKind::Client,
            codes::MALFORMED_MOD,
        )
    })?;
    if parts.len() < 2 {
        return Err(DolomiteError::with_code(
            "malformed mod, not enough elements",
            ErrorKind::Client,
            codes::MALFORMED_MOD,
        ));
    }
    if parts.len() > 2 {
        return Err(DolomiteError::with_code(
            "malformed mod, too many elements",
            ErrorKind::Client,
            codes::MALFORMED_MOD,
        ));
    }
    match (parts[0].as_number(), parts[1].as_number()) {
        (Some(divisor), Some(remainder)) if divisor != 0.0 => Ok((divisor, remainder)),
        _ => Err(DolomiteError::with_code(
            "malformed mod, divisor and remainder are expected to be numbers",
            ErrorKind::Client,
            codes::MALFORMED_MOD,
        )),
    }
}

fn validate_options(operand: &Value, normalized: &Document) -> DolomiteResult<bool> {
    if !normalized.contains_key("$regex") {
        return Err(DolomiteError::new(
            "$options present without $regex",
            ErrorKind::Client,
        ));
    }
    let options = operand.as_string().ok_or_else(|| {
        DolomiteError::new("invalid value for $options", ErrorKind::Client)
    })?;
    for flag in options.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => {}
            'l' | 'u' => {
                return Err(DolomiteError::new(
                    &format!("$options flag '{}' is not implemented", flag),
                    ErrorKind::Unsupported,
                ))
            }
            _ => {
                return Err(DolomiteError::new(
                    "invalid value for $options",
                    ErrorKind::Client,
                ))
            }
        }
    }
    Ok(true)
}

fn compile_regex(operand: &Value, normalized: &Document) -> DolomiteResult<regex::Regex> {
    let (pattern, inline_options) = match operand {
        Value::String(pattern) => (pattern.as_str(), ""),
        Value::Regex { pattern, options } => (pattern.as_str(), options.as_str()),
        _ => {
            return Err(DolomiteError::new(
                "$regex requires a pattern",
                ErrorKind::Client,
            ))
        }
    };
    let sibling_options = normalized
        .get("$options")
        .and_then(Value::as_string)
        .unwrap_or("");
    build_regex(pattern, if sibling_options.is_empty() { inline_options } else { sibling_options })
}

fn compile_regex_value(operand: &Value) -> DolomiteResult<regex::Regex> {
    match operand {
        Value::Regex { pattern, options } => build_regex(pattern, options),
        _ => Err(DolomiteError::new(
            "expected a regular expression",
            ErrorKind::Client,
        )),
    }
}

fn build_regex(pattern: &str, options: &str) -> DolomiteResult<regex::Regex> {
    let mut flags = String::new();
    for flag in options.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => flags.push(flag),
            'l' | 'u' => {
                return Err(DolomiteError::new(
                    &format!("$options flag '{}' is not implemented", flag),
                    ErrorKind::Unsupported,
                ))
            }
            _ => {
                return Err(DolomiteError::new(
                    "invalid value for $options",
                    ErrorKind::Client,
                ))
            }
        }
    }
    let full = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    };
    Ok(regex::Regex::new(&full)?)
}

fn parse_bit_mask(operand: &Value) -> DolomiteResult<u64> {
    match operand {
        Value::Array(positions) => {
            let mut mask: u64 = 0;
            for position in positions {
                let bit = position.as_integer().ok_or_else(|| {
                    DolomiteError::new(
                        "bit positions must be non-negative integers",
                        ErrorKind::Client,
                    )
                })?;
                if !(0..64).contains(&bit) {
                    return Err(DolomiteError::new(
                        "bit positions must be between 0 and 63",
                        ErrorKind::Client,
                    ));
                }
                mask |= 1 << bit;
            }
            Ok(mask)
        }
        other => match other.as_integer() {
            Some(mask) if mask >= 0 => Ok(mask as u64),
            _ => Err(DolomiteError::new(
                "bitwise operators require a non-negative mask or bit positions",
                ErrorKind::Client,
            )),
        },
    }
}

/// The integer bit pattern of a numeric value, if it has one.
fn integral_bits(value: &Value) -> Option<u64> {
    match value {
        Value::Int32(n) if *n >= 0 => Some(*n as u64),
        Value::Int64(n) if *n >= 0 => Some(*n as u64),
        Value::Double(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn matches(doc: &Document, field_key: &str, filter_value: Value) -> bool {
        field_matches(doc, field_key, &filter_value).unwrap()
    }

    #[test]
    fn literal_normalizes_to_eq() {
        let doc = doc! { "a": 1 };
        assert!(matches(&doc, "a", Value::Int32(1)));
        assert!(!matches(&doc, "a", Value::Int32(2)));
    }

    #[test]
    fn unknown_operator_is_a_client_error() {
        let doc = doc! { "a": 1 };
        let filter = crate::doc_value!({ "$frobnicate": 1 });
        let err = field_matches(&doc, "a", &filter).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Client);
        assert_eq!(err.code(), codes::BAD_VALUE);
    }

    #[test]
    fn comparison_operators_respect_categories() {
        let doc = doc! { "n": 5 };
        assert!(matches(&doc, "n", crate::doc_value!({ "$gt": 3 })));
        assert!(matches(&doc, "n", crate::doc_value!({ "$lte": 5 })));
        // Incomparable operands never satisfy an order.
        assert!(!matches(&doc, "n", crate::doc_value!({ "$gt": "3" })));
        assert!(!matches(&doc, "n", crate::doc_value!({ "$gte": "5" })));
    }

    #[test]
    fn array_elements_participate_in_comparisons() {
        let doc = doc! { "r": [5, 8, 9] };
        assert!(matches(&doc, "r", crate::doc_value!({ "$gt": 8 })));
        assert!(matches(&doc, "r", Value::Int32(8)));
        assert!(!matches(&doc, "r", Value::Int32(7)));
    }

    #[test]
    fn ne_is_universal_over_elements() {
        let doc = doc! { "r": [5, 8] };
        assert!(!matches(&doc, "r", crate::doc_value!({ "$ne": 5 })));
        assert!(matches(&doc, "r", crate::doc_value!({ "$ne": 7 })));
    }

    #[test]
    fn in_and_nin_membership() {
        let doc = doc! { "a": 2 };
        assert!(matches(&doc, "a", crate::doc_value!({ "$in": [1, 2, 3] })));
        assert!(!matches(&doc, "a", crate::doc_value!({ "$nin": [1, 2, 3] })));
        assert!(matches(&doc, "a", crate::doc_value!({ "$nin": [7] })));
        let err = field_matches(&doc! { "a": 1 }, "a", &crate::doc_value!({ "$in": 5 }));
        assert!(err.is_err());
    }

    #[test]
    fn exists_distinguishes_absence_from_null() {
        let doc = doc! { "a": (Value::Null) };
        assert!(matches(&doc, "a", crate::doc_value!({ "$exists": true })));
        assert!(!matches(&doc, "b", crate::doc_value!({ "$exists": true })));
        assert!(matches(&doc, "b", crate::doc_value!({ "$exists": false })));
    }

    #[test]
    fn null_filter_matches_absent_field() {
        let doc = doc! { "a": 1 };
        assert!(matches(&doc, "missing", Value::Null));
        assert!(!matches(&doc, "a", Value::Null));
    }

    #[test]
    fn mod_validates_operand_shape() {
        let doc = doc! { "n": 10 };
        assert!(matches(&doc, "n", crate::doc_value!({ "$mod": [4, 2] })));
        assert!(!matches(&doc, "n", crate::doc_value!({ "$mod": [4, 3] })));
        let err = field_matches(&doc, "n", &crate::doc_value!({ "$mod": [4] })).unwrap_err();
        assert_eq!(err.code(), codes::MALFORMED_MOD);
        let err =
            field_matches(&doc, "n", &crate::doc_value!({ "$mod": [4, 2, 1] })).unwrap_err();
        assert_eq!(err.code(), codes::MALFORMED_MOD);
    }

    #[test]
    fn mod_uses_euclidean_remainder() {
        let doc = doc! { "n": (-7) };
        assert!(matches(&doc, "n", crate::doc_value!({ "$mod": [3, 2] })));
    }

    #[test]
    fn regex_with_options() {
        let doc = doc! { "s": "Hello World" };
        assert!(matches(
            &doc,
            "s",
            crate::doc_value!({ "$regex": "hello", "$options": "i" })
        ));
        assert!(!matches(&doc, "s", crate::doc_value!({ "$regex": "hello" })));
        let err = field_matches(
            &doc,
            "s",
            &crate::doc_value!({ "$regex": "x", "$options": "u" }),
        )
        .unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn options_without_regex_is_an_error() {
        let doc = doc! { "s": "x" };
        assert!(field_matches(&doc, "s", &crate::doc_value!({ "$options": "i" })).is_err());
    }

    #[test]
    fn regex_literal_normalizes() {
        let doc = doc! { "s": "abc" };
        let filter = Value::Regex {
            pattern: "^a".into(),
            options: "".into(),
        };
        assert!(matches(&doc, "s", filter));
    }

    #[test]
    fn type_matches_by_name_and_code() {
        let doc = doc! { "a": 1, "b": "x" };
        assert!(matches(&doc, "a", crate::doc_value!({ "$type": "int" })));
        assert!(matches(&doc, "b", crate::doc_value!({ "$type": 2 })));
        assert!(!matches(&doc, "a", crate::doc_value!({ "$type": "string" })));
        assert!(field_matches(&doc, "a", &crate::doc_value!({ "$type": "nope" })).is_err());
    }

    #[test]
    fn size_matches_exact_length() {
        let doc = doc! { "r": [1, 2, 3] };
        assert!(matches(&doc, "r", crate::doc_value!({ "$size": 3 })));
        assert!(!matches(&doc, "r", crate::doc_value!({ "$size": 2 })));
        assert!(!matches(&doc! { "r": 3 }, "r", crate::doc_value!({ "$size": 1 })));
    }

    #[test]
    fn all_requires_every_member() {
        let doc = doc! { "tags": ["a", "b", "c"] };
        assert!(matches(&doc, "tags", crate::doc_value!({ "$all": ["a", "c"] })));
        assert!(!matches(&doc, "tags", crate::doc_value!({ "$all": ["a", "z"] })));
        assert!(!matches(&doc, "tags", crate::doc_value!({ "$all": [] })));
    }

    #[test]
    fn elem_match_with_operator_spec() {
        let doc = doc! { "r": [5, 8, 9] };
        assert!(matches(
            &doc,
            "r",
            crate::doc_value!({ "$elemMatch": { "$gt": 5, "$lt": 9 } })
        ));
        assert!(!matches(
            &doc,
            "r",
            crate::doc_value!({ "$elemMatch": { "$gt": 9 } })
        ));
    }

    #[test]
    fn elem_match_with_document_spec() {
        let doc = doc! { "items": [ { "n": 1 }, { "n": 5 } ] };
        assert!(matches(
            &doc,
            "items",
            crate::doc_value!({ "$elemMatch": { "n": { "$gte": 5 } } })
        ));
        assert!(!matches(
            &doc,
            "items",
            crate::doc_value!({ "$elemMatch": { "n": { "$gt": 5 } } })
        ));
    }

    #[test]
    fn bitwise_operators_with_mask_and_positions() {
        let doc = doc! { "flags": 0b1010 };
        assert!(matches(&doc, "flags", crate::doc_value!({ "$bitsAllSet": 0b1010 })));
        assert!(matches(&doc, "flags", crate::doc_value!({ "$bitsAllSet": [1, 3] })));
        assert!(!matches(&doc, "flags", crate::doc_value!({ "$bitsAllSet": [0, 1] })));
        assert!(matches(&doc, "flags", crate::doc_value!({ "$bitsAnySet": [0, 1] })));
        assert!(matches(&doc, "flags", crate::doc_value!({ "$bitsAllClear": [0, 2] })));
        assert!(matches(&doc, "flags", crate::doc_value!({ "$bitsAnyClear": [0, 1] })));
        assert!(!matches(&doc, "flags", crate::doc_value!({ "$bitsAnyClear": [1, 3] })));
    }

    #[test]
    fn geo_within_polygon_through_field_filter() {
        let doc = doc! { "loc": [5.0, 5.0] };
        let filter = crate::doc_value!({ "$geoWithin": { "$polygon": [
            [0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]
        ] } });
        assert!(matches(&doc, "loc", filter));
    }

    #[test]
    fn near_with_sibling_distance_bounds() {
        let doc = doc! { "loc": [3.0, 4.0] };
        let filter = crate::doc_value!({ "$near": [0.0, 0.0], "$maxDistance": 5.5 });
        assert!(matches(&doc, "loc", filter));
        let filter = crate::doc_value!({ "$near": [0.0, 0.0], "$maxDistance": 4.0 });
        assert!(!matches(&doc, "loc", filter));
    }
}
