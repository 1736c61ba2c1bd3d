use crate::common::document::Document;
use crate::common::Value;
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};
use crate::filter::{operators, text_search, where_expr};

/// Evaluates a filter document against a candidate.
///
/// Every top-level key must succeed: logical keys (`$and`, `$or`, `$nor`,
/// `$not`) recurse structurally, `$where` and `$text` run their dedicated
/// evaluators, `$comment` always succeeds, and any other key names a field
/// whose normalized operator document is checked against the values the
/// field resolves to. An empty filter matches everything.
pub fn is_match(doc: &Document, filter: &Document) -> DolomiteResult<bool> {
    for (key, value) in filter.iter() {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_filters(value, "$and")? {
                    if !is_match(doc, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_match(doc, value, "$or")?,
            "$nor" => !any_match(doc, value, "$nor")?,
            "$not" => {
                let sub = value.as_document().ok_or_else(|| {
                    DolomiteError::new("$not requires a filter document", ErrorKind::Client)
                })?;
                !is_match(doc, sub)?
            }
            "$where" => {
                let body = value.as_string().ok_or_else(|| {
                    DolomiteError::new("$where requires a string", ErrorKind::Client)
                })?;
                where_expr::evaluate(doc, body)?
            }
            "$text" => {
                let spec = value.as_document().ok_or_else(|| {
                    DolomiteError::new("$text requires a document", ErrorKind::Client)
                })?;
                text_search::evaluate(doc, spec)?
            }
            "$comment" => true,
            field_key => operators::field_matches(doc, field_key, value)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_match(doc: &Document, value: &Value, name: &str) -> DolomiteResult<bool> {
    for sub in sub_filters(value, name)? {
        if is_match(doc, sub)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn sub_filters<'a>(value: &'a Value, name: &str) -> DolomiteResult<Vec<&'a Document>> {
    let items = value.as_array().ok_or_else(|| {
        DolomiteError::new(
            &format!("{} requires an array of filters", name),
            ErrorKind::Client,
        )
    })?;
    if items.is_empty() {
        return Err(DolomiteError::new(
            &format!("{} requires a non-empty array", name),
            ErrorKind::Client,
        ));
    }
    items
        .iter()
        .map(|item| {
            item.as_document().ok_or_else(|| {
                DolomiteError::new(
                    &format!("{} members must be filter documents", name),
                    ErrorKind::Client,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(is_match(&doc! { "a": 1 }, &doc! {}).unwrap());
    }

    #[test]
    fn all_top_level_keys_must_match() {
        let doc = doc! { "a": 1, "b": 2 };
        assert!(is_match(&doc, &doc! { "a": 1, "b": 2 }).unwrap());
        assert!(!is_match(&doc, &doc! { "a": 1, "b": 3 }).unwrap());
    }

    #[test]
    fn and_or_nor_recurse() {
        let doc = doc! { "a": 1, "b": 2 };
        let and = doc! { "$and": [ { "a": 1 }, { "b": 2 } ] };
        assert!(is_match(&doc, &and).unwrap());
        let or = doc! { "$or": [ { "a": 9 }, { "b": 2 } ] };
        assert!(is_match(&doc, &or).unwrap());
        let nor = doc! { "$nor": [ { "a": 9 }, { "b": 9 } ] };
        assert!(is_match(&doc, &nor).unwrap());
        let nor = doc! { "$nor": [ { "a": 1 } ] };
        assert!(!is_match(&doc, &nor).unwrap());
    }

    #[test]
    fn not_negates_its_filter() {
        let doc = doc! { "a": 1 };
        assert!(is_match(&doc, &doc! { "$not": { "a": 9 } }).unwrap());
        assert!(!is_match(&doc, &doc! { "$not": { "a": 1 } }).unwrap());
    }

    #[test]
    fn logical_operators_validate_shape() {
        let doc = doc! { "a": 1 };
        assert!(is_match(&doc, &doc! { "$and": 1 }).is_err());
        assert!(is_match(&doc, &doc! { "$or": [] }).is_err());
        assert!(is_match(&doc, &doc! { "$and": [1] }).is_err());
    }

    #[test]
    fn comment_always_succeeds() {
        let doc = doc! { "a": 1 };
        assert!(is_match(&doc, &doc! { "$comment": "why not", "a": 1 }).unwrap());
    }

    #[test]
    fn where_runs_the_expression_language() {
        let doc = doc! { "age": 30 };
        assert!(is_match(&doc, &doc! { "$where": "this.age > 18" }).unwrap());
        let err = is_match(&doc, &doc! { "$where": "db.x" }).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::ScriptRejected);
    }

    #[test]
    fn text_search_through_the_matcher() {
        let doc = doc! { "title": "brown fox" };
        let filter = doc! { "$text": { "$search": "fox" } };
        assert!(is_match(&doc, &filter).unwrap());
    }

    #[test]
    fn dotted_field_keys_resolve() {
        let doc = doc! { "a": { "b": { "c": 2 } } };
        assert!(is_match(&doc, &doc! { "a.b.c": 2 }).unwrap());
        assert!(!is_match(&doc, &doc! { "a.b.c": 3 }).unwrap());
    }
}
