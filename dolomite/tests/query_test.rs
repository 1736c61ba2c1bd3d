extern crate dolomite;

#[cfg(test)]
mod tests {
    use dolomite::command::Engine;
    use dolomite::common::{Document, Value};
    use dolomite::doc;
    use dolomite::errors::ErrorKind;

    #[ctor::ctor]
    fn init_logger() {
        colog::init();
    }

    fn seeded(docs: Vec<Document>) -> Engine {
        let engine = Engine::in_memory();
        let mut cmd = doc! { "insert": "test" };
        cmd.put(
            "documents",
            Value::Array(docs.into_iter().map(Value::Document).collect()),
        );
        engine.execute(&cmd).unwrap();
        engine
    }

    fn matched_ids(engine: &Engine, filter: Document) -> Vec<i64> {
        let mut cmd = doc! { "find": "test", "sort": { "_id": 1 } };
        cmd.put("filter", Value::Document(filter));
        let result = engine.execute(&cmd).unwrap();
        result
            .get("cursor")
            .and_then(Value::as_document)
            .and_then(|c| c.get("firstBatch"))
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .map(|v| {
                v.as_document()
                    .and_then(|d| d.get("_id"))
                    .and_then(Value::as_integer)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn comparison_operators_follow_canonical_order() {
        let engine = seeded(vec![
            doc! { "_id": 1, "v": 5 },
            doc! { "_id": 2, "v": 10 },
            doc! { "_id": 3, "v": "text" },
            doc! { "_id": 4 },
        ]);
        assert_eq!(matched_ids(&engine, doc! { "v": { "$gt": 5 } }), vec![2]);
        assert_eq!(matched_ids(&engine, doc! { "v": { "$gte": 5 } }), vec![1, 2]);
        assert_eq!(matched_ids(&engine, doc! { "v": { "$lt": 10 } }), vec![1]);
        // Strings and numbers are different categories, never ordered
        // against each other.
        assert_eq!(
            matched_ids(&engine, doc! { "v": { "$gt": "a" } }),
            vec![3]
        );
    }

    #[test]
    fn ne_is_universal_over_arrays() {
        let engine = seeded(vec![
            doc! { "_id": 1, "tags": ["a", "b"] },
            doc! { "_id": 2, "tags": ["b", "c"] },
            doc! { "_id": 3, "tags": ["c"] },
        ]);
        assert_eq!(matched_ids(&engine, doc! { "tags": "b" }), vec![1, 2]);
        assert_eq!(matched_ids(&engine, doc! { "tags": { "$ne": "b" } }), vec![3]);
    }

    #[test]
    fn null_equality_matches_absent_fields() {
        let engine = seeded(vec![
            doc! { "_id": 1, "v": (Value::Null) },
            doc! { "_id": 2, "v": 1 },
            doc! { "_id": 3 },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "v": (Value::Null) }),
            vec![1, 3]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "v": { "$exists": true } }),
            vec![1, 2]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "v": { "$exists": false } }),
            vec![3]
        );
    }

    #[test]
    fn dotted_paths_fan_out_through_arrays() {
        let engine = seeded(vec![
            doc! { "_id": 1, "a": { "b": { "c": 2 } } },
            doc! { "_id": 2, "items": [ { "n": 1 }, { "n": 5 } ] },
        ]);
        assert_eq!(matched_ids(&engine, doc! { "a.b.c": 2 }), vec![1]);
        assert_eq!(matched_ids(&engine, doc! { "items.n": 5 }), vec![2]);
        assert_eq!(matched_ids(&engine, doc! { "items.0.n": 1 }), vec![2]);
    }

    #[test]
    fn elem_match_requires_one_element_satisfying_all() {
        let engine = seeded(vec![
            doc! { "_id": 1, "r": [5, 8, 9] },
            doc! { "_id": 2, "r": [5, 9] },
        ]);
        let filter = doc! { "r": { "$elemMatch": { "$gt": 5, "$lt": 9 } } };
        assert_eq!(matched_ids(&engine, filter), vec![1]);
    }

    #[test]
    fn all_size_and_in() {
        let engine = seeded(vec![
            doc! { "_id": 1, "tags": ["x", "y", "z"] },
            doc! { "_id": 2, "tags": ["x"] },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "tags": { "$all": ["x", "z"] } }),
            vec![1]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "tags": { "$size": 1 } }),
            vec![2]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "tags": { "$in": ["y", "q"] } }),
            vec![1]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "tags": { "$nin": ["y", "q"] } }),
            vec![2]
        );
    }

    #[test]
    fn type_and_mod_operators() {
        let engine = seeded(vec![
            doc! { "_id": 1, "v": 10 },
            doc! { "_id": 2, "v": "ten" },
            doc! { "_id": 3, "v": 10.5 },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "v": { "$type": "string" } }),
            vec![2]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "v": { "$type": 1 } }),
            vec![3]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "v": { "$mod": [4, 2] } }),
            vec![1]
        );
        let mut cmd = doc! { "find": "test" };
        cmd.put("filter", Value::Document(doc! { "v": { "$mod": [0, 1] } }));
        let err = engine.execute(&cmd).unwrap_err();
        assert_eq!(err.code(), 16810);
    }

    #[test]
    fn regex_with_options() {
        let engine = seeded(vec![
            doc! { "_id": 1, "name": "Brown Fox" },
            doc! { "_id": 2, "name": "red fox" },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "name": { "$regex": "^brown", "$options": "i" } }),
            vec![1]
        );
        let mut cmd = doc! { "find": "test" };
        cmd.put(
            "filter",
            Value::Document(doc! { "name": { "$regex": "x", "$options": "l" } }),
        );
        let err = engine.execute(&cmd).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn bitwise_operators_on_integers() {
        let engine = seeded(vec![
            doc! { "_id": 1, "flags": 0b1010 },
            doc! { "_id": 2, "flags": 0b0101 },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "flags": { "$bitsAllSet": 0b1010 } }),
            vec![1]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "flags": { "$bitsAnySet": [0, 2] } }),
            vec![2]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "flags": { "$bitsAllClear": 0b1010 } }),
            vec![2]
        );
    }

    #[test]
    fn logical_composition() {
        let engine = seeded(vec![
            doc! { "_id": 1, "a": 1, "b": 1 },
            doc! { "_id": 2, "a": 1, "b": 2 },
            doc! { "_id": 3, "a": 2, "b": 2 },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "$and": [ { "a": 1 }, { "b": 2 } ] }),
            vec![2]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "$or": [ { "b": 1 }, { "a": 2 } ] }),
            vec![1, 3]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "$nor": [ { "a": 1 } ] }),
            vec![3]
        );
    }

    #[test]
    fn unknown_operator_is_a_client_error() {
        let engine = seeded(vec![doc! { "_id": 1, "v": 1 }]);
        let mut cmd = doc! { "find": "test" };
        cmd.put("filter", Value::Document(doc! { "v": { "$near2": 1 } }));
        let err = engine.execute(&cmd).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Client);
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn where_expressions_and_deny_list() {
        let engine = seeded(vec![
            doc! { "_id": 1, "age": 30 },
            doc! { "_id": 2, "age": 10 },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "$where": "this.age > 18" }),
            vec![1]
        );
        let mut cmd = doc! { "find": "test" };
        cmd.put(
            "filter",
            Value::Document(doc! { "$where": "process.exit(1)" }),
        );
        let err = engine.execute(&cmd).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::ScriptRejected);
    }

    #[test]
    fn text_search_with_phrases_and_negations() {
        let engine = seeded(vec![
            doc! { "_id": 1, "title": "the quick brown fox" },
            doc! { "_id": 2, "title": "a lazy brown dog" },
            doc! { "_id": 3, "title": "quick silver" },
        ]);
        assert_eq!(
            matched_ids(&engine, doc! { "$text": { "$search": "brown" } }),
            vec![1, 2]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "$text": { "$search": "brown -dog" } }),
            vec![1]
        );
        assert_eq!(
            matched_ids(&engine, doc! { "$text": { "$search": "\"quick brown\"" } }),
            vec![1]
        );
    }

    #[test]
    fn geo_within_and_near() {
        let engine = seeded(vec![
            doc! { "_id": 1, "loc": [0.5, 0.5] },
            doc! { "_id": 2, "loc": [5.0, 5.0] },
        ]);
        let in_box = doc! { "loc": { "$geoWithin": { "$box": [[0.0, 0.0], [1.0, 1.0]] } } };
        assert_eq!(matched_ids(&engine, in_box), vec![1]);
        let near = doc! { "loc": { "$near": [0.0, 0.0], "$maxDistance": 1.0 } };
        assert_eq!(matched_ids(&engine, near), vec![1]);
        let polygon = doc! { "loc": { "$geoWithin": {
            "$polygon": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]
        } } };
        assert_eq!(matched_ids(&engine, polygon), vec![1, 2]);
    }
}
