//! Command execution: structural recognition of insert/update/delete/find/
//! getMore/killCursors documents, batch write bookkeeping and the
//! engine-owned cursor registry.

mod cursor;

use crate::common::document::{Document, DOC_ID};
use crate::common::{SortSpec, Value};
use crate::doc;
use crate::errors::{codes, DolomiteError, DolomiteResult, ErrorKind};
use crate::filter::is_match;
use crate::store::{BincodeCodec, DocumentCodec, KeyValueStore, MemoryStore};
use crate::update::{self, UpdateBody};
use cursor::{Cursor, FindOptions};
use dashmap::DashMap;
use std::sync::Arc;

/// The embedded command engine over one collection.
///
/// Owns the cursor registry; cursors live from their `find` until
/// exhaustion, `killCursors` or engine drop. The backing store and the
/// codec are injected, `in_memory` wires the shipped defaults.
pub struct Engine {
    store: Arc<dyn KeyValueStore>,
    codec: Arc<dyn DocumentCodec>,
    cursors: DashMap<u64, Arc<Cursor>>,
}

impl Engine {
    pub fn new(store: Arc<dyn KeyValueStore>, codec: Arc<dyn DocumentCodec>) -> Self {
        Engine {
            store,
            codec,
            cursors: DashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Engine::new(Arc::new(MemoryStore::new()), Arc::new(BincodeCodec::new()))
    }

    /// Dispatches a command document by its shape.
    pub fn execute(&self, cmd: &Document) -> DolomiteResult<Document> {
        if cmd.get("insert").is_some() && cmd.get("documents").is_some() {
            return self.execute_insert(cmd);
        }
        if cmd.get("update").is_some() && cmd.get("updates").is_some() {
            return self.execute_update(cmd);
        }
        if cmd.get("delete").is_some() && cmd.get("deletes").is_some() {
            return self.execute_delete(cmd);
        }
        if cmd.get("find").is_some() {
            return self.execute_find(cmd);
        }
        if cmd.get("getMore").is_some() {
            return self.execute_get_more(cmd);
        }
        if cmd.get("killCursors").is_some() && cmd.get("cursors").is_some() {
            return self.execute_kill_cursors(cmd);
        }
        log::error!("Unrecognized command document: {:?}", cmd.keys().collect::<Vec<_>>());
        Err(DolomiteError::new(
            "unrecognized command document",
            ErrorKind::Client,
        ))
    }

    pub fn execute_insert(&self, cmd: &Document) -> DolomiteResult<Document> {
        let documents = required_array(cmd, "documents")?;
        let ordered = cmd.get("ordered").and_then(Value::as_bool).unwrap_or(true);
        let mut n = 0i32;
        let mut write_errors = Vec::new();
        for (index, doc) in documents.iter().enumerate() {
            match self.insert_one(doc) {
                Ok(()) => n += 1,
                Err(error) => {
                    write_errors.push(write_error(index, &error));
                    if ordered {
                        break;
                    }
                }
            }
        }
        Ok(write_result(n, write_errors))
    }

    fn insert_one(&self, value: &Value) -> DolomiteResult<()> {
        let mut doc = value
            .as_document()
            .ok_or_else(|| {
                DolomiteError::new("insert entries must be documents", ErrorKind::Client)
            })?
            .clone();
        let id = doc.ensure_id();
        let key = self.codec.serialize_id(&id)?;
        if self.store.get(&key)?.is_some() {
            return Err(DolomiteError::with_code(
                &format!("duplicate key error, dup key: {{ {}: {:?} }}", DOC_ID, id),
                ErrorKind::Conflict,
                codes::DUPLICATE_KEY,
            ));
        }
        self.store.put(key, self.codec.serialize(&doc)?)
    }

    pub fn execute_update(&self, cmd: &Document) -> DolomiteResult<Document> {
        let updates = required_array(cmd, "updates")?;
        let ordered = cmd.get("ordered").and_then(Value::as_bool).unwrap_or(true);
        let mut counts = UpdateCounts::default();
        let mut upserted = Vec::new();
        let mut write_errors = Vec::new();
        for (index, spec) in updates.iter().enumerate() {
            match self.update_one(spec, index, &mut counts, &mut upserted) {
                Ok(()) => {}
                Err(error) => {
                    write_errors.push(write_error(index, &error));
                    if ordered {
                        break;
                    }
                }
            }
        }
        let mut result = write_result(counts.matched + counts.upserted, write_errors);
        result.put("nMatched", counts.matched);
        result.put("nModified", counts.modified);
        result.put("nUpserted", counts.upserted);
        if !upserted.is_empty() {
            result.put("upserted", Value::Array(upserted));
        }
        Ok(result)
    }

    fn update_one(
        &self,
        spec: &Value,
        index: usize,
        counts: &mut UpdateCounts,
        upserted: &mut Vec<Value>,
    ) -> DolomiteResult<()> {
        let spec = spec.as_document().ok_or_else(|| {
            DolomiteError::new("update entries must be documents", ErrorKind::Client)
        })?;
        let filter = optional_document(spec, "q")?.cloned().unwrap_or_default();
        let body = spec
            .get("u")
            .and_then(Value::as_document)
            .ok_or_else(|| {
                DolomiteError::new("update entries require a 'u' document", ErrorKind::Client)
            })?;
        let multi = spec.get("multi").and_then(Value::as_bool).unwrap_or(false);
        let upsert = spec.get("upsert").and_then(Value::as_bool).unwrap_or(false);

        let body_kind = update::classify(body)?;
        if body_kind == UpdateBody::Replacement && multi {
            return Err(DolomiteError::with_code(
                "multi update only works with $ operators",
                ErrorKind::Constraint,
                codes::MULTI_UPDATE_WITHOUT_OPERATORS,
            ));
        }

        let matches = self.find_matching(&filter, if multi { 0 } else { 1 })?;
        if matches.is_empty() {
            if upsert {
                let target = update::synthesize_upsert(&filter, body)?;
                let id = target.id().cloned().unwrap_or_default();
                self.insert_one(&Value::Document(target))?;
                counts.upserted += 1;
                upserted.push(Value::Document(doc! {
                    "index": (index as i32),
                    "_id": id
                }));
            }
            return Ok(());
        }

        for old in matches {
            counts.matched += 1;
            let (new_doc, modified) = match body_kind {
                UpdateBody::Replacement => update::apply_replacement(&old, body),
                UpdateBody::Operators => {
                    let mut updated = old.clone();
                    let modified = update::apply_operators(&mut updated, body)?;
                    (updated, modified)
                }
            };
            if modified {
                self.persist(&old, new_doc)?;
                counts.modified += 1;
            }
        }
        Ok(())
    }

    /// Writes an updated document back, relocating it if its `_id` changed.
    fn persist(&self, old: &Document, new_doc: Document) -> DolomiteResult<()> {
        let old_key = match old.id() {
            Some(id) => Some(self.codec.serialize_id(id)?),
            None => None,
        };
        let id = match new_doc.id() {
            Some(id) => id.clone(),
            None => Value::Null,
        };
        let new_key = self.codec.serialize_id(&id)?;
        if let Some(old_key) = old_key {
            if old_key != new_key {
                self.store.delete(&old_key)?;
            }
        }
        self.store.put(new_key, self.codec.serialize(&new_doc)?)
    }

    pub fn execute_delete(&self, cmd: &Document) -> DolomiteResult<Document> {
        let deletes = required_array(cmd, "deletes")?;
        let ordered = cmd.get("ordered").and_then(Value::as_bool).unwrap_or(true);
        let mut n = 0i32;
        let mut write_errors = Vec::new();
        for (index, spec) in deletes.iter().enumerate() {
            match self.delete_one(spec) {
                Ok(count) => n += count,
                Err(error) => {
                    write_errors.push(write_error(index, &error));
                    if ordered {
                        break;
                    }
                }
            }
        }
        Ok(write_result(n, write_errors))
    }

    fn delete_one(&self, spec: &Value) -> DolomiteResult<i32> {
        let spec = spec.as_document().ok_or_else(|| {
            DolomiteError::new("delete entries must be documents", ErrorKind::Client)
        })?;
        let filter = optional_document(spec, "q")?.cloned().unwrap_or_default();
        let limit = spec.get("limit").and_then(Value::as_integer).unwrap_or(0);
        let matches = self.find_matching(&filter, limit.max(0) as usize)?;
        let mut removed = 0;
        for doc in matches {
            if let Some(id) = doc.id() {
                let key = self.codec.serialize_id(id)?;
                self.store.delete(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn execute_find(&self, cmd: &Document) -> DolomiteResult<Document> {
        let filter = optional_document(cmd, "filter")?.cloned().unwrap_or_default();
        let projection = optional_document(cmd, "projection")?.cloned();
        let sort = SortSpec::from_value(cmd.get("sort"))?;
        let skip = cmd
            .get("skip")
            .and_then(Value::as_integer)
            .unwrap_or(0)
            .max(0);
        let mut single_batch = cmd
            .get("singleBatch")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let limit = match cmd.get("limit").and_then(Value::as_integer) {
            None | Some(0) => None,
            // A negative limit means one capped batch.
            Some(limit) if limit < 0 => {
                single_batch = true;
                Some((-limit) as usize)
            }
            Some(limit) => Some(limit as usize),
        };
        let batch_size = positive_size(cmd.get("batchSize"));

        let options = FindOptions {
            filter,
            projection,
            sort,
            skip,
            limit,
            batch_size,
            single_batch,
        };
        let cursor = self.register_cursor(options);
        let id = cursor.id();
        let batch = match cursor.draw_batch(Some(cursor.first_batch_size())) {
            Ok(batch) => batch,
            Err(error) => {
                self.remove_cursor(id);
                return Err(error);
            }
        };
        let reported = if cursor.single_batch() || batch.is_empty() {
            self.remove_cursor(id);
            0
        } else {
            id
        };
        Ok(cursor_result(reported, "firstBatch", batch))
    }

    pub fn execute_get_more(&self, cmd: &Document) -> DolomiteResult<Document> {
        let id = cmd
            .get("getMore")
            .and_then(Value::as_integer)
            .map(|id| id as u64)
            .ok_or_else(|| {
                DolomiteError::new("getMore requires a cursor id", ErrorKind::Client)
            })?;
        let cursor = self
            .cursors
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                DolomiteError::new(
                    &format!("cursor id {} not found", id),
                    ErrorKind::CursorNotFound,
                )
            })?;
        let size = positive_size(cmd.get("batchSize")).or(cursor.next_batch_size());
        let batch = match cursor.draw_batch(size) {
            Ok(batch) => batch,
            Err(error) => {
                self.remove_cursor(id);
                return Err(error);
            }
        };
        let reported = if batch.is_empty() {
            self.remove_cursor(id);
            0
        } else {
            id
        };
        Ok(cursor_result(reported, "nextBatch", batch))
    }

    pub fn execute_kill_cursors(&self, cmd: &Document) -> DolomiteResult<Document> {
        let ids = required_array(cmd, "cursors")?;
        let mut killed = Vec::new();
        let mut not_found = Vec::new();
        for value in ids {
            let id = value.as_integer().map(|id| id as u64);
            match id.and_then(|id| self.cursors.remove(&id)) {
                Some((id, cursor)) => {
                    cursor.delete();
                    killed.push(Value::Int64(id as i64));
                }
                None => not_found.push(value.clone()),
            }
        }
        Ok(doc! {
            "ok": 1,
            "cursorsKilled": (Value::Array(killed)),
            "cursorsNotFound": (Value::Array(not_found))
        })
    }

    fn register_cursor(&self, options: FindOptions) -> Arc<Cursor> {
        let id = loop {
            let id = rand::random::<u64>();
            if id != 0 && !self.cursors.contains_key(&id) {
                break id;
            }
        };
        let cursor = Arc::new(Cursor::new(
            id,
            Arc::clone(&self.store),
            Arc::clone(&self.codec),
            options,
        ));
        self.cursors.insert(id, Arc::clone(&cursor));
        cursor
    }

    fn remove_cursor(&self, id: u64) {
        if let Some((_, cursor)) = self.cursors.remove(&id) {
            cursor.delete();
        }
    }

    /// Scans the store for documents matching `filter`; `limit` of zero
    /// means unbounded.
    fn find_matching(&self, filter: &Document, limit: usize) -> DolomiteResult<Vec<Document>> {
        let mut matches = Vec::new();
        for bytes in self.store.scan_values()? {
            let doc = self.codec.deserialize(&bytes)?;
            if is_match(&doc, filter)? {
                matches.push(doc);
                if limit != 0 && matches.len() >= limit {
                    break;
                }
            }
        }
        Ok(matches)
    }
}

#[derive(Default)]
struct UpdateCounts {
    matched: i32,
    modified: i32,
    upserted: i32,
}

fn required_array<'a>(cmd: &'a Document, key: &str) -> DolomiteResult<&'a Vec<Value>> {
    cmd.get(key).and_then(Value::as_array).ok_or_else(|| {
        DolomiteError::new(&format!("'{}' must be an array", key), ErrorKind::Client)
    })
}

fn optional_document<'a>(cmd: &'a Document, key: &str) -> DolomiteResult<Option<&'a Document>> {
    match cmd.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Document(doc)) => Ok(Some(doc)),
        Some(_) => Err(DolomiteError::new(
            &format!("'{}' must be a document", key),
            ErrorKind::Client,
        )),
    }
}

fn positive_size(value: Option<&Value>) -> Option<usize> {
    match value.and_then(Value::as_integer) {
        Some(size) if size > 0 => Some(size as usize),
        _ => None,
    }
}

fn write_error(index: usize, error: &DolomiteError) -> Value {
    Value::Document(doc! {
        "index": (index as i32),
        "code": (error.code()),
        "errmsg": (error.message())
    })
}

fn write_result(n: i32, write_errors: Vec<Value>) -> Document {
    let mut result = doc! { "ok": 1, "n": n };
    if !write_errors.is_empty() {
        result.put("writeErrors", Value::Array(write_errors));
    }
    result
}

fn cursor_result(id: u64, batch_key: &str, batch: Vec<Document>) -> Document {
    let batch = Value::Array(batch.into_iter().map(Value::Document).collect());
    let mut cursor = doc! { "id": (id as i64) };
    cursor.put(batch_key, batch);
    doc! { "ok": 1, "cursor": (Value::Document(cursor)) }
}
