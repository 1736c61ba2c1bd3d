use crate::common::document::Document;
use crate::common::{compare, projection, SortSpec};
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};
use crate::filter::is_match;
use crate::store::{DocumentCodec, KeyValueStore};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// What a `find` command asked for, carried by the cursor for the lifetime
/// of its scan.
pub(crate) struct FindOptions {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<SortSpec>,
    pub skip: i64,
    pub limit: Option<usize>,
    pub batch_size: Option<usize>,
    pub single_batch: bool,
}

/// A registered server-side cursor over one backing-store scan.
///
/// The cursor runs at most one scan. The first batch request performs it;
/// concurrent requests block on the same in-flight scan instead of starting
/// another. A sort forces the whole result set into the buffer before the
/// first document is yielded, which the one-shot scan does anyway.
pub(crate) struct Cursor {
    id: u64,
    store: Arc<dyn KeyValueStore>,
    codec: Arc<dyn DocumentCodec>,
    options: FindOptions,
    state: Mutex<CursorState>,
    scan_done: Condvar,
}

struct CursorState {
    documents: Vec<Document>,
    // Last returned buffer index; starts at skip - 1 so the first advance
    // lands past the skipped prefix.
    position: i64,
    fetching: bool,
    fetched: bool,
    deleted: bool,
    error: Option<DolomiteError>,
}

impl Cursor {
    pub(crate) fn new(
        id: u64,
        store: Arc<dyn KeyValueStore>,
        codec: Arc<dyn DocumentCodec>,
        options: FindOptions,
    ) -> Self {
        let position = options.skip - 1;
        Cursor {
            id,
            store,
            codec,
            options,
            state: Mutex::new(CursorState {
                documents: Vec::new(),
                position,
                fetching: false,
                fetched: false,
                deleted: false,
                error: None,
            }),
            scan_done: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn single_batch(&self) -> bool {
        self.options.single_batch
    }

    /// The batch size a `find` reply uses.
    pub(crate) fn first_batch_size(&self) -> usize {
        self.options
            .limit
            .or(self.options.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// The batch size a `getMore` reply uses; `None` means all remaining.
    pub(crate) fn next_batch_size(&self) -> Option<usize> {
        self.options.batch_size
    }

    /// Pulls the next batch in scan order, applying the stored projection.
    pub(crate) fn draw_batch(&self, size: Option<usize>) -> DolomiteResult<Vec<Document>> {
        self.fetch()?;
        let mut state = self.state.lock();
        if state.deleted {
            return Err(deleted_error());
        }
        let mut batch = Vec::new();
        loop {
            if let Some(size) = size {
                if batch.len() >= size {
                    break;
                }
            }
            let next = state.position + 1;
            let Some(doc) = usize::try_from(next).ok().and_then(|i| state.documents.get(i))
            else {
                break;
            };
            let doc = projection::project(doc, self.options.projection.as_ref())?;
            batch.push(doc);
            state.position = next;
        }
        Ok(batch)
    }

    /// Stops delivery and wakes every pending waiter.
    pub(crate) fn delete(&self) {
        let mut state = self.state.lock();
        state.deleted = true;
        self.scan_done.notify_all();
    }

    /// Runs or joins the single backing-store scan for this cursor.
    fn fetch(&self) -> DolomiteResult<()> {
        let mut state = self.state.lock();
        loop {
            if state.deleted {
                return Err(deleted_error());
            }
            if let Some(error) = &state.error {
                return Err(error.clone());
            }
            if state.fetched {
                return Ok(());
            }
            if !state.fetching {
                break;
            }
            self.scan_done.wait(&mut state);
        }
        state.fetching = true;
        drop(state);

        let result = self.scan();

        let mut state = self.state.lock();
        state.fetching = false;
        // A deletion raced the scan; the result is discarded either way.
        if !state.deleted {
            match result {
                Ok(documents) => {
                    state.documents = documents;
                    state.fetched = true;
                }
                Err(error) => {
                    log::error!("Cursor {} scan failed: {}", self.id, error);
                    state.error = Some(error);
                }
            }
        }
        self.scan_done.notify_all();
        if state.deleted {
            return Err(deleted_error());
        }
        if let Some(error) = &state.error {
            return Err(error.clone());
        }
        Ok(())
    }

    fn scan(&self) -> DolomiteResult<Vec<Document>> {
        let mut matches = Vec::new();
        for bytes in self.store.scan_values()? {
            let doc = self.codec.deserialize(&bytes)?;
            if is_match(&doc, &self.options.filter)? {
                matches.push(doc);
            }
        }
        if let Some(sort) = &self.options.sort {
            compare::sort_by(&mut matches, sort);
        }
        if let Some(limit) = self.options.limit {
            let cap = limit.saturating_add(self.options.skip.max(0) as usize);
            matches.truncate(cap);
        }
        Ok(matches)
    }
}

/// Default cap on a first batch when neither `limit` nor `batchSize` is set.
pub(crate) const DEFAULT_BATCH_SIZE: usize = 101;

fn deleted_error() -> DolomiteError {
    DolomiteError::new("cursor was deleted", ErrorKind::CursorNotFound)
}
