use crate::errors::DolomiteResult;
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory key-value store backed by an ordered map.
///
/// Reads take a shared lock, writes an exclusive one. `scan_values` clones
/// the values under the read lock, which gives each scan a stable snapshot.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> DolomiteResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> DolomiteResult<()> {
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> DolomiteResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn scan_values(&self) -> DolomiteResult<Vec<Vec<u8>>> {
        Ok(self.entries.read().values().cloned().collect())
    }
}
