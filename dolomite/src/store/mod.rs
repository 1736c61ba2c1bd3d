//! The storage seam: an ordered byte-keyed backing store and a document
//! codec, both injectable. The engine only ever talks to these traits.

mod codec;
mod memory;

pub use codec::BincodeCodec;
pub use memory::MemoryStore;

use crate::common::document::Document;
use crate::common::Value;
use crate::errors::DolomiteResult;

/// An ordered key-value backing store.
///
/// Implementations must be `Send + Sync`; the engine shares one store across
/// every collection cursor. `scan_values` takes a snapshot of the values as
/// of the call, so a scan never observes writes that land after it starts.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> DolomiteResult<Option<Vec<u8>>>;

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> DolomiteResult<()>;

    fn delete(&self, key: &[u8]) -> DolomiteResult<()>;

    /// Returns all stored values in key order, snapshotted at call time.
    fn scan_values(&self) -> DolomiteResult<Vec<Vec<u8>>>;
}

/// Translates documents and identifiers to and from stored bytes.
pub trait DocumentCodec: Send + Sync {
    fn serialize(&self, doc: &Document) -> DolomiteResult<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> DolomiteResult<Document>;

    /// Encodes an identifier for use as a store key.
    fn serialize_id(&self, id: &Value) -> DolomiteResult<Vec<u8>>;
}
