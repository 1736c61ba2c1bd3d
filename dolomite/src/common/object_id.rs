use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};

// Per-process random component, fixed for the process lifetime so that ids
// generated by one engine share a common prefix after the timestamp.
static PROCESS_RANDOM: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut bytes = [0u8; 5];
    OsRng.fill(&mut bytes);
    bytes
});

static COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(OsRng.gen::<u32>() & 0x00FF_FFFF));

/// A 12-byte unique document identifier.
///
/// Layout: 4 bytes of seconds since the epoch (big-endian), 5 random bytes
/// fixed per process, and a 3-byte monotonically increasing counter seeded
/// randomly. Ids generated in one process therefore sort roughly by creation
/// time, which is also what the comparator's ObjectId category relies on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a fresh identifier from the current time.
    pub fn new() -> Self {
        let seconds = chrono::Utc::now().timestamp().max(0) as u32;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_RANDOM);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId(bytes)
    }

    /// Wraps raw bytes as an identifier.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    /// Parses a 24-character lowercase hex representation.
    pub fn parse_str(hex: &str) -> DolomiteResult<Self> {
        if hex.len() != 24 {
            log::error!("Invalid ObjectId hex length: {}", hex.len());
            return Err(DolomiteError::new(
                "ObjectId hex string must be 24 characters",
                ErrorKind::Client,
            ));
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            let pair = &hex[i * 2..i * 2 + 2];
            *chunk = u8::from_str_radix(pair, 16)?;
        }
        Ok(ObjectId(bytes))
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// The embedded creation time, as seconds since the epoch.
    pub fn timestamp(&self) -> i64 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]) as i64
    }

    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(24);
        for byte in &self.0 {
            hex.push_str(&format!("{:02x}", byte));
        }
        hex
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_unique_ids() {
        let mut ids = Vec::new();
        for _ in 0..100 {
            ids.push(ObjectId::new());
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }

    #[test]
    fn hex_round_trip() {
        let id = ObjectId::new();
        let parsed = ObjectId::parse_str(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(ObjectId::parse_str("abc").is_err());
        assert!(ObjectId::parse_str("zz0102030405060708090a0b").is_err());
    }

    #[test]
    fn timestamp_is_recent() {
        let id = ObjectId::new();
        let now = chrono::Utc::now().timestamp();
        assert!((now - id.timestamp()).abs() < 5);
    }

    #[test]
    fn ids_sort_by_creation_order() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert!(a < b);
    }
}
