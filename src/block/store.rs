// The minimal byte-store collaborator the Block model needs to be testable.
// The real disk-backed store is out of scope; this in-memory implementation
// satisfies `insertBlock`/`getBlocksByType`-shaped needs for tests and
// examples (§10.4).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Storage collaborator for raw block bytes, keyed by content hash.
pub trait BlockStore: Send + Sync {
    fn get(&self, hash: &str) -> Option<Vec<u8>>;
    /// Stores `raw` under `hash`, recording the current time as its receipt
    /// timestamp.
    fn insert(&self, hash: &str, raw: &[u8], block_type: Option<&str>);
    fn remove(&self, hash: &str);
    fn list(&self) -> Vec<String>;
    fn list_by_type(&self, block_type: &str) -> Vec<String>;
    /// Receipt (not author-claimed) time, epoch seconds.
    fn received_at(&self, hash: &str) -> Option<i64>;
}

struct Entry {
    raw: Vec<u8>,
    block_type: Option<String>,
    received_at: i64,
}

#[derive(Default)]
pub struct MemoryBlockStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl BlockStore for MemoryBlockStore {
    fn get(&self, hash: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(hash).map(|e| e.raw.clone())
    }

    fn insert(&self, hash: &str, raw: &[u8], block_type: Option<&str>) {
        self.entries.lock().insert(
            hash.to_string(),
            Entry {
                raw: raw.to_vec(),
                block_type: block_type.map(str::to_string),
                received_at: now_epoch(),
            },
        );
    }

    fn remove(&self, hash: &str) {
        self.entries.lock().remove(hash);
    }

    fn list(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn list_by_type(&self, block_type: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, e)| e.block_type.as_deref() == Some(block_type))
            .map(|(h, _)| h.clone())
            .collect()
    }

    fn received_at(&self, hash: &str) -> Option<i64> {
        self.entries.lock().get(hash).map(|e| e.received_at)
    }
}
