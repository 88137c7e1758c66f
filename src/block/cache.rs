// Process-wide block cache: an insertion-ordered FIFO of hash -> raw bytes,
// evicted strictly by insertion order once the total cached size exceeds the
// configured budget. Modeled as a `Mutex`-guarded service object per the
// reference's process-global-singleton discussion.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

struct Inner {
    order: VecDeque<String>,
    bytes: HashMap<String, Vec<u8>>,
    total_bytes: usize,
}

/// FIFO byte cache bounded by `total_budget` bytes; individual entries larger
/// than `per_block_limit` are never cached at all.
pub struct BlockCache {
    inner: Mutex<Inner>,
    per_block_limit: usize,
    total_budget: usize,
}

impl BlockCache {
    pub fn new(per_block_limit: usize, total_budget: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::new(),
                bytes: HashMap::new(),
                total_bytes: 0,
            }),
            per_block_limit,
            total_budget,
        }
    }

    /// Inserts `raw` under `hash` if it's small enough to be cacheable,
    /// evicting the oldest entries until the total fits the budget.
    pub fn insert(&self, hash: &str, raw: &[u8]) {
        if raw.len() > self.per_block_limit {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.bytes.contains_key(hash) {
            return;
        }
        inner.order.push_back(hash.to_string());
        inner.total_bytes += raw.len();
        inner.bytes.insert(hash.to_string(), raw.to_vec());

        while inner.total_bytes > self.total_budget {
            match inner.order.pop_front() {
                Some(oldest) => {
                    if let Some(evicted) = inner.bytes.remove(&oldest) {
                        inner.total_bytes -= evicted.len();
                    }
                }
                None => break,
            }
        }
    }

    pub fn get(&self, hash: &str) -> Option<Vec<u8>> {
        self.inner.lock().bytes.get(hash).cloned()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.inner.lock().bytes.contains_key(hash)
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first_once_over_budget() {
        let cache = BlockCache::new(100, 100);
        cache.insert("a", &[0u8; 40]);
        cache.insert("b", &[0u8; 40]);
        cache.insert("c", &[0u8; 40]);

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.total_bytes() <= 100);
    }

    #[test]
    fn entries_over_per_block_limit_are_never_cached() {
        let cache = BlockCache::new(10, 1000);
        cache.insert("big", &[0u8; 20]);
        assert!(!cache.contains("big"));
    }
}
