use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::dump::StorageSlot;

/// Last successfully parsed dump of one score.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub score_key: String,
    pub slots: Vec<StorageSlot>,
    pub last_updated: DateTime<Utc>,
}

impl CacheEntry {
    /// Time elapsed since the entry was stored, never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_updated).max(Duration::zero())
    }
}

type SharedEntries = Arc<Mutex<HashMap<String, CacheEntry>>>;

// Entries live as long as the process. Clones share the same map, keys are
// disjoint per score so a single lock is enough.
#[derive(Clone, Default)]
pub struct MemoryCache {
    data: SharedEntries,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Cached slots for `score_key`, empty if it was never fetched.
    pub fn get(&self, score_key: &str) -> Vec<StorageSlot> {
        self.lock()
            .get(score_key)
            .map(|entry| entry.slots.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, score_key: &str) -> Option<CacheEntry> {
        self.lock().get(score_key).cloned()
    }

    pub fn put(&self, score_key: &str, slots: Vec<StorageSlot>) {
        let entry = CacheEntry {
            score_key: score_key.to_string(),
            slots,
            last_updated: Utc::now(),
        };
        self.lock().insert(score_key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-written entry, so a
    // poisoned map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
