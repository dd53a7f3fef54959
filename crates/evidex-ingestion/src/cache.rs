//! In-memory response cache shared by every source adapter.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedResponse {
    payload: serde_json::Value,
    fetched_at: Instant,
}

/// Successful decoded responses keyed by request identity.
///
/// Entries expire `ttl` after they were fetched; expiry is checked on read.
/// Failures are never stored.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, payload: serde_json::Value) {
        self.lock().insert(key, CachedResponse { payload, fetched_at: Instant::now() });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
