//! Request-scoped memoization.
//!
//! [`RequestCache`] backs the merge orchestrator's diff cache. It lives
//! inside one [`RequestScope`](crate::app::RequestScope) and is cleared when
//! that scope ends, so it can never serve a result computed in an earlier
//! request. Entries additionally expire after their TTL.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Namespaced key-value cache with per-entry time-to-live.
pub trait Cache<V>: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, namespace: &str, key: &str) -> Option<V>;

    /// Store an entry that expires after `ttl`.
    fn set(&self, namespace: &str, key: &str, value: V, ttl: Duration);

    /// Remove an entry. Returns `true` if a live entry was removed.
    fn delete(&self, namespace: &str, key: &str) -> bool;
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory [`Cache`] owned by a single request.
pub struct RequestCache<V> {
    entries: Mutex<HashMap<(String, String), Entry<V>>>,
}

impl<V> Default for RequestCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> RequestCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Called when the owning request ends.
    pub fn clear(&self) {
        let mut entries = self.lock();
        debug!(count = entries.len(), "tearing down request cache");
        entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Entry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("request cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl<V: Clone + Send> Cache<V> for RequestCache<V> {
    fn get(&self, namespace: &str, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let cache_key = (namespace.to_string(), key.to_string());
        match entries.get(&cache_key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                trace!(namespace, key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                trace!(namespace, key, "cache entry expired");
                entries.remove(&cache_key);
                None
            }
            None => None,
        }
    }

    fn set(&self, namespace: &str, key: &str, value: V, ttl: Duration) {
        trace!(namespace, key, ttl_ms = ttl.as_millis() as u64, "cache set");
        self.lock().insert(
            (namespace.to_string(), key.to_string()),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete(&self, namespace: &str, key: &str) -> bool {
        self.lock()
            .remove(&(namespace.to_string(), key.to_string()))
            .map(|entry| entry.expires_at > Instant::now())
            .unwrap_or(false)
    }
}
