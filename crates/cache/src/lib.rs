use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use consulta_core::{CacheKey, DispatchOutcome};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: DispatchOutcome,
    stored_at: Instant,
}

/// Expiring map of dispatch outcomes.
///
/// Entries expire once `now - stored_at >= ttl` and are evicted lazily by the
/// read that finds them stale. There is no capacity bound and nothing is
/// persisted. Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
    ttl: Duration,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<DispatchOutcome> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let fresh = entries
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)?;

        if fresh {
            debug!(key = %key, "cache hit");
            return entries.get(key).map(|entry| entry.value.clone());
        }

        entries.remove(key);
        debug!(key = %key, "expired cache entry evicted");
        None
    }

    pub fn set(&self, key: CacheKey, value: DispatchOutcome) {
        debug!(key = %key, "cache entry stored");
        self.entries.lock().insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every entry and returns how many were held.
    pub fn clear(&self) -> usize {
        let drained = {
            let mut entries = self.entries.lock();
            let count = entries.len();
            entries.clear();
            count
        };
        debug!(drained, "cache cleared");
        drained
    }

    /// Entry count, stale entries included.
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0_usize;
        self.entries.lock().retain(|_, entry| {
            let keep = now.saturating_duration_since(entry.stored_at) < self.ttl;
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }
}
