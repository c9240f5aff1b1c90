//! In-process response cache.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::time::Instant;

use crate::cache::{CacheError, ResponseCache};
use crate::observability::metrics;

/// Cap applied when `now + ttl` would overflow.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A thread-safe TTL cache for generated responses.
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<DashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.inner.len(), "Purged expired cache entries");
        }
        metrics::record_cache_size(self.inner.len());
        removed
    }

    fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let hit = self
            .inner
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if hit.is_none() {
            self.inner.remove_if(key, |_, entry| !entry.is_live(now));
        }
        hit
    }

    fn store(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now + MAX_TTL);
        self.inner.insert(key.to_string(), Entry { value, expires_at });
        metrics::record_cache_size(self.inner.len());
    }
}

impl ResponseCache for InMemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        future::ready(Ok(self.lookup(key))).boxed()
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        self.store(key, value, ttl);
        future::ready(Ok(())).boxed()
    }
}
