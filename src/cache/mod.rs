//! Response cache used as a fallback tier.
//!
//! # Data Flow
//! ```text
//! Tier success     → set(fingerprint, text, ttl)
//! All tiers failed → get(fingerprint) → hit: serve cached text
//!                                     → miss: degraded message
//! ```
//!
//! # Design Decisions
//! - Only the get/set contract lives here; storage is the collaborator's job
//! - No transactional guarantees between get and set; a stale read is
//!   acceptable degraded behaviour
//! - Errors are reported, and the fallback chain treats them as a miss

pub mod memory;

use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;

pub use memory::InMemoryCache;

/// Errors surfaced by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation failed: {0}")]
    Backend(String),
}

/// TTL-keyed byte cache.
pub trait ResponseCache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), CacheError>>;
}
