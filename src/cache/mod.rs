//! Response cache (cache-aside).
//!
//! # Data Flow
//! ```text
//! request → fingerprint.rs (normalized SHA-256 key)
//!     → ResponseCache::lookup
//!         hit  → value returned, breaker and retries skipped
//!         miss → protected call → ResponseCache::store (write-through)
//! ```
//!
//! # Design Decisions
//! - Backends are swappable behind `CacheBackend`; memory.rs is the default
//! - Expiry is lazy: an entry older than its TTL reads as a miss and is removed
//! - Backend failures and slow backends are logged and treated as a bypassed
//!   cache, never as a failed request
//! - Concurrent writers to one key race under last-write-wins

pub mod fingerprint;
pub mod memory;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;

pub use fingerprint::fingerprint;
pub use memory::MemoryCache;

/// A cached response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Value, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// An entry is dead once strictly more than `ttl` has elapsed.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Cache backend failure. Never leaves this module.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend did not answer within {0:?}")]
    Timeout(Duration),
}

/// Storage behind the response cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
    fn len(&self) -> usize;

    /// Drop expired entries. Backends with native expiry keep the default.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Hit/miss/error counters.
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub entries: usize,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache-aside front for a `CacheBackend`.
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    op_timeout: Duration,
    stats: CacheStats,
}

impl ResponseCache {
    /// Default bound on a single backend read or write.
    pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            op_timeout: Self::DEFAULT_OP_TIMEOUT,
            stats: CacheStats::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Return a live cached value, if any.
    pub async fn lookup(&self, key: &str) -> Option<Value> {
        match self.bounded(self.backend.get(key)).await {
            Ok(Some(entry)) if !entry.is_expired() => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("hit");
                tracing::debug!(key, "Cache hit");
                Some(entry.value)
            }
            Ok(Some(_)) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("expired");
                if let Err(e) = self.bounded(self.backend.remove(key)).await {
                    tracing::debug!(key, error = %e, "Failed to remove expired cache entry");
                }
                None
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("miss");
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("error");
                tracing::warn!(key, error = %e, "Cache read failed, bypassing cache");
                None
            }
        }
    }

    /// Store a value. A zero TTL disables caching for the call.
    pub async fn store(&self, key: String, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let entry = CacheEntry::new(key, value, ttl);
        let key = entry.key.clone();
        if let Err(e) = self.bounded(self.backend.put(entry)).await {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup("error");
            tracing::warn!(key = %key, error = %e, "Cache write failed, result not cached");
        }
    }

    /// Sweep expired entries out of the backend.
    pub fn purge_expired(&self) -> usize {
        self.backend.purge_expired()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            entries: self.backend.len(),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
    }
}
