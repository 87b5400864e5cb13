//! Caching layer — an expiring key-value store for upstream payloads.
//!
//! The gateway talks to the store through the [`Cache`] trait so the backing
//! implementation can be swapped. [`MemoryCache`] is the in-process store the
//! binary uses: it lives as long as the process and is dropped on shutdown.
//!
//! Values are opaque [`Bytes`]. An entry is inserted as one whole value and
//! replaced wholesale on the next write, so a reader sees either the old
//! payload or the new one, never a mix.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

/// Cache key under which the asset list is stored. Nothing else uses it.
pub const ASSETS_CACHE_KEY: &str = "crypto_assets";

/// How long a successful asset list stays fresh.
pub const ASSETS_TTL: Duration = Duration::from_secs(60);

/// A key-value store whose entries expire.
pub trait Cache: Send + Sync {
    /// Returns the value for `key` if it exists and has not expired.
    fn get(&self, key: &str) -> impl Future<Output = Option<Bytes>> + Send;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    fn put(&self, key: &str, value: Bytes, ttl: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory [`Cache`] backed by a `HashMap` behind an async `RwLock`.
///
/// Expiry is measured on the tokio clock, so tests can drive it with
/// `tokio::time::advance`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bytes::Bytes;
/// use coingate::cache::{Cache, MemoryCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = MemoryCache::new();
/// cache.put("k", Bytes::from_static(b"[]"), Duration::from_secs(60)).await;
/// assert_eq!(cache.get("k").await.as_deref(), Some(&b"[]"[..]));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_fresh(Instant::now()) {
            Some(entry.value.clone())
        } else {
            trace!(key, "cache entry expired");
            None
        }
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_fresh(now));
        entries.insert(
            key.to_owned(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}
