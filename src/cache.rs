//! Short-lived read caches.
//!
//! This module provides a TTL cache for expensive read queries (the random
//! gallery sample and the first listing page). Entries are immutable
//! snapshots behind `Arc`, so mutating the underlying records can never
//! change a cached read.
//!
//! # Lifetime Clamping
//!
//! Snapshots may contain signed links. A snapshot must never outlive the
//! links inside it, so the effective TTL is clamped below the signed-link
//! lifetime with [`effective_ttl`].
//!
//! # Invalidation
//!
//! [`TtlCache::invalidate`] drops every entry and bumps a generation
//! counter. A computation that started before the invalidation finishes
//! normally for its own caller but its result is not stored.

use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default maximum number of entries per cache
const DEFAULT_MAX_ENTRIES: usize = 64;

/// Margin subtracted from long signed-link lifetimes.
pub const LONG_LINK_MARGIN_SECS: i64 = 15;

/// Margin subtracted from short signed-link lifetimes.
pub const SHORT_LINK_MARGIN_SECS: i64 = 5;

/// Signed-link lifetimes above this use the long margin.
const LONG_LINK_THRESHOLD_SECS: i64 = 30;

/// Effective cache lifetime for snapshots that may contain signed links.
///
/// Returns `None` (caching disabled) when `configured_secs <= 0`. With a
/// signed-link lifetime, the result is
/// `min(configured, max(presigned - margin, 1))` where the margin is 15s for
/// lifetimes above 30s and 5s otherwise.
///
/// ```
/// use std::time::Duration;
/// use tribute_media::cache::effective_ttl;
///
/// assert_eq!(effective_ttl(200, Some(90)), Some(Duration::from_secs(75)));
/// assert_eq!(effective_ttl(200, Some(20)), Some(Duration::from_secs(15)));
/// assert_eq!(effective_ttl(0, Some(90)), None);
/// ```
pub fn effective_ttl(configured_secs: i64, presigned_secs: Option<i64>) -> Option<Duration> {
    if configured_secs <= 0 {
        return None;
    }

    let ttl = match presigned_secs {
        Some(presigned) => {
            let margin = if presigned > LONG_LINK_THRESHOLD_SECS {
                LONG_LINK_MARGIN_SECS
            } else {
                SHORT_LINK_MARGIN_SECS
            };
            configured_secs.min((presigned - margin).max(1))
        }
        None => configured_secs,
    };

    u64::try_from(ttl)
        .ok()
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs)
}

// =============================================================================
// TTL Cache
// =============================================================================

struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

struct CacheState<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    generation: u64,
}

/// LRU-bounded cache whose entries expire after a fixed lifetime.
///
/// A cache built with a `None` TTL stores nothing and always recomputes.
///
/// # Thread Safety
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tribute_media::cache::TtlCache;
///
/// #[tokio::main]
/// async fn main() {
///     let cache: TtlCache<u32, String> = TtlCache::new(Some(Duration::from_secs(30)));
///
///     let value = cache
///         .get_or_try_insert_with(1, || async { Ok::<_, ()>("computed".to_string()) })
///         .await
///         .unwrap();
///     assert_eq!(value.as_str(), "computed");
///     assert!(cache.get(&1).await.is_some());
///
///     cache.invalidate().await;
///     assert!(cache.get(&1).await.is_none());
/// }
/// ```
pub struct TtlCache<K: Hash + Eq, V> {
    state: RwLock<CacheState<K, V>>,
    ttl: Option<Duration>,
}

impl<K: Hash + Eq + Clone, V> TtlCache<K, V> {
    /// Create a cache with the given entry lifetime.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_max_entries(ttl, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with the given entry lifetime and entry bound.
    pub fn with_max_entries(ttl: Option<Duration>, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: RwLock::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
            ttl: ttl.filter(|t| !t.is_zero()),
        }
    }

    /// Entry lifetime, `None` when caching is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some()
    }

    /// Get a live entry. Expired entries are removed.
    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut state = self.state.write().await;
        let expired = match state.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(Arc::clone(&entry.value))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.pop(key);
        }
        None
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// The lock is not held while `compute` runs. If the cache is invalidated
    /// in the meantime, the computed value is returned but not stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(ttl) = self.ttl else {
            return compute().await.map(Arc::new);
        };

        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let generation = self.state.read().await.generation;
        let value = Arc::new(compute().await?);

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.entries.put(
                key,
                CacheEntry {
                    value: Arc::clone(&value),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
        Ok(value)
    }

    /// Drop every entry.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    /// Number of stored entries, including ones that have expired but not
    /// yet been looked up.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
