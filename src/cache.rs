//! # Expiring Query Cache
//!
//! A type-erased key/value cache where every entry carries an absolute expiry instant
//! (epoch milliseconds):
//! - **Lazy expiry**: reads at or past `expires_at` are misses. Nothing is swept; a stale
//!   entry stays in memory until it is overwritten or cleared.
//! - **Unbounded**: no eviction besides explicit [`QueryCache::clear`].
//! - **Promise memoization**: [`QueryCache::cache_promise`] only runs its producer on a miss
//!   and never caches a failure.
//!
//! Two concurrent misses for the same key both run their producer; the last write wins.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use store_query::cache::QueryCache;
//!
//! let cache = QueryCache::new();
//! cache.set("my_key", 42, Duration::from_secs(60));
//! let value: Option<i32> = cache.get("my_key");
//! assert_eq!(value, Some(42));
//! ```

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::debug;

use crate::platform::{Clock, DEFAULT_CACHE_TTL, SystemClock, duration_millis};

/// A type-erased cache entry holding a value and the instant it stops being served
#[derive(Clone)]
pub struct CacheEntry {
    data: Arc<dyn Any + Send + Sync>,
    expires_at: u64,
}

impl CacheEntry {
    /// Creates a new cache entry that expires at `expires_at` (epoch milliseconds).
    pub fn new<T: Clone + Send + Sync + 'static>(data: T, expires_at: u64) -> Self {
        Self {
            data: Arc::new(data),
            expires_at,
        }
    }

    /// Retrieves the cached data of type `T`, or `None` if the stored value has another type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.data.downcast_ref::<T>().cloned()
    }

    /// The epoch-millisecond instant from which this entry is a miss.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// An entry is live strictly before its expiry instant.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Process-wide (or test-local) cache shared by every container that uses the same key
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("size", &self.size())
            .field("clock", &self.clock)
            .finish()
    }
}

impl QueryCache {
    /// Creates an empty cache driven by the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache driven by the given clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(clock),
        }
    }

    /// Current time according to this cache's clock.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Stores `value` under `key` until `now + ttl`, replacing any prior entry.
    pub fn set<T: Clone + Send + Sync + 'static>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Duration,
    ) {
        let key = key.into();
        let expires_at = self.now_millis().saturating_add(duration_millis(ttl));
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), CacheEntry::new(value, expires_at));
            debug!(
                "📊 [CACHE-STORE] Stored data for key: {} (expires at {})",
                key, expires_at
            );
        }
    }

    /// Retrieves a live value by key.
    ///
    /// Returns `None` when the key is absent, when `now >= expires_at`, or when the stored
    /// value is not a `T`. Expired entries are left in place.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let now = self.now_millis();
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            debug!("⌛ [CACHE-EXPIRED] Entry for key {} expired", key);
            return None;
        }
        entry.get::<T>()
    }

    /// Returns true if a live entry exists for `key`, regardless of its type.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.now_millis();
        self.entries
            .lock()
            .map(|entries| entries.get(key).is_some_and(|entry| !entry.is_expired(now)))
            .unwrap_or(false)
    }

    /// The expiry instant of the entry stored under `key`, live or not.
    pub fn expires_at(&self, key: &str) -> Option<u64> {
        self.entries
            .lock()
            .ok()?
            .get(key)
            .map(CacheEntry::expires_at)
    }

    /// Removes the entry for `key`. A no-op when absent.
    ///
    /// Returns true if an entry was removed.
    pub fn clear(&self, key: &str) -> bool {
        let removed = self
            .entries
            .lock()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false);
        if removed {
            debug!("🗑️ [CACHE-CLEAR] Cleared cache entry for key: {}", key);
        }
        removed
    }

    /// Clears all cached results.
    pub fn clear_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            let count = entries.len();
            entries.clear();
            debug!("🗑️ [CACHE-CLEAR] Cleared {} cache entries", count);
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn size(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Runs `producer` only when `key` has no live entry, caching its success for `ttl`
    /// (60 seconds when `None`).
    ///
    /// A cache hit returns the stored value without invoking the producer. A producer
    /// error is returned as-is and nothing is written.
    pub async fn cache_promise<T, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key) {
            debug!("🎯 [CACHE-HIT] Serving cached data for key: {}", key);
            return Ok(cached);
        }

        debug!("🔄 [CACHE-MISS] Running producer for key: {}", key);
        let data = producer().await?;
        self.set(key, data.clone(), ttl.unwrap_or(DEFAULT_CACHE_TTL));
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_at(start: u64) -> (QueryCache, ManualClock) {
        let clock = ManualClock::new(start);
        (QueryCache::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_get_after_set_until_expiry() {
        let (cache, clock) = cache_at(1_000);
        cache.set("todos", vec![1, 2, 3], Duration::from_millis(500));

        assert_eq!(cache.get::<Vec<i32>>("todos"), Some(vec![1, 2, 3]));
        assert_eq!(cache.expires_at("todos"), Some(1_500));

        clock.set(1_499);
        assert!(cache.get::<Vec<i32>>("todos").is_some());

        clock.set(1_500);
        assert_eq!(cache.get::<Vec<i32>>("todos"), None);
        assert!(!cache.contains("todos"));
    }

    #[test]
    fn test_expired_entries_are_not_swept() {
        let (cache, clock) = cache_at(0);
        cache.set("user", "ada".to_string(), Duration::from_millis(10));
        clock.advance(Duration::from_secs(1));

        assert_eq!(cache.get::<String>("user"), None);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_set_overwrites_and_refreshes_expiry() {
        let (cache, clock) = cache_at(0);
        cache.set("key", 1u32, Duration::from_millis(10));
        clock.advance(Duration::from_millis(20));
        cache.set("key", 2u32, Duration::from_millis(10));

        assert_eq!(cache.get::<u32>("key"), Some(2));
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let cache = QueryCache::new();
        cache.set("key", 7u8, Duration::from_secs(5));
        assert_eq!(cache.get::<String>("key"), None);
        assert!(cache.contains("key"));
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::new();
        cache.set("a", 1, Duration::from_secs(5));
        cache.set("b", 2, Duration::from_secs(5));

        assert!(cache.clear("a"));
        assert!(!cache.clear("a"));
        assert!(!cache.clear("missing"));
        assert_eq!(cache.get::<i32>("a"), None);
        assert_eq!(cache.get::<i32>("b"), Some(2));

        cache.clear_all();
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_cache_promise_skips_producer_on_hit() {
        let (cache, _clock) = cache_at(0);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value: Result<u32, String> = cache
                .cache_promise(
                    "count",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(99)
                    },
                    Some(Duration::from_secs(1)),
                )
                .await;
            assert_eq!(value, Ok(99));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_promise_reruns_after_expiry() {
        let (cache, clock) = cache_at(0);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let produce = move || async move {
            Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) + 1)
        };

        assert_eq!(cache.cache_promise("n", produce, None).await, Ok(1));
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.cache_promise("n", produce, None).await, Ok(1));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.cache_promise("n", produce, None).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_promise_does_not_cache_failures() {
        let cache = QueryCache::new();

        let failed: Result<u32, String> = cache
            .cache_promise("flaky", || async { Err("offline".to_string()) }, None)
            .await;
        assert_eq!(failed, Err("offline".to_string()));
        assert_eq!(cache.size(), 0);

        let recovered: Result<u32, String> = cache
            .cache_promise("flaky", || async { Ok(5) }, None)
            .await;
        assert_eq!(recovered, Ok(5));
    }
}
