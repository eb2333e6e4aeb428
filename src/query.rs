//! # Query Container
//!
//! Wraps a read operation in a [`RequestState`], optionally memoized through the
//! [`QueryCache`]. Every fetch follows the same protocol:
//!
//! 1. `is_loading = true` on the target state (the primary state, or one keyed entry)
//! 2. run the fetcher, through [`QueryCache::cache_promise`] for the cached variants
//!    (after clearing the key first when `fresh` is set)
//! 3. success: store `data`, run the success handler
//! 4. failure: store `error`, keep the previous `data`, run the error handler
//! 5. always: `is_loading = false`, `is_loaded = true`
//!
//! The keyed variants only touch the keyed entry; the primary state is left alone.
//!
//! ## Example
//!
//! ```rust
//! use store_query::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let todos = QueryStore::<Vec<String>>::new(QueryCache::new());
//! let data = todos
//!     .fetch_data(
//!         "todos",
//!         || async { Ok::<_, QueryError>(vec!["write docs".to_string()]) },
//!         CacheOptions::default(),
//!         Callbacks::new(),
//!     )
//!     .await;
//! assert_eq!(data.map(|d| d.len()), Some(1));
//! # });
//! ```

use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tracing::debug;

use crate::{
    cache::QueryCache,
    callbacks::{Callbacks, handle_error, handle_success},
    errors::QueryError,
    platform::DEFAULT_CACHE_TTL,
    state::{KeyedStates, RequestState},
    store::{Store, Subscription},
};

/// How a cached fetch treats the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Lifetime of the cached result
    pub ttl: Duration,
    /// Clear the cache key before fetching, forcing the fetcher to run
    pub fresh: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            fresh: false,
        }
    }
}

impl CacheOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn fresh(mut self) -> Self {
        self.fresh = true;
        self
    }
}

/// Primary request state plus one sub-state per query key
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub request: RequestState<T>,
    pub data_by_keys: KeyedStates<RequestState<T>>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            request: RequestState::default(),
            data_by_keys: KeyedStates::default(),
        }
    }
}

/// Read-operation container. Clones share state, cache and handlers.
#[derive(Clone)]
pub struct QueryStore<T> {
    store: Store<QueryState<T>>,
    cache: QueryCache,
    callbacks: Callbacks<T>,
}

impl<T: Clone + Send + Sync + 'static> QueryStore<T> {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            store: Store::default(),
            cache,
            callbacks: Callbacks::default(),
        }
    }

    /// Container-level handlers, used when a call brings none of its own
    pub fn with_callbacks(mut self, callbacks: Callbacks<T>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn state(&self) -> QueryState<T> {
        self.store.get()
    }

    pub fn store(&self) -> &Store<QueryState<T>> {
        &self.store
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&QueryState<T>, &QueryState<T>) + Send + Sync + 'static,
    ) -> Subscription<QueryState<T>> {
        self.store.subscribe(listener)
    }

    /// The sub-state tracked for `key`, if that key was ever used
    pub fn get_data_by_key(&self, key: &str) -> Option<RequestState<T>> {
        self.store.read(|s| s.data_by_keys.get(key).cloned())
    }

    pub fn set_data(&self, data: Option<T>, key: Option<&str>) {
        self.update(key, |s| s.data = data);
    }

    pub fn set_loading(&self, is_loading: bool, key: Option<&str>) {
        self.update(key, |s| s.is_loading = is_loading);
    }

    pub fn set_loaded(&self, is_loaded: bool, key: Option<&str>) {
        self.update(key, |s| s.is_loaded = is_loaded);
    }

    /// Drop the primary data and mark the query as settled
    pub fn set_data_empty(&self) {
        self.store.set(|s| {
            s.request.data = None;
            s.request.is_loaded = true;
            s.request.is_loading = false;
        });
    }

    /// Cached fetch into the primary state
    pub async fn fetch_data<F, Fut, E>(
        &self,
        query_key: &str,
        fetcher: F,
        options: CacheOptions,
        callbacks: Callbacks<T>,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<QueryError>,
    {
        self.execute(None, &callbacks, || self.cached(query_key, fetcher, options))
            .await
    }

    /// Cached fetch into the sub-state for `query_key`
    pub async fn fetch_data_by_key<F, Fut, E>(
        &self,
        query_key: &str,
        fetcher: F,
        options: CacheOptions,
        callbacks: Callbacks<T>,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<QueryError>,
    {
        self.execute(Some(query_key), &callbacks, || {
            self.cached(query_key, fetcher, options)
        })
        .await
    }

    /// Uncached fetch into the primary state
    pub async fn fetch_data_no_cache<F, Fut, E>(
        &self,
        fetcher: F,
        callbacks: Callbacks<T>,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<QueryError>,
    {
        self.execute(None, &callbacks, fetcher).await
    }

    /// Uncached fetch into the sub-state for `key`
    pub async fn fetch_data_no_cache_by_key<F, Fut, E>(
        &self,
        key: &str,
        fetcher: F,
        callbacks: Callbacks<T>,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<QueryError>,
    {
        self.execute(Some(key), &callbacks, fetcher).await
    }

    async fn cached<F, Fut, E>(
        &self,
        query_key: &str,
        fetcher: F,
        options: CacheOptions,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if options.fresh {
            self.cache.clear(query_key);
        }
        self.cache
            .cache_promise(query_key, fetcher, Some(options.ttl))
            .await
    }

    async fn execute<F, Fut, E>(
        &self,
        key: Option<&str>,
        callbacks: &Callbacks<T>,
        run: F,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<QueryError>,
    {
        debug!("🔄 [QUERY] Fetching {}", key.unwrap_or("<primary>"));
        self.update(key, RequestState::begin);

        let outcome: Result<T, QueryError> = run().await.map_err(Into::into);
        let response = match outcome {
            Ok(data) => {
                self.update(key, |s| s.succeed(data.clone()));
                handle_success(&[callbacks, &self.callbacks], &data);
                Some(data)
            }
            Err(err) => {
                debug!("❌ [QUERY] Fetch failed for {}: {}", key.unwrap_or("<primary>"), err);
                self.update(key, |s| s.fail(err.clone()));
                handle_error(&[callbacks, &self.callbacks], &err, "QUERY");
                None
            }
        };

        self.update(key, RequestState::settle);
        response
    }

    fn update(&self, key: Option<&str>, f: impl FnOnce(&mut RequestState<T>)) {
        self.store.set(|s| match key {
            Some(key) => s.data_by_keys.update(key, f),
            None => f(&mut s.request),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualClock;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    fn query_at(start: u64) -> (QueryStore<u32>, ManualClock) {
        let clock = ManualClock::new(start);
        (QueryStore::new(QueryCache::with_clock(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_fetch_data_success() {
        let (query, _) = query_at(0);
        let result = query
            .fetch_data(
                "answer",
                || async { Ok::<_, QueryError>(42) },
                CacheOptions::default(),
                Callbacks::new(),
            )
            .await;

        assert_eq!(result, Some(42));
        let state = query.state().request;
        assert_eq!(state.data, Some(42));
        assert!(state.is_success && !state.is_error);
        assert!(!state.is_loading && state.is_loaded);
        assert_eq!(query.cache().get::<u32>("answer"), Some(42));
    }

    #[tokio::test]
    async fn test_cached_fetch_skips_fetcher_until_fresh() {
        let (query, _) = query_at(0);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetcher =
            move || async move { Ok::<_, QueryError>(calls.fetch_add(1, Ordering::SeqCst) as u32) };

        query.fetch_data("n", fetcher, CacheOptions::default(), Callbacks::new()).await;
        query.fetch_data("n", fetcher, CacheOptions::default(), Callbacks::new()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let fresh = query
            .fetch_data("n", fetcher, CacheOptions::default().fresh(), Callbacks::new())
            .await;
        assert_eq!(fresh, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_data_and_uses_handler_order() {
        let (query, _) = query_at(0);
        let hook_errors = Arc::new(Mutex::new(0));
        let hook_errors_clone = hook_errors.clone();
        let query = query.with_callbacks(
            Callbacks::new().on_error(move |_| *hook_errors_clone.lock().unwrap() += 1),
        );

        query
            .fetch_data_no_cache(|| async { Ok::<_, QueryError>(1) }, Callbacks::new())
            .await;

        let per_call_errors = Arc::new(Mutex::new(Vec::new()));
        let per_call_clone = per_call_errors.clone();
        let result = query
            .fetch_data_no_cache(
                || async { Err::<u32, _>("boom") },
                Callbacks::new().on_error(move |e| per_call_clone.lock().unwrap().push(e.clone())),
            )
            .await;
        assert_eq!(result, None);
        assert_eq!(*per_call_errors.lock().unwrap(), vec![QueryError::Generic("boom".into())]);
        assert_eq!(*hook_errors.lock().unwrap(), 0);

        query
            .fetch_data_no_cache(|| async { Err::<u32, _>("again") }, Callbacks::new())
            .await;
        assert_eq!(*hook_errors.lock().unwrap(), 1);

        let state = query.state().request;
        assert_eq!(state.data, Some(1));
        assert!(state.is_error && !state.is_success);
        assert!(!state.is_loading && state.is_loaded);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (query, _) = query_at(0);
        query
            .fetch_data(
                "k",
                || async { Err::<u32, _>(QueryError::Network("down".into())) },
                CacheOptions::default(),
                Callbacks::new(),
            )
            .await;
        assert_eq!(query.cache().get::<u32>("k"), None);

        let retried = query
            .fetch_data(
                "k",
                || async { Ok::<_, QueryError>(5) },
                CacheOptions::default(),
                Callbacks::new(),
            )
            .await;
        assert_eq!(retried, Some(5));
    }

    #[tokio::test]
    async fn test_keyed_fetch_leaves_primary_state_alone() {
        let (query, _) = query_at(0);
        query
            .fetch_data_by_key(
                "row-7",
                || async { Ok::<_, QueryError>(7) },
                CacheOptions::default(),
                Callbacks::new(),
            )
            .await;
        query
            .fetch_data_no_cache_by_key(
                "row-8",
                || async { Err::<u32, _>("nope") },
                Callbacks::new(),
            )
            .await;

        assert!(query.state().request.is_idle());

        let row7 = query.get_data_by_key("row-7").unwrap();
        assert_eq!(row7.data, Some(7));
        assert!(row7.is_loaded && !row7.is_loading);

        let row8 = query.get_data_by_key("row-8").unwrap();
        assert!(row8.is_error);
        assert!(query.get_data_by_key("row-9").is_none());
    }

    #[tokio::test]
    async fn test_cache_expiry_refetches() {
        let (query, clock) = query_at(0);
        let options = CacheOptions::default().with_ttl(Duration::from_millis(100));
        query.fetch_data("k", || async { Ok::<_, QueryError>(1) }, options, Callbacks::new()).await;

        clock.advance(Duration::from_millis(100));
        let refreshed = query
            .fetch_data("k", || async { Ok::<_, QueryError>(2) }, options, Callbacks::new())
            .await;
        assert_eq!(refreshed, Some(2));
    }

    #[test]
    fn test_set_data_empty() {
        let (query, _) = query_at(0);
        query.set_data(Some(3), None);
        query.set_loading(true, None);
        query.set_data(Some(4), Some("row"));

        query.set_data_empty();
        let state = query.state();
        assert_eq!(state.request.data, None);
        assert!(state.request.is_loaded && !state.request.is_loading);
        assert_eq!(state.data_by_keys.get("row").and_then(|s| s.data), Some(4));
    }

    #[test]
    fn test_cache_options_deserialize_with_defaults() {
        let options: CacheOptions = serde_json::from_str(r#"{"fresh": true}"#).unwrap();
        assert!(options.fresh);
        assert_eq!(options.ttl, DEFAULT_CACHE_TTL);
    }
}
