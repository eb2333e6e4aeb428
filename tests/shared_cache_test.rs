// Test different containers sharing one cache, the way an app wires them up

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use store_query::prelude::*;

// Example: API client that counts its round trips
#[derive(Clone, Default)]
struct ApiClient {
    requests: Arc<AtomicUsize>,
}

impl ApiClient {
    async fn fetch_user(&self, id: u32) -> Result<String, QueryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if id == 0 {
            return Err(QueryError::NotFound(format!("user {}", id)));
        }
        Ok(format!("User {}", id))
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_queries_share_cached_results() {
    let cache = QueryCache::new();
    let client = ApiClient::default();

    let profile = QueryStore::<String>::new(cache.clone());
    let header = QueryStore::<String>::new(cache.clone());

    let api = client.clone();
    profile
        .fetch_data(
            "user:1",
            move || async move { api.fetch_user(1).await },
            CacheOptions::default(),
            Callbacks::new(),
        )
        .await;
    let api = client.clone();
    header
        .fetch_data(
            "user:1",
            move || async move { api.fetch_user(1).await },
            CacheOptions::default(),
            Callbacks::new(),
        )
        .await;

    assert_eq!(client.request_count(), 1);
    assert_eq!(header.state().request.data.as_deref(), Some("User 1"));
    assert_eq!(cache.size(), 1);
}

#[tokio::test]
async fn test_cache_expiry_with_manual_clock() {
    let clock = ManualClock::new(1_000);
    let cache = QueryCache::with_clock(clock.clone());
    let client = ApiClient::default();
    let ttl = Some(Duration::from_secs(10));

    for _ in 0..3 {
        let api = client.clone();
        let user = cache
            .cache_promise("user:2", move || async move { api.fetch_user(2).await }, ttl)
            .await;
        assert_eq!(user, Ok("User 2".to_string()));
    }
    assert_eq!(client.request_count(), 1);

    clock.advance(Duration::from_secs(9));
    assert!(cache.contains("user:2"));

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get::<String>("user:2"), None);

    let api = client.clone();
    cache.cache_promise("user:2", move || async move { api.fetch_user(2).await }, ttl).await.ok();
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn test_errors_are_returned_by_cache_promise_and_not_stored() {
    let cache = QueryCache::new();
    let client = ApiClient::default();

    let api = client.clone();
    let missing = cache
        .cache_promise("user:0", move || async move { api.fetch_user(0).await }, None)
        .await;

    assert_eq!(missing, Err(QueryError::NotFound("user 0".to_string())));
    assert!(!cache.contains("user:0"));
}

#[tokio::test]
async fn test_global_cache_is_shared() {
    let cache = init_global_cache();
    cache.set("global:test", 41u32, Duration::from_secs(60));

    let same = get_global_cache().expect("initialized above");
    assert_eq!(same.get::<u32>("global:test"), Some(41));

    let query = QueryStore::<u32>::new(same.clone());
    let answer = query
        .fetch_data(
            "global:test",
            || async { Ok::<_, QueryError>(0) },
            CacheOptions::default(),
            Callbacks::new(),
        )
        .await;
    assert_eq!(answer, Some(41));
}
