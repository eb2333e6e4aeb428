//! Single-page list query driven by a filter.
//!
//! Unlike [`InfiniteQuery`](crate::infinite::InfiniteQuery) there is no accumulation: each
//! fetch replaces `data` with what `fetcher(filter)` returned. Paging, if any, lives inside
//! the filter itself.

use futures::{FutureExt, future::BoxFuture};
use std::{fmt, future::Future, sync::Arc};
use tracing::debug;

use crate::{
    callbacks::{Callbacks, handle_error, handle_success},
    errors::QueryError,
    filter::Filter,
    infinite::PageResponse,
    state::RequestState,
    store::{Store, Subscription},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<T, F> {
    pub filter: F,
    /// Items and total of the last successful fetch
    pub request: RequestState<Vec<T>>,
    pub total: u64,
}

impl<T, F: Default> Default for PaginationState<T, F> {
    fn default() -> Self {
        Self {
            filter: F::default(),
            request: RequestState::default(),
            total: 0,
        }
    }
}

pub type ListFetcher<T, F> =
    Arc<dyn Fn(F) -> BoxFuture<'static, Result<PageResponse<T>, QueryError>> + Send + Sync>;

pub struct PaginationQuery<T, F> {
    store: Store<PaginationState<T, F>>,
    fetcher: ListFetcher<T, F>,
    callbacks: Callbacks<PageResponse<T>>,
}

impl<T, F> Clone for PaginationQuery<T, F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<T, F> fmt::Debug for PaginationQuery<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationQuery")
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

impl<T, F> PaginationQuery<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Filter,
{
    pub fn new<Fetch, Fut, E>(fetcher: Fetch) -> Self
    where
        Fetch: Fn(F) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageResponse<T>, E>> + Send + 'static,
        E: Into<QueryError> + 'static,
    {
        let fetcher: ListFetcher<T, F> = Arc::new(move |filter| {
            fetcher(filter)
                .map(|result| result.map_err(Into::into))
                .boxed()
        });
        Self {
            store: Store::default(),
            fetcher,
            callbacks: Callbacks::default(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks<PageResponse<T>>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn state(&self) -> PaginationState<T, F> {
        self.store.get()
    }

    pub fn store(&self) -> &Store<PaginationState<T, F>> {
        &self.store
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&PaginationState<T, F>, &PaginationState<T, F>) + Send + Sync + 'static,
    ) -> Subscription<PaginationState<T, F>> {
        self.store.subscribe(listener)
    }

    /// Shallow-merge `patch` into the filter. Does not fetch.
    pub fn set_filter(&self, patch: F) {
        self.store.set(|s| s.filter.merge(patch));
    }

    pub fn reset_filter(&self, filter: F) {
        self.store.set(|s| s.filter = filter);
    }

    pub async fn fetch_data(
        &self,
        callbacks: Callbacks<PageResponse<T>>,
    ) -> Option<PageResponse<T>> {
        let filter = self.store.read(|s| s.filter.clone());
        self.store.set(|s| s.request.begin());

        debug!("🔄 [PAGINATION] Fetching list");
        let response = match (self.fetcher)(filter).await {
            Ok(response) => {
                self.store.set(|s| {
                    s.request.succeed(response.data.clone());
                    s.total = response.total;
                });
                handle_success(&[&callbacks, &self.callbacks], &response);
                Some(response)
            }
            Err(err) => {
                debug!("❌ [PAGINATION] Fetch failed: {}", err);
                self.store.set(|s| s.request.fail(err.clone()));
                handle_error(&[&callbacks, &self.callbacks], &err, "PAGINATION");
                None
            }
        };

        self.store.set(|s| s.request.settle());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_fetch_uses_current_filter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let query = PaginationQuery::<u32, Value>::new(move |filter: Value| {
            seen_clone.lock().unwrap().push(filter);
            async { Ok::<_, QueryError>(PageResponse::new(vec![1, 2, 3], 30)) }
        });

        query.set_filter(json!({"status": "open"}));
        query.set_filter(json!({"page": 2}));
        let response = query.fetch_data(Callbacks::new()).await;

        assert_eq!(response.map(|r| r.total), Some(30));
        assert_eq!(*seen.lock().unwrap(), vec![json!({"status": "open", "page": 2})]);

        let state = query.state();
        assert_eq!(state.request.data, Some(vec![1, 2, 3]));
        assert_eq!(state.total, 30);
        assert!(state.request.is_loaded && !state.request.is_loading);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_page() {
        let fail = Arc::new(Mutex::new(false));
        let fail_clone = fail.clone();
        let query = PaginationQuery::<u32, ()>::new(move |_| {
            let fail = *fail_clone.lock().unwrap();
            async move {
                if fail {
                    Err(QueryError::Timeout("slow".into()))
                } else {
                    Ok(PageResponse::new(vec![7], 1))
                }
            }
        });

        query.fetch_data(Callbacks::new()).await;
        *fail.lock().unwrap() = true;
        let result = query.fetch_data(Callbacks::new().on_error(|_| {})).await;

        assert!(result.is_none());
        let state = query.state();
        assert_eq!(state.request.data, Some(vec![7]));
        assert_eq!(state.request.error, Some(QueryError::Timeout("slow".into())));
        assert!(!state.request.is_loading);
    }
}
