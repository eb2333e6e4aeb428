//! Search-as-you-type controller.
//!
//! Same request protocol as [`UseMutation`](crate::use_mutation::UseMutation), with the
//! search term trimmed and kept in state as `key_search`. A blank term clears the results
//! without calling the producer.

use futures::{FutureExt, future::BoxFuture};
use std::{fmt, future::Future, sync::Arc};
use tracing::debug;

use crate::{
    callbacks::{Callbacks, handle_error, handle_success},
    errors::QueryError,
    state::RequestState,
    store::{Store, Subscription},
    use_mutation::MountGuard,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchState<T> {
    /// The last term searched for, trimmed
    pub key_search: String,
    pub request: RequestState<T>,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            key_search: String::new(),
            request: RequestState::default(),
        }
    }
}

pub type SearchFn<T> =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

pub struct UseSearch<T> {
    search_fn: SearchFn<T>,
    callbacks: Callbacks<T>,
    store: Store<SearchState<T>>,
}

impl<T> Clone for UseSearch<T> {
    fn clone(&self) -> Self {
        Self {
            search_fn: self.search_fn.clone(),
            callbacks: self.callbacks.clone(),
            store: self.store.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for UseSearch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseSearch")
            .field("callbacks", &self.callbacks)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<T> UseSearch<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<S, Fut, E>(search_fn: S) -> Self
    where
        S: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<QueryError> + 'static,
    {
        let search_fn: SearchFn<T> = Arc::new(move |term| {
            search_fn(term)
                .map(|result| result.map_err(Into::into))
                .boxed()
        });
        Self {
            search_fn,
            callbacks: Callbacks::default(),
            store: Store::default(),
        }
    }

    pub fn on_success(mut self, handler: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_success(handler);
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&QueryError) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_error(handler);
        self
    }

    pub fn mount(&self) -> MountGuard<SearchState<T>> {
        MountGuard::mount(&self.store)
    }

    pub fn state(&self) -> SearchState<T> {
        self.store.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SearchState<T>, &SearchState<T>) + Send + Sync + 'static,
    ) -> Subscription<SearchState<T>> {
        self.store.subscribe(listener)
    }

    pub fn reset(&self) {
        self.store.replace(SearchState::default());
    }

    pub async fn search_async(&self, term: &str) -> Option<T> {
        let term = term.trim().to_string();
        self.store.set(|s| s.key_search = term.clone());

        if term.is_empty() {
            self.store.set(|s| s.request.data = None);
            return None;
        }

        self.store.set(|s| s.request.begin());

        debug!("🔍 [USE-SEARCH] Searching for '{}'", term);
        let response = match (self.search_fn)(term).await {
            Ok(data) => {
                self.store.set(|s| s.request.succeed(data.clone()));
                handle_success(&[&self.callbacks], &data);
                Some(data)
            }
            Err(err) => {
                debug!("❌ [USE-SEARCH] Search failed: {}", err);
                self.store.set(|s| s.request.fail(err.clone()));
                handle_error(&[&self.callbacks], &err, "USE-SEARCH");
                None
            }
        };

        self.store.set(|s| s.request.settle());
        response
    }
}
