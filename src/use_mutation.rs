//! # Mutation Hook
//!
//! A single-operation mutation controller for a UI component. Its state is a plain
//! [`RequestState`] and moves `idle -> loading -> success | error`. It only goes back to
//! idle through a reset, which [`UseMutation::mount`] performs when the component mounts and
//! again when the returned [`MountGuard`] is dropped on unmount.
//!
//! [`UseMutation::mutate_async`] never returns the producer's error. It is stored in state
//! and passed to the error handler, and the call returns `None`.
//!
//! A mutation still in flight when the component unmounts runs to completion and writes
//! its result into the state that was just reset. Nothing cancels it.
//!
//! ## Example
//!
//! ```rust
//! use store_query::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let rename = UseMutation::new(|name: String| async move {
//!     Ok::<_, QueryError>(format!("renamed to {name}"))
//! });
//! let _mounted = rename.mount();
//!
//! let result = rename.mutate_async("draft".to_string()).await;
//! assert_eq!(result.as_deref(), Some("renamed to draft"));
//! assert!(rename.state().is_success);
//! # });
//! ```

use futures::{FutureExt, future::BoxFuture};
use std::{fmt, future::Future, sync::Arc};
use tracing::debug;

use crate::{
    callbacks::{Callbacks, handle_error, handle_success},
    errors::QueryError,
    state::RequestState,
    store::{Store, Subscription},
};

/// Resets a store to its default state when dropped
#[must_use = "dropping the guard resets the state immediately"]
pub struct MountGuard<S: Default + Clone + Send + Sync + 'static> {
    store: Store<S>,
}

impl<S: Default + Clone + Send + Sync + 'static> MountGuard<S> {
    pub(crate) fn mount(store: &Store<S>) -> Self {
        store.replace(S::default());
        Self {
            store: store.clone(),
        }
    }
}

impl<S: Default + Clone + Send + Sync + 'static> Drop for MountGuard<S> {
    fn drop(&mut self) {
        debug!("🗑️ [MOUNT] Resetting state on unmount");
        self.store.replace(S::default());
    }
}

impl<S: Default + Clone + Send + Sync + 'static> fmt::Debug for MountGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountGuard").finish_non_exhaustive()
    }
}

pub type MutationFn<P, T> =
    Arc<dyn Fn(P) -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

pub struct UseMutation<P, T> {
    mutation_fn: MutationFn<P, T>,
    callbacks: Callbacks<T>,
    store: Store<RequestState<T>>,
}

impl<P, T> Clone for UseMutation<P, T> {
    fn clone(&self) -> Self {
        Self {
            mutation_fn: self.mutation_fn.clone(),
            callbacks: self.callbacks.clone(),
            store: self.store.clone(),
        }
    }
}

impl<P, T: fmt::Debug> fmt::Debug for UseMutation<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseMutation")
            .field("callbacks", &self.callbacks)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<P, T> UseMutation<P, T>
where
    P: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<M, Fut, E>(mutation_fn: M) -> Self
    where
        M: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<QueryError> + 'static,
    {
        let mutation_fn: MutationFn<P, T> = Arc::new(move |payload| {
            mutation_fn(payload)
                .map(|result| result.map_err(Into::into))
                .boxed()
        });
        Self {
            mutation_fn,
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

    /// Reset now, and again when the guard is dropped
    pub fn mount(&self) -> MountGuard<RequestState<T>> {
        MountGuard::mount(&self.store)
    }

    pub fn state(&self) -> RequestState<T> {
        self.store.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&RequestState<T>, &RequestState<T>) + Send + Sync + 'static,
    ) -> Subscription<RequestState<T>> {
        self.store.subscribe(listener)
    }

    pub fn reset(&self) {
        self.store.set(RequestState::reset);
    }

    pub async fn mutate_async(&self, payload: P) -> Option<T> {
        self.store.set(RequestState::begin);

        debug!("🔄 [USE-MUTATION] Running mutation");
        let response = match (self.mutation_fn)(payload).await {
            Ok(data) => {
                self.store.set(|s| s.succeed(data.clone()));
                handle_success(&[&self.callbacks], &data);
                Some(data)
            }
            Err(err) => {
                debug!("❌ [USE-MUTATION] Mutation failed: {}", err);
                self.store.set(|s| s.fail(err.clone()));
                handle_error(&[&self.callbacks], &err, "USE-MUTATION");
                None
            }
        };

        self.store.set(RequestState::settle);
        response
    }
}
