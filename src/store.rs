//! # State Store
//!
//! The minimal reactive container every query and mutation controller keeps its state in.
//! Reads are synchronous and observe the latest `set` immediately. Changes are published
//! two ways:
//! - synchronous listeners registered with [`Store::subscribe`], called with
//!   `(new_state, previous_state)` after every update;
//! - a [`tokio::sync::watch`] channel from [`Store::watch`] for async consumers.

use std::{
    fmt,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::watch;

/// Callback invoked after every state change with `(new, previous)`
pub type Listener<S> = Arc<dyn Fn(&S, &S) + Send + Sync>;

struct StoreInner<S> {
    tx: watch::Sender<S>,
    listeners: Mutex<Vec<(u64, Listener<S>)>>,
    next_listener_id: AtomicU64,
}

/// Shared handle to a piece of state. Clones point at the same state.
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Store").field(&*self.inner.tx.borrow()).finish()
    }
}

impl<S: Default + Clone + Send + Sync + 'static> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Clone + Send + Sync + 'static> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            inner: Arc::new(StoreInner {
                tx,
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// A snapshot of the current state
    pub fn get(&self) -> S {
        self.inner.tx.borrow().clone()
    }

    /// Read part of the state without cloning all of it
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.tx.borrow())
    }

    /// Apply a partial update in place, then notify subscribers.
    ///
    /// `update` runs under the store's write lock and must not touch the same store.
    pub fn set(&self, update: impl FnOnce(&mut S)) {
        let mut previous = None;
        self.inner.tx.send_modify(|state| {
            previous = Some(state.clone());
            update(state);
        });
        if let Some(previous) = previous {
            self.notify(&previous);
        }
    }

    /// Replace the whole state, then notify subscribers
    pub fn replace(&self, state: S) {
        let previous = self.inner.tx.send_replace(state);
        self.notify(&previous);
    }

    /// Register a listener. It stays registered until the returned handle is dropped or
    /// [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: impl Fn(&S, &S) + Send + Sync + 'static) -> Subscription<S> {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// A receiver that is marked changed on every update
    pub fn watch(&self) -> watch::Receiver<S> {
        self.inner.tx.subscribe()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    fn notify(&self, previous: &S) {
        // Listeners may call back into the store, so no lock is held while they run.
        let listeners: Vec<Listener<S>> = match self.inner.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => return,
        };
        if listeners.is_empty() {
            return;
        }
        let current = self.get();
        for listener in listeners {
            listener(&current, previous);
        }
    }
}

/// Handle returned by [`Store::subscribe`]
pub struct Subscription<S> {
    store: Weak<StoreInner<S>>,
    id: u64,
}

impl<S> Subscription<S> {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl<S> Drop for Subscription<S> {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            if let Ok(mut listeners) = inner.listeners.lock() {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
