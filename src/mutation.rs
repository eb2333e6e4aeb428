//! # Mutation Container
//!
//! Sequences write operations into a [`RequestState`] and keeps one boolean flag per kind
//! of write ([`MutationType`]) so a UI can tell *what* is in flight, e.g. "deleting" vs
//! "publishing". Kinds outside the fixed set go through free-form custom flags.
//!
//! Passing a mutation key mirrors everything into a per-key entry as well, which is how a
//! single row of a table gets its own spinner without reloading the table.
//!
//! A mutation runs as:
//! 1. `is_loading` and the kind flags go up (primary state, plus the keyed entry)
//! 2. the mutation function runs
//! 3. success stores `data`; failure stores `error` and keeps the previous `data`
//! 4. always: kind flags down, `is_loading = false`, `is_loaded = true`

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, future::Future};
use tracing::debug;

use crate::{
    callbacks::{Callbacks, handle_error, handle_success},
    errors::QueryError,
    state::{KeyedStates, RequestState},
    store::{Store, Subscription},
};

/// The fixed set of write operations that get their own flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    Create,
    Edit,
    Delete,
    Submit,
    Publish,
    SaveAsDraft,
    Deactivate,
    Reactivate,
}

impl MutationType {
    pub const ALL: [MutationType; 8] = [
        MutationType::Create,
        MutationType::Edit,
        MutationType::Delete,
        MutationType::Submit,
        MutationType::Publish,
        MutationType::SaveAsDraft,
        MutationType::Deactivate,
        MutationType::Reactivate,
    ];

    /// Name of the flag this kind drives
    pub fn flag_name(self) -> &'static str {
        match self {
            MutationType::Create => "isCreating",
            MutationType::Edit => "isEditing",
            MutationType::Delete => "isDeleting",
            MutationType::Submit => "isSubmitting",
            MutationType::Publish => "isPublishing",
            MutationType::SaveAsDraft => "isSavingAsDraft",
            MutationType::Deactivate => "isDeactivating",
            MutationType::Reactivate => "isReactivating",
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag_name())
    }
}

/// One flag per [`MutationType`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationFlags {
    pub is_creating: bool,
    pub is_editing: bool,
    pub is_deleting: bool,
    pub is_submitting: bool,
    pub is_publishing: bool,
    pub is_saving_as_draft: bool,
    pub is_deactivating: bool,
    pub is_reactivating: bool,
}

impl MutationFlags {
    pub fn get(&self, kind: MutationType) -> bool {
        *self.slot(kind)
    }

    pub fn set(&mut self, kind: MutationType, value: bool) {
        *self.slot_mut(kind) = value;
    }

    /// True if any kind is in flight
    pub fn any(&self) -> bool {
        MutationType::ALL.iter().any(|kind| self.get(*kind))
    }

    fn slot(&self, kind: MutationType) -> &bool {
        match kind {
            MutationType::Create => &self.is_creating,
            MutationType::Edit => &self.is_editing,
            MutationType::Delete => &self.is_deleting,
            MutationType::Submit => &self.is_submitting,
            MutationType::Publish => &self.is_publishing,
            MutationType::SaveAsDraft => &self.is_saving_as_draft,
            MutationType::Deactivate => &self.is_deactivating,
            MutationType::Reactivate => &self.is_reactivating,
        }
    }

    fn slot_mut(&mut self, kind: MutationType) -> &mut bool {
        match kind {
            MutationType::Create => &mut self.is_creating,
            MutationType::Edit => &mut self.is_editing,
            MutationType::Delete => &mut self.is_deleting,
            MutationType::Submit => &mut self.is_submitting,
            MutationType::Publish => &mut self.is_publishing,
            MutationType::SaveAsDraft => &mut self.is_saving_as_draft,
            MutationType::Deactivate => &mut self.is_deactivating,
            MutationType::Reactivate => &mut self.is_reactivating,
        }
    }
}

/// Request state together with the kind flags, for the primary state or one key
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEntry<T> {
    pub request: RequestState<T>,
    pub flags: MutationFlags,
    pub custom_flags: BTreeMap<String, bool>,
}

impl<T> Default for MutationEntry<T> {
    fn default() -> Self {
        Self {
            request: RequestState::default(),
            flags: MutationFlags::default(),
            custom_flags: BTreeMap::new(),
        }
    }
}

impl<T> MutationEntry<T> {
    /// Whether a mutation of `kind` is in flight
    pub fn is(&self, kind: MutationType) -> bool {
        self.flags.get(kind)
    }

    /// Whether the custom kind `name` is in flight; unknown names are false
    pub fn custom(&self, name: &str) -> bool {
        self.custom_flags.get(name).copied().unwrap_or(false)
    }

    fn set_custom(&mut self, name: &str, value: bool) {
        self.custom_flags.insert(name.to_string(), value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<T> {
    pub primary: MutationEntry<T>,
    pub data_by_keys: KeyedStates<MutationEntry<T>>,
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self {
            primary: MutationEntry::default(),
            data_by_keys: KeyedStates::default(),
        }
    }
}

/// Per-call options for [`MutationStore::mutation_data`]
pub struct MutationParams<T> {
    pub mutation_type: Option<MutationType>,
    pub mutation_key: Option<String>,
    pub custom_mutation_type: Option<String>,
    pub callbacks: Callbacks<T>,
}

impl<T> Default for MutationParams<T> {
    fn default() -> Self {
        Self {
            mutation_type: None,
            mutation_key: None,
            custom_mutation_type: None,
            callbacks: Callbacks::default(),
        }
    }
}

impl<T> MutationParams<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutation_type(mut self, kind: MutationType) -> Self {
        self.mutation_type = Some(kind);
        self
    }

    /// Track this mutation under its own key as well
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.mutation_key = Some(key.into());
        self
    }

    pub fn custom_type(mut self, name: impl Into<String>) -> Self {
        self.custom_mutation_type = Some(name.into());
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks<T>) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// Write-operation container. Clones share state and handlers.
#[derive(Clone)]
pub struct MutationStore<T> {
    store: Store<MutationState<T>>,
    callbacks: Callbacks<T>,
}

impl<T: Clone + Send + Sync + 'static> Default for MutationStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> MutationStore<T> {
    pub fn new() -> Self {
        Self {
            store: Store::default(),
            callbacks: Callbacks::default(),
        }
    }

    /// Container-level handlers, used when a call brings none of its own
    pub fn with_callbacks(mut self, callbacks: Callbacks<T>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn state(&self) -> MutationState<T> {
        self.store.get()
    }

    pub fn store(&self) -> &Store<MutationState<T>> {
        &self.store
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&MutationState<T>, &MutationState<T>) + Send + Sync + 'static,
    ) -> Subscription<MutationState<T>> {
        self.store.subscribe(listener)
    }

    pub fn get_data_by_key(&self, key: &str) -> Option<MutationEntry<T>> {
        self.store.read(|s| s.data_by_keys.get(key).cloned())
    }

    pub fn set_data(&self, data: Option<T>) {
        self.store.set(|s| s.primary.request.data = data);
    }

    pub fn set_loading(&self, is_loading: bool, key: Option<&str>) {
        self.update(key, |e| e.request.is_loading = is_loading);
    }

    pub fn set_loaded(&self, is_loaded: bool, key: Option<&str>) {
        self.update(key, |e| e.request.is_loaded = is_loaded);
    }

    /// Toggle the flag of `kind`. `None` is a no-op.
    pub fn set_mutation_type(&self, kind: Option<MutationType>, value: bool, key: Option<&str>) {
        if let Some(kind) = kind {
            self.update(key, |e| e.flags.set(kind, value));
        }
    }

    /// Toggle a free-form flag. `None` or an empty name is a no-op.
    pub fn set_custom_mutation_type(&self, name: Option<&str>, value: bool, key: Option<&str>) {
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            self.update(key, |e| e.set_custom(name, value));
        }
    }

    /// Run `mutation_fn` under the mutation protocol.
    ///
    /// Returns the response, or `None` if the mutation failed; the error is in state.
    pub async fn mutation_data<F, Fut, E>(
        &self,
        mutation_fn: F,
        params: MutationParams<T>,
    ) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<QueryError>,
    {
        let MutationParams {
            mutation_type,
            mutation_key,
            custom_mutation_type,
            callbacks,
        } = params;
        let key = mutation_key.as_deref();
        let custom = custom_mutation_type.as_deref();

        debug!(
            "🔄 [MUTATION] Starting mutation {:?} (key: {:?})",
            mutation_type, key
        );
        self.set_loading(true, key);
        self.set_mutation_type(mutation_type, true, key);
        self.set_custom_mutation_type(custom, true, key);

        let outcome: Result<T, QueryError> = mutation_fn().await.map_err(Into::into);
        let response = match outcome {
            Ok(data) => {
                debug!("✅ [MUTATION] Mutation succeeded (key: {:?})", key);
                self.update(key, |e| e.request.succeed(data.clone()));
                handle_success(&[&callbacks, &self.callbacks], &data);
                Some(data)
            }
            Err(err) => {
                debug!("❌ [MUTATION] Mutation failed (key: {:?}): {}", key, err);
                self.update(key, |e| e.request.fail(err.clone()));
                handle_error(&[&callbacks, &self.callbacks], &err, "MUTATION");
                None
            }
        };

        self.set_mutation_type(mutation_type, false, key);
        self.set_custom_mutation_type(custom, false, key);
        self.update(key, |e| e.request.settle());
        response
    }

    /// Apply `f` to the primary entry, and to the keyed entry when `key` is given
    fn update(&self, key: Option<&str>, f: impl Fn(&mut MutationEntry<T>)) {
        self.store.set(|s| {
            f(&mut s.primary);
            if let Some(key) = key {
                s.data_by_keys.update(key, &f);
            }
        });
    }
}
