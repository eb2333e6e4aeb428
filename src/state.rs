//! Request state shared by query and mutation containers, plus per-key sub-states.

use std::collections::HashMap;

use crate::errors::QueryError;

/// Loading/success/error bookkeeping for one async operation.
///
/// Starts all-false with no data. `is_loading` goes up when an operation starts; when it
/// resolves exactly one of `is_success`/`is_error` is set, and `is_loaded` latches to true
/// until an explicit [`RequestState::reset`]. A failure keeps the previous `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_loaded: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub error: Option<QueryError>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_loaded: false,
            is_success: false,
            is_error: false,
            error: None,
        }
    }
}

impl<T> RequestState<T> {
    /// Mark the start of an operation
    pub fn begin(&mut self) {
        self.is_loading = true;
    }

    /// Record a successful result
    pub fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.is_success = true;
        self.is_error = false;
        self.error = None;
    }

    /// Record a failure, leaving `data` untouched
    pub fn fail(&mut self, error: QueryError) {
        self.is_error = true;
        self.is_success = false;
        self.error = Some(error);
    }

    /// Runs on every path once the operation is over
    pub fn settle(&mut self) {
        self.is_loading = false;
        self.is_loaded = true;
    }

    /// Back to the initial all-false state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the data if present
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns the error if the last operation failed
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// True before anything has run, or after a reset
    pub fn is_idle(&self) -> bool {
        !self.is_loading && !self.is_loaded && !self.is_success && !self.is_error
    }
}

/// One sub-state tracked for a logical entity (a table row, a record id...)
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedEntry<S> {
    pub key: String,
    pub state: S,
}

/// Per-key sub-states in insertion order, at most one per key.
///
/// Lookups go through a key index; iteration follows the order keys were first used.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedStates<S> {
    entries: Vec<KeyedEntry<S>>,
    index: HashMap<String, usize>,
}

impl<S> Default for KeyedStates<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<S: Default> KeyedStates<S> {
    /// The sub-state for `key`, created from `S::default()` on first use
    pub fn entry_mut(&mut self, key: &str) -> &mut S {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.entries.push(KeyedEntry {
                    key: key.to_string(),
                    state: S::default(),
                });
                let position = self.entries.len() - 1;
                self.index.insert(key.to_string(), position);
                position
            }
        };
        &mut self.entries[position].state
    }

    /// Find-or-create the sub-state for `key` and apply `update` to it
    pub fn update(&mut self, key: &str, update: impl FnOnce(&mut S)) {
        update(self.entry_mut(key));
    }
}

impl<S> KeyedStates<S> {
    pub fn get(&self, key: &str) -> Option<&S> {
        self.index
            .get(key)
            .and_then(|&position| self.entries.get(position))
            .map(|entry| &entry.state)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<S> {
        let position = self.index.remove(key)?;
        let removed = self.entries.remove(position);
        for entry in &self.entries[position..] {
            if let Some(slot) = self.index.get_mut(&entry.key) {
                *slot -= 1;
            }
        }
        Some(removed.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyedEntry<S>> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
