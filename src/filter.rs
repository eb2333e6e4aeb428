//! Filters attached to paginated queries.
//!
//! `set_filter` on a paginated container shallow-merges a patch into the current filter:
//! every top-level field present in the patch replaces the current one, nested values are
//! not merged. `reset_filter` replaces the filter wholesale.

use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

pub trait Filter: Clone + Default + Send + Sync + 'static {
    /// Shallow-merge `patch` into `self`
    fn merge(&mut self, patch: Self);
}

impl Filter for () {
    fn merge(&mut self, _patch: Self) {}
}

impl Filter for Map<String, Value> {
    fn merge(&mut self, patch: Self) {
        self.extend(patch);
    }
}

/// Objects merge key by key; anything else is replaced by the patch.
impl Filter for Value {
    fn merge(&mut self, patch: Self) {
        match patch {
            Value::Null => {}
            Value::Object(fields) if self.is_object() => {
                if let Some(current) = self.as_object_mut() {
                    current.extend(fields);
                }
            }
            patch => *self = patch,
        }
    }
}

impl<K, V> Filter for HashMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn merge(&mut self, patch: Self) {
        self.extend(patch);
    }
}

impl<K, V> Filter for BTreeMap<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn merge(&mut self, patch: Self) {
        self.extend(patch);
    }
}
