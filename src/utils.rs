//! Identity and list-merge helpers used when pages are merged into a list.

use std::{
    collections::HashSet,
    fmt::Debug,
    hash::Hash,
    panic::{AssertUnwindSafe, catch_unwind},
};
use tracing::warn;

/// Items that carry an identity, commonly an `id` field.
///
/// Returning `None` means "no identity": such an item never matches another one, so it is
/// never treated as a duplicate.
pub trait Identifiable {
    type Id: Eq + Hash + Clone + Debug;

    fn id(&self) -> Option<Self::Id>;
}

/// JSON objects are identified by their `id` member, compared by its JSON text so that
/// `1` and `"1"` stay distinct.
impl Identifiable for serde_json::Value {
    type Id = String;

    fn id(&self) -> Option<String> {
        self.get("id")
            .filter(|id| !id.is_null())
            .map(|id| id.to_string())
    }
}

/// True when both items have an identity and the identities are equal
pub fn same_identity<T: Identifiable>(a: &T, b: &T) -> bool {
    match (a.id(), b.id()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Items of `new_items` that have no equal in `existing`, in their original order.
///
/// If `is_equal` panics the whole computation is abandoned and an empty list is returned,
/// i.e. "nothing new".
pub fn find_difference_items<T, F>(new_items: &[T], existing: &[T], is_equal: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let result = catch_unwind(AssertUnwindSafe(|| {
        new_items
            .iter()
            .filter(|new_item| !existing.iter().any(|old| is_equal(new_item, old)))
            .cloned()
            .collect::<Vec<_>>()
    }));

    match result {
        Ok(items) => items,
        Err(_) => {
            warn!("⚠️ [DIFF] Equality check failed, treating as no new items");
            Vec::new()
        }
    }
}

/// Drops every item whose identity was already seen earlier in the list. Items without an
/// identity are all kept.
pub fn uniq_by_identity<T: Identifiable>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| match item.id() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Option<u32>,
        name: &'static str,
    }

    impl Identifiable for Row {
        type Id = u32;

        fn id(&self) -> Option<u32> {
            self.id
        }
    }

    fn row(id: u32, name: &'static str) -> Row {
        Row { id: Some(id), name }
    }

    #[test]
    fn test_difference_keeps_only_new_items_in_order() {
        let existing = vec![row(1, "a"), row(2, "b")];
        let incoming = vec![row(3, "c"), row(2, "b2"), row(4, "d")];

        let diff = find_difference_items(&incoming, &existing, same_identity);
        assert_eq!(diff, vec![row(3, "c"), row(4, "d")]);
    }

    #[test]
    fn test_difference_fails_safe_on_panicking_equality() {
        let existing = vec![row(1, "a")];
        let incoming = vec![row(2, "b")];

        let diff = find_difference_items(&incoming, &existing, |_: &Row, _: &Row| -> bool {
            panic!("broken comparator")
        });
        assert!(diff.is_empty());
    }

    #[test]
    fn test_items_without_identity_never_match() {
        let anonymous = Row { id: None, name: "x" };
        assert!(!same_identity(&anonymous, &anonymous.clone()));

        let diff = find_difference_items(&[anonymous.clone()], &[anonymous.clone()], same_identity);
        assert_eq!(diff.len(), 1);

        let uniq = uniq_by_identity(vec![anonymous.clone(), anonymous]);
        assert_eq!(uniq.len(), 2);
    }

    #[test]
    fn test_uniq_keeps_first_occurrence() {
        let items = vec![row(1, "first"), row(2, "b"), row(1, "second")];
        assert_eq!(uniq_by_identity(items), vec![row(1, "first"), row(2, "b")]);
    }

    #[test]
    fn test_json_identity() {
        assert_eq!(json!({"id": 7}).id(), Some("7".to_string()));
        assert!(!same_identity(&json!({"id": 1}), &json!({"id": "1"})));
        assert!(same_identity(&json!({"id": "a"}), &json!({"id": "a", "v": 2})));
        assert_eq!(json!({"id": null}).id(), None);
        assert_eq!(json!({"name": "no id"}).id(), None);
    }
}
