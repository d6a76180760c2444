//! Immutable repository snapshots
//!
//! A `Revision` is one point in the commit timeline: a pair of maps
//! recording which reference every named root points at, and which entity
//! body is the current snapshot of every live reference. Revisions are
//! values; once constructed they are never mutated and may be shared
//! freely across threads.
//!
//! `diff` and `apply` are inverses: for any two revisions `a` and `b`,
//! `a.apply(&a.diff(&b))` equals `b`.

use crate::delta::Delta;
use crate::ident::{EntityId, Reference};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Immutable snapshot of the whole repository state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Named roots
    bindings: HashMap<String, Reference>,
    /// Current entity body of each live reference
    entities: HashMap<Reference, EntityId>,
}

impl Revision {
    /// The revision with no bindings and no live references
    pub fn empty() -> Self {
        Revision {
            bindings: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    /// Create a revision from complete maps
    pub fn new(
        bindings: HashMap<String, Reference>,
        entities: HashMap<Reference, EntityId>,
    ) -> Self {
        Revision { bindings, entities }
    }

    /// Look up a named root
    pub fn binding(&self, name: &str) -> Option<Reference> {
        self.bindings.get(name).copied()
    }

    /// Look up the entity body current for a reference at this revision
    pub fn id_of(&self, reference: Reference) -> Option<EntityId> {
        self.entities.get(&reference).copied()
    }

    /// All named roots at this revision
    pub fn bindings(&self) -> &HashMap<String, Reference> {
        &self.bindings
    }

    /// All live references and their entity bodies at this revision
    pub fn entities(&self) -> &HashMap<Reference, EntityId> {
        &self.entities
    }

    /// Compute the change required to turn this revision into `target`
    ///
    /// For each half: a key present in `target` with a value differing
    /// from this revision (or absent here) is recorded with the target
    /// value; a key present here but absent in `target` is recorded as a
    /// tombstone.
    pub fn diff(&self, target: &Revision) -> Delta {
        Delta::new(
            difference(&self.bindings, &target.bindings),
            difference(&self.entities, &target.entities),
        )
    }

    /// Produce the revision that results from applying `delta` to this one
    ///
    /// Tombstones remove their key, other entries overwrite, keys absent
    /// from the delta copy through unchanged. Applying the empty delta
    /// yields an equal revision.
    pub fn apply(&self, delta: &Delta) -> Revision {
        Revision {
            bindings: patch(&self.bindings, delta.bindings()),
            entities: patch(&self.entities, delta.entities()),
        }
    }
}

/// Key-wise difference of two maps, tombstoning keys that vanish
fn difference<K, V>(from: &HashMap<K, V>, to: &HashMap<K, V>) -> HashMap<K, Option<V>>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    let mut result = HashMap::new();
    for (key, to_value) in to {
        match from.get(key) {
            Some(from_value) if from_value == to_value => {}
            _ => {
                result.insert(key.clone(), Some(to_value.clone()));
            }
        }
    }
    for key in from.keys() {
        if !to.contains_key(key) {
            result.insert(key.clone(), None);
        }
    }
    result
}

/// Apply a partial map with tombstones to a complete map
fn patch<K, V>(origin: &HashMap<K, V>, delta: &HashMap<K, Option<V>>) -> HashMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    if delta.is_empty() {
        return origin.clone();
    }
    let mut result = origin.clone();
    for (key, change) in delta {
        match change {
            None => {
                result.remove(key);
            }
            Some(value) => {
                result.insert(key.clone(), value.clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(bindings: &[(&str, u64)], entities: &[(u64, u64)]) -> Revision {
        Revision::new(
            bindings
                .iter()
                .map(|(name, r)| (name.to_string(), Reference::new(*r)))
                .collect(),
            entities
                .iter()
                .map(|(r, id)| (Reference::new(*r), EntityId::new(*id)))
                .collect(),
        )
    }

    #[test]
    fn test_empty_revision() {
        let empty = Revision::empty();
        assert!(empty.bindings().is_empty());
        assert!(empty.entities().is_empty());
        assert_eq!(empty.binding("anything"), None);
        assert_eq!(empty.id_of(Reference::new(1)), None);
    }

    #[test]
    fn test_lookups() {
        let rev = revision(&[("root", 1)], &[(1, 10)]);
        assert_eq!(rev.binding("root"), Some(Reference::new(1)));
        assert_eq!(rev.binding("other"), None);
        assert_eq!(rev.id_of(Reference::new(1)), Some(EntityId::new(10)));
        assert_eq!(rev.id_of(Reference::new(2)), None);
    }

    #[test]
    fn test_diff_records_additions_changes_and_removals() {
        let from = revision(&[("keep", 1), ("change", 2), ("drop", 3)], &[(1, 10)]);
        let to = revision(&[("keep", 1), ("change", 20), ("add", 4)], &[(1, 11)]);

        let delta = from.diff(&to);

        assert_eq!(delta.bindings().len(), 3);
        assert_eq!(delta.bindings()["change"], Some(Reference::new(20)));
        assert_eq!(delta.bindings()["add"], Some(Reference::new(4)));
        assert_eq!(delta.bindings()["drop"], None);
        assert!(!delta.bindings().contains_key("keep"));

        assert_eq!(delta.entities()[&Reference::new(1)], Some(EntityId::new(11)));
    }

    #[test]
    fn test_diff_to_self_is_empty() {
        let rev = revision(&[("a", 1), ("b", 2)], &[(1, 10), (2, 20)]);
        let delta = rev.diff(&rev);
        assert!(delta.is_empty());
        assert_eq!(rev.apply(&delta), rev);
    }

    #[test]
    fn test_diff_apply_round_trip() {
        let cases = [
            (Revision::empty(), Revision::empty()),
            (Revision::empty(), revision(&[("a", 1)], &[(1, 10)])),
            (revision(&[("a", 1)], &[(1, 10)]), Revision::empty()),
            (
                revision(&[("a", 1), ("b", 2)], &[(1, 10), (2, 20)]),
                revision(&[("b", 3), ("c", 4)], &[(2, 21), (4, 40)]),
            ),
        ];
        for (a, b) in cases {
            assert_eq!(a.apply(&a.diff(&b)), b);
            assert_eq!(b.apply(&b.diff(&a)), a);
        }
    }

    #[test]
    fn test_apply_tombstone_removes_key() {
        let rev = revision(&[("gone", 1)], &[(1, 10)]);
        let delta = rev.diff(&Revision::empty());

        let next = rev.apply(&delta);
        assert_eq!(next.binding("gone"), None);
        assert_eq!(next.id_of(Reference::new(1)), None);
    }

    #[test]
    fn test_apply_copies_untouched_keys_through() {
        let rev = revision(&[("stay", 1), ("change", 2)], &[(1, 10)]);
        let target = revision(&[("stay", 1), ("change", 3)], &[(1, 10)]);

        let next = rev.apply(&rev.diff(&target));
        assert_eq!(next.binding("stay"), Some(Reference::new(1)));
        assert_eq!(next.binding("change"), Some(Reference::new(3)));
        assert_eq!(next.id_of(Reference::new(1)), Some(EntityId::new(10)));
    }

    #[test]
    fn test_apply_composition_of_disjoint_deltas() {
        let base = revision(&[("a", 1)], &[(1, 10)]);
        let d1 = base.diff(&revision(&[("a", 1), ("b", 2)], &[(1, 10), (2, 20)]));
        let d2 = base.diff(&revision(&[("a", 5)], &[(1, 11)]));

        let merged = d1.merge(&d2).expect("disjoint deltas must merge");
        let combined = base.apply(&merged);
        assert_eq!(combined, base.apply(&d1).apply(&d2));
        assert_eq!(combined, base.apply(&d2).apply(&d1));
    }
}
