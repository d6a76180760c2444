//! Differences between revisions
//!
//! A `Delta` carries the change from one revision to another as two
//! partial maps, one per revision half. A key that does not appear is
//! untouched; a key mapped to `None` is a tombstone and removes the
//! binding or reference at the target. Tombstones are always a present
//! key with a `None` value, never an absent key, so "unchanged" and
//! "deleted" cannot be confused.
//!
//! Deltas support:
//! - conflict detection against a set of touched keys
//! - composition with another delta, refused on any key overlap

use crate::ident::{EntityId, Reference};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Difference between two revisions, with explicit tombstones
///
/// Semantically immutable once constructed. The key sets are precisely
/// the keys whose value differs between the source and target revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    bindings: HashMap<String, Option<Reference>>,
    entities: HashMap<Reference, Option<EntityId>>,
}

impl Delta {
    /// Create a delta from its two halves
    pub fn new(
        bindings: HashMap<String, Option<Reference>>,
        entities: HashMap<Reference, Option<EntityId>>,
    ) -> Self {
        Delta { bindings, entities }
    }

    /// The delta that changes nothing
    pub fn empty() -> Self {
        Delta {
            bindings: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    /// Changed named roots; `None` unbinds the name at the target
    pub fn bindings(&self) -> &HashMap<String, Option<Reference>> {
        &self.bindings
    }

    /// Changed reference snapshots; `None` removes the reference from the
    /// live set at the target
    pub fn entities(&self) -> &HashMap<Reference, Option<EntityId>> {
        &self.entities
    }

    /// Check if this delta changes nothing
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.entities.is_empty()
    }

    /// Check whether this delta touches any of the given keys
    ///
    /// True iff `binding_keys` intersects the binding half or
    /// `entity_keys` intersects the entity half. Each intersection
    /// iterates the smaller side against membership in the larger, so the
    /// cost is proportional to the smaller set.
    pub fn conflicts_with(
        &self,
        binding_keys: &HashSet<String>,
        entity_keys: &HashSet<Reference>,
    ) -> bool {
        if keys_intersect_set(&self.bindings, binding_keys) {
            return true;
        }
        if keys_intersect_set(&self.entities, entity_keys) {
            return true;
        }
        false
    }

    /// Compose this delta with another
    ///
    /// The two deltas must be disjoint: no binding name and no reference
    /// may be changed by both. Any overlap is a conflict and yields
    /// `None`, even when the overlapping values happen to agree. On
    /// success the result is the key-wise union of both deltas.
    pub fn merge(&self, other: &Delta) -> Option<Delta> {
        if keys_overlap(&self.bindings, &other.bindings) {
            return None;
        }
        if keys_overlap(&self.entities, &other.entities) {
            return None;
        }
        let mut bindings = self.bindings.clone();
        bindings.extend(other.bindings.iter().map(|(k, v)| (k.clone(), *v)));

        let mut entities = self.entities.clone();
        entities.extend(other.entities.iter().map(|(k, v)| (*k, *v)));

        Some(Delta { bindings, entities })
    }
}

/// Intersection test between a map's key set and a plain set, iterating
/// the smaller side.
fn keys_intersect_set<K: Eq + Hash, V>(map: &HashMap<K, V>, set: &HashSet<K>) -> bool {
    if map.len() < set.len() {
        map.keys().any(|k| set.contains(k))
    } else {
        set.iter().any(|k| map.contains_key(k))
    }
}

/// Intersection test between two maps' key sets, iterating the smaller
/// side.
fn keys_overlap<K: Eq + Hash, V>(a: &HashMap<K, V>, b: &HashMap<K, V>) -> bool {
    if a.len() < b.len() {
        a.keys().any(|k| b.contains_key(k))
    } else {
        b.keys().any(|k| a.contains_key(k))
    }
}
