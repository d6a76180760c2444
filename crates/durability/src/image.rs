//! Serializable repository state
//!
//! `RepositoryImage` is the one self-contained graph a repository dumps
//! and restores: the revision list (newest first), the entity table, and
//! the two identifier sequence counters.

use serde::{Deserialize, Serialize};
use smalltable_core::{Entity, EntityId, Revision, Value};

/// Complete serializable state of a repository
///
/// The entity table is stored as a vector of pairs so the payload
/// encoding does not depend on hash-map iteration order internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryImage {
    /// All revisions, newest first; the first element is the head
    pub revisions: Vec<Revision>,
    /// Every entity body ever prepared, keyed by its id
    pub entities: Vec<(EntityId, Entity)>,
    /// Last value handed out by the reference sequence
    pub reference_seq: u64,
    /// Last value handed out by the entity id sequence
    pub entity_id_seq: u64,
}

impl RepositoryImage {
    /// Highest reference value appearing anywhere in the image
    ///
    /// Scans revision bindings and live sets, entity self references, and
    /// reference-valued properties. Used on restore to clamp the
    /// reference sequence so a stale counter can never cause reuse.
    pub fn max_reference(&self) -> u64 {
        let mut max = 0u64;
        for revision in &self.revisions {
            for reference in revision.bindings().values() {
                max = max.max(reference.as_u64());
            }
            for reference in revision.entities().keys() {
                max = max.max(reference.as_u64());
            }
        }
        for (_, entity) in &self.entities {
            max = max.max(entity.self_reference().as_u64());
            for value in entity.properties().values() {
                if let Value::Ref(reference) = value {
                    max = max.max(reference.as_u64());
                }
            }
        }
        max
    }

    /// Highest entity id value appearing anywhere in the image
    pub fn max_entity_id(&self) -> u64 {
        let mut max = 0u64;
        for revision in &self.revisions {
            for id in revision.entities().values() {
                max = max.max(id.as_u64());
            }
        }
        for (id, _) in &self.entities {
            max = max.max(id.as_u64());
        }
        max
    }
}
