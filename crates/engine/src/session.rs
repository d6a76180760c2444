//! Sessions: per-client workspaces over a pinned revision
//!
//! A session is opened from the repository head and stays pinned to that
//! revision for its whole life. All reads answer from the pinned
//! snapshot, never from later state, so a session observes a consistent
//! world regardless of concurrent commits by other sessions.
//!
//! Writes are staged locally: binding changes accumulate in the session
//! and touch the repository only on `save`. A session is consumed by
//! exactly one successful save; after that, staging further changes is
//! rejected. A save that fails with a conflict leaves the session in its
//! pre-save state and may be retried with freshly computed changes.

use smalltable_core::{Delta, Entity, EntityId, Error, Reference, Result, Revision};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::repository::Repository;

/// A client workspace pinned to a start revision
///
/// Owned by one thread; the repository behind it is shared.
pub struct Session {
    repository: Arc<Repository>,
    /// The revision this session was opened at
    start: Arc<Revision>,
    /// Staged binding changes; a `None` value unbinds the name
    modified_bindings: HashMap<String, Option<Reference>>,
    /// Set once a save has installed a revision
    saved: bool,
}

impl Session {
    pub(crate) fn new(repository: Arc<Repository>, start: Arc<Revision>) -> Self {
        Session {
            repository,
            start,
            modified_bindings: HashMap::new(),
            saved: false,
        }
    }

    /// The revision this session reads from
    pub fn start(&self) -> &Arc<Revision> {
        &self.start
    }

    /// Allocate a fresh reference from the repository
    pub fn allocate_reference(&self) -> Reference {
        self.repository.allocate_reference()
    }

    /// Stage a binding change
    ///
    /// `Some(reference)` binds the name, `None` unbinds it. Nothing
    /// reaches the repository until `save`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionConsumed`] after a successful save.
    pub fn bind(&mut self, name: impl Into<String>, reference: Option<Reference>) -> Result<()> {
        if self.saved {
            return Err(Error::SessionConsumed);
        }
        self.modified_bindings.insert(name.into(), reference);
        Ok(())
    }

    /// Look up a binding, staged changes first
    ///
    /// A staged `None` shadows the start revision: the name reads as
    /// unbound even though the snapshot still has it.
    pub fn bound(&self, name: &str) -> Option<Reference> {
        match self.modified_bindings.get(name) {
            Some(change) => *change,
            None => self.start.binding(name),
        }
    }

    /// Resolve a reference to its entity body at the start revision
    ///
    /// Snapshot-consistent: concurrent commits by other sessions never
    /// change the answer.
    pub fn resolve(&self, reference: Reference) -> Option<Entity> {
        let id = self.start.id_of(reference)?;
        self.repository.entity(id)
    }

    /// Save staged bindings and the given dirty entities as one commit
    ///
    /// Builds the canonical delta from the start revision, verifies it
    /// against changes already landed at the head, stores the dirty
    /// bodies, and drives the repository's commit loop. On success the
    /// installed revision is returned and the session is consumed.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`] when the staged changes overlap changes
    ///   already at the head, or the commit loop gave up. The session is
    ///   left un-consumed and may be retried.
    /// - [`Error::SessionConsumed`] on a second save.
    ///
    /// Entity ids allocated for a commit that then fails stay in the
    /// entity table; those bodies are unreachable from any revision.
    pub fn save(&mut self, dirty: impl IntoIterator<Item = Entity>) -> Result<Arc<Revision>> {
        if self.saved {
            return Err(Error::SessionConsumed);
        }

        let binding_delta = self.build_binding_delta();
        let dirty: Vec<Entity> = dirty.into_iter().collect();

        // Fail fast before allocating ids when the head already moved
        // over our keys. The commit loop below would catch the same
        // overlap; checking here just avoids wasting entity ids.
        if !self.preverify(&binding_delta, &dirty) {
            return Err(Error::Conflict);
        }

        let entity_delta = self.repository.prepare(dirty);

        let delta = Delta::new(
            binding_delta,
            entity_delta
                .into_iter()
                .map(|(reference, id)| (reference, Some(id)))
                .collect::<HashMap<Reference, Option<EntityId>>>(),
        );

        match self.repository.commit(&self.start, &delta) {
            Some(next) => {
                self.saved = true;
                Ok(next)
            }
            None => Err(Error::Conflict),
        }
    }

    /// Canonical binding delta: staged entries that actually differ from
    /// the start revision
    ///
    /// Drops a staged unbind of a name the start never bound, and a
    /// staged bind that matches the start value.
    fn build_binding_delta(&self) -> HashMap<String, Option<Reference>> {
        let mut delta = HashMap::new();
        for (name, change) in &self.modified_bindings {
            match change {
                None => {
                    if self.start.binding(name).is_some() {
                        delta.insert(name.clone(), None);
                    }
                }
                Some(reference) => {
                    if self.start.binding(name) != Some(*reference) {
                        delta.insert(name.clone(), Some(*reference));
                    }
                }
            }
        }
        delta
    }

    fn preverify(
        &self,
        binding_delta: &HashMap<String, Option<Reference>>,
        dirty: &[Entity],
    ) -> bool {
        let head = self.repository.head();
        let head_delta = self.start.diff(&head);

        let binding_keys: HashSet<String> = binding_delta.keys().cloned().collect();
        let entity_keys: HashSet<Reference> =
            dirty.iter().map(Entity::self_reference).collect();

        !head_delta.conflicts_with(&binding_keys, &entity_keys)
    }
}
