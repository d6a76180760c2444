//! Repository: shared store and optimistic commit loop
//!
//! One repository is shared by many sessions. It owns:
//! - two lock-free monotonic counters for `Reference` and `EntityId`
//!   allocation
//! - the append-only revision list, newest first
//! - the entity table, which only ever grows
//!
//! The revision list and the entity table are mutated only under a single
//! mutex. Entity inserts and head installs take the same lock, so a body
//! is always in the table before any revision that points at it becomes
//! visible.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. head() - read the current head
//! 2. source.diff(head) - changes landed since the session started
//! 3. delta.merge(head_delta) - rebase; any key overlap aborts the commit
//! 4. source.apply(rebased) - the candidate next revision
//! 5. install_if_head_unchanged - push only if the head did not move
//! 6. on a lost install race, retry from step 1 (up to MAX_RETRY)
//! ```
//!
//! The head comparison in step 5 is by identity, not structure: two
//! equal-looking revisions installed at different times are different
//! points in the timeline.

use parking_lot::Mutex;
use smalltable_core::{Delta, Entity, EntityId, Reference, Result, Revision};
use smalltable_durability::{read_image, write_image, RepositoryImage};
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::session::Session;

/// Number of install attempts before `commit` gives up
const MAX_RETRY: usize = 5;

/// Shared store holding the entity table and the revision list
///
/// Sessions hold the repository behind an `Arc` and drive all shared
/// mutation through it.
pub struct Repository {
    /// Reference allocation sequence
    ///
    /// Holds the last value handed out. Monotonically increasing;
    /// references are never reused.
    reference_seq: AtomicU64,

    /// EntityId allocation sequence, separate from references
    entity_id_seq: AtomicU64,

    /// Revision list and entity table, guarded together
    state: Mutex<RepositoryState>,
}

struct RepositoryState {
    /// All revisions, newest first; the front element is the head
    revisions: VecDeque<Arc<Revision>>,
    /// Every entity body ever prepared; entries are never removed or
    /// replaced
    entities: HashMap<EntityId, Entity>,
}

impl Repository {
    /// Create an empty repository
    ///
    /// The revision list starts with the empty revision as head.
    pub fn new() -> Self {
        let mut revisions = VecDeque::new();
        revisions.push_front(Arc::new(Revision::empty()));
        Repository {
            reference_seq: AtomicU64::new(0),
            entity_id_seq: AtomicU64::new(0),
            state: Mutex::new(RepositoryState {
                revisions,
                entities: HashMap::new(),
            }),
        }
    }

    /// Open a new session pinned to the current head
    pub fn create_session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self), self.head())
    }

    /// Allocate a fresh reference
    ///
    /// # Panics
    ///
    /// Panics if the reference sequence reaches `u64::MAX` (overflow).
    pub fn allocate_reference(&self) -> Reference {
        let previous = self
            .reference_seq
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .expect("reference sequence overflow: u64::MAX reached");
        Reference::new(previous + 1)
    }

    /// Allocate `count` fresh entity ids in one atomic step
    ///
    /// Only uniqueness and monotonicity are guaranteed; concurrent
    /// callers may observe interleaved ranges.
    ///
    /// # Panics
    ///
    /// Panics if the entity id sequence would overflow `u64::MAX`.
    pub fn allocate_entity_ids(&self, count: usize) -> Vec<EntityId> {
        let count = count as u64;
        let previous = self
            .entity_id_seq
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                v.checked_add(count)
            })
            .expect("entity id sequence overflow: u64::MAX reached");
        (1..=count).map(|i| EntityId::new(previous + i)).collect()
    }

    /// Current head revision
    pub fn head(&self) -> Arc<Revision> {
        let state = self.state.lock();
        Arc::clone(head_of(&state))
    }

    /// Number of revisions in the list, the initial empty one included
    pub fn revision_count(&self) -> usize {
        self.state.lock().revisions.len()
    }

    /// Look up an entity body by id
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.state.lock().entities.get(&id).cloned()
    }

    /// Store entity bodies and return the id assigned to each
    ///
    /// Allocates one fresh id per input and inserts the bodies into the
    /// entity table. The returned map goes from each entity's self
    /// reference to its new id; if several inputs share a self reference
    /// every body is stored but the last id wins in the map. Keeping the
    /// inputs distinct is the caller's job.
    ///
    /// Bodies stored here become reachable only once a commit installs a
    /// revision pointing at them; until then they are just table entries.
    pub fn prepare(&self, entities: impl IntoIterator<Item = Entity>) -> HashMap<Reference, EntityId> {
        let entities: Vec<Entity> = entities.into_iter().collect();
        let ids = self.allocate_entity_ids(entities.len());

        let mut state = self.state.lock();
        let mut result = HashMap::new();
        for (entity, id) in entities.into_iter().zip(ids) {
            debug_assert!(!state.entities.contains_key(&id));
            result.insert(entity.self_reference(), id);
            state.entities.insert(id, entity);
        }
        result
    }

    /// Install `delta`, computed against `source`, atop the current head
    ///
    /// Rebases the delta over everything that landed since `source` and
    /// pushes the result as the new head. Returns the installed revision,
    /// or `None` when the rebase hits a key overlap or every install
    /// attempt lost the race. The two failure causes are not
    /// distinguished; in both cases repository state is unchanged by this
    /// call.
    pub fn commit(&self, source: &Arc<Revision>, delta: &Delta) -> Option<Arc<Revision>> {
        for attempt in 1..=MAX_RETRY {
            let head = self.head();

            // Changes landed at the head since the session started.
            let head_delta = source.diff(&head);

            let Some(rebased) = delta.merge(&head_delta) else {
                tracing::debug!(attempt, "commit rebase overlaps changes at head");
                return None;
            };

            let next = Arc::new(source.apply(&rebased));
            if self.install_if_head_unchanged(&head, Arc::clone(&next)) {
                tracing::debug!(attempt, "installed new head revision");
                return Some(next);
            }

            tracing::debug!(attempt, "head moved during install, retrying");
        }

        tracing::warn!(
            retries = MAX_RETRY,
            "commit gave up after losing every install race"
        );
        None
    }

    /// Atomic check-and-push on the revision list
    ///
    /// Pushes `next` as the new head only if the current head is still
    /// identity-equal to `expected`.
    fn install_if_head_unchanged(&self, expected: &Arc<Revision>, next: Arc<Revision>) -> bool {
        let mut state = self.state.lock();
        if Arc::ptr_eq(head_of(&state), expected) {
            state.revisions.push_front(next);
            true
        } else {
            false
        }
    }

    /// Export the complete repository state for serialization
    pub fn to_image(&self) -> RepositoryImage {
        let state = self.state.lock();
        RepositoryImage {
            revisions: state.revisions.iter().map(|r| (**r).clone()).collect(),
            entities: state
                .entities
                .iter()
                .map(|(id, entity)| (*id, entity.clone()))
                .collect(),
            reference_seq: self.reference_seq.load(Ordering::SeqCst),
            entity_id_seq: self.entity_id_seq.load(Ordering::SeqCst),
        }
    }

    /// Rebuild a repository from a previously exported image
    ///
    /// Both sequences resume at the maximum of the persisted counter and
    /// the highest identifier appearing anywhere in the image, so a stale
    /// counter can never hand out an identifier twice.
    pub fn from_image(image: RepositoryImage) -> Self {
        let reference_seq = image.reference_seq.max(image.max_reference());
        let entity_id_seq = image.entity_id_seq.max(image.max_entity_id());

        let mut revisions: VecDeque<Arc<Revision>> =
            image.revisions.into_iter().map(Arc::new).collect();
        if revisions.is_empty() {
            revisions.push_front(Arc::new(Revision::empty()));
        }

        Repository {
            reference_seq: AtomicU64::new(reference_seq),
            entity_id_seq: AtomicU64::new(entity_id_seq),
            state: Mutex::new(RepositoryState {
                revisions,
                entities: image.entities.into_iter().collect(),
            }),
        }
    }

    /// Dump the repository to a byte stream
    pub fn save_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_image(&self.to_image(), writer)
    }

    /// Restore a repository from a byte stream
    pub fn load_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Repository::from_image(read_image(reader)?))
    }
}

impl Default for Repository {
    fn default() -> Self {
        Repository::new()
    }
}

fn head_of(state: &RepositoryState) -> &Arc<Revision> {
    state
        .revisions
        .front()
        .expect("revision list is never empty")
}
