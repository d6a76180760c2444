//! Client facade: tables, object handles, and dirty tracking
//!
//! A `Table` wraps one [`Session`] and presents the repository as a graph
//! of mutable-looking objects. Objects are addressed through
//! [`ObjectHandle`] values rather than owned structs, so the graph can be
//! cyclic without back pointers: a handle names its owning table and the
//! object's reference, and all state lives in the table's own maps.
//!
//! Every handle is validated against the owning table when it is used as
//! a root or as a property value; a handle minted by a different table is
//! rejected. Reads resolve lazily against the session and cache the
//! loaded object per reference.
//!
//! `save` collects every created or actually-modified object into an
//! entity body and drives the session's one-shot save.

use smalltable_core::{Entity, Error, Reference, Result, Revision, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::session::Session;

/// Process-wide table id sequence
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one table within this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TableId(u64);

impl TableId {
    fn next() -> Self {
        TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to an object managed by a [`Table`]
///
/// Plain value: cheap to copy and to store. A handle is only usable with
/// the table that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    table: TableId,
    reference: Reference,
}

impl ObjectHandle {
    /// The repository-wide reference this handle points at
    pub fn reference(&self) -> Reference {
        self.reference
    }
}

/// Property value as seen by facade callers
///
/// Mirrors the storable [`Value`] kinds, with object links expressed as
/// handles instead of raw references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// 64-bit signed integer
    Int(i64),
    /// UTF-8 string
    String(String),
    /// Link to another object of the same table
    Object(ObjectHandle),
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Int(i as i64)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<ObjectHandle> for PropertyValue {
    fn from(handle: ObjectHandle) -> Self {
        PropertyValue::Object(handle)
    }
}

/// Dirty-tracked state of one loaded or created object
#[derive(Debug)]
struct ObjectState {
    /// Properties as loaded from the session snapshot; empty for a fresh
    /// object
    source: HashMap<String, Value>,
    /// Staged writes; a `None` value removes the property
    modified: HashMap<String, Option<Value>>,
}

impl ObjectState {
    fn fresh() -> Self {
        ObjectState {
            source: HashMap::new(),
            modified: HashMap::new(),
        }
    }

    fn from_entity(entity: &Entity) -> Self {
        ObjectState {
            source: entity.properties().clone(),
            modified: HashMap::new(),
        }
    }

    /// Staged value wins over source; a staged `None` hides the source
    /// value
    fn get(&self, name: &str) -> Option<&Value> {
        match self.modified.get(name) {
            Some(change) => change.as_ref(),
            None => self.source.get(name),
        }
    }

    fn set(&mut self, name: String, value: Option<Value>) {
        self.modified.insert(name, value);
    }

    /// Check for real changes, pruning staged writes that match the
    /// source along the way
    fn is_modified(&mut self) -> bool {
        let source = &self.source;
        self.modified.retain(|name, change| match (change.as_ref(), source.get(name)) {
            (None, None) => false,
            (Some(value), Some(original)) => value != original,
            _ => true,
        });
        !self.modified.is_empty()
    }

    /// Materialize the current view as an entity body
    fn to_entity(&self, reference: Reference) -> Entity {
        let mut properties = self.source.clone();
        for (name, change) in &self.modified {
            match change {
                None => {
                    properties.remove(name);
                }
                Some(value) => {
                    properties.insert(name.clone(), value.clone());
                }
            }
        }
        Entity::new(reference, properties)
    }
}

/// Client facade over one session
///
/// Tracks created objects, caches resolved ones, and turns the dirty set
/// into entities on save. Consumed by `save`, like the session beneath
/// it.
pub struct Table {
    id: TableId,
    session: Session,
    objects: HashMap<Reference, ObjectState>,
    created: HashSet<Reference>,
}

impl Table {
    /// Create a table over a session
    pub fn new(session: Session) -> Self {
        Table {
            id: TableId::next(),
            session,
            objects: HashMap::new(),
            created: HashSet::new(),
        }
    }

    /// Create a new empty object
    ///
    /// The object exists only in this table until `save`; it always
    /// counts as dirty.
    pub fn new_object(&mut self) -> ObjectHandle {
        let reference = self.session.allocate_reference();
        self.objects.insert(reference, ObjectState::fresh());
        self.created.insert(reference);
        ObjectHandle {
            table: self.id,
            reference,
        }
    }

    /// Look up the root object registered under `name`
    ///
    /// Staged root changes win over the session's start revision.
    /// Returns `None` for an unbound name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownObject`] if the name is bound to a
    /// reference that does not resolve in the session snapshot.
    pub fn root(&mut self, name: &str) -> Result<Option<ObjectHandle>> {
        match self.session.bound(name) {
            None => Ok(None),
            Some(reference) => self.resolve(reference).map(Some),
        }
    }

    /// Register or remove a root object
    ///
    /// `None` removes the root name; the object itself is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignObject`] for a handle minted by another
    /// table, and [`Error::SessionConsumed`] after save.
    pub fn set_root(&mut self, name: &str, object: Option<ObjectHandle>) -> Result<()> {
        if let Some(handle) = object {
            self.check_ownership(handle)?;
        }
        self.session
            .bind(name, object.map(|handle| handle.reference))
    }

    /// Set a property on an object
    ///
    /// Object-valued properties are stored as references; the target must
    /// belong to this table.
    ///
    /// # Errors
    ///
    /// [`Error::ForeignObject`] when `object` or an object-valued
    /// `value` belongs to another table; [`Error::UnknownObject`] when
    /// the handle's object is not loaded here.
    pub fn set_property(
        &mut self,
        object: ObjectHandle,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.check_ownership(object)?;
        let stored = self.to_value(value.into())?;
        let state = self
            .objects
            .get_mut(&object.reference)
            .ok_or(Error::UnknownObject {
                reference: object.reference,
            })?;
        state.set(name.into(), Some(stored));
        Ok(())
    }

    /// Remove a property from an object
    pub fn clear_property(&mut self, object: ObjectHandle, name: impl Into<String>) -> Result<()> {
        self.check_ownership(object)?;
        let state = self
            .objects
            .get_mut(&object.reference)
            .ok_or(Error::UnknownObject {
                reference: object.reference,
            })?;
        state.set(name.into(), None);
        Ok(())
    }

    /// Read a property, staged writes first
    ///
    /// A reference-valued property resolves to a handle, loading the
    /// target object into this table if needed.
    pub fn get_property(
        &mut self,
        object: ObjectHandle,
        name: &str,
    ) -> Result<Option<PropertyValue>> {
        self.check_ownership(object)?;
        let state = self
            .objects
            .get(&object.reference)
            .ok_or(Error::UnknownObject {
                reference: object.reference,
            })?;
        let value = state.get(name).cloned();
        match value {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(PropertyValue::Int(i))),
            Some(Value::String(s)) => Ok(Some(PropertyValue::String(s))),
            Some(Value::Ref(reference)) => {
                let handle = self.resolve(reference)?;
                Ok(Some(PropertyValue::Object(handle)))
            }
        }
    }

    /// Save all created or modified objects
    ///
    /// Consumes the table. On success returns the installed revision; a
    /// conflict surfaces as [`Error::Conflict`] with repository state
    /// unchanged.
    pub fn save(mut self) -> Result<Arc<Revision>> {
        let references: Vec<Reference> = self.objects.keys().copied().collect();
        let mut dirty = Vec::new();
        for reference in references {
            if let Some(state) = self.objects.get_mut(&reference) {
                if self.created.contains(&reference) || state.is_modified() {
                    dirty.push(state.to_entity(reference));
                }
            }
        }
        self.session.save(dirty)
    }

    /// Resolve a reference into a cached or freshly loaded handle
    fn resolve(&mut self, reference: Reference) -> Result<ObjectHandle> {
        if !self.objects.contains_key(&reference) {
            let entity = self
                .session
                .resolve(reference)
                .ok_or(Error::UnknownObject { reference })?;
            self.objects
                .insert(reference, ObjectState::from_entity(&entity));
        }
        Ok(ObjectHandle {
            table: self.id,
            reference,
        })
    }

    fn check_ownership(&self, handle: ObjectHandle) -> Result<()> {
        if handle.table != self.id {
            return Err(Error::ForeignObject);
        }
        Ok(())
    }

    fn to_value(&self, value: PropertyValue) -> Result<Value> {
        match value {
            PropertyValue::Int(i) => Ok(Value::Int(i)),
            PropertyValue::String(s) => Ok(Value::String(s)),
            PropertyValue::Object(handle) => {
                self.check_ownership(handle)?;
                Ok(Value::Ref(handle.reference))
            }
        }
    }
}
