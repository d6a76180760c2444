//! # SmallTable
//!
//! An in-memory object graph store with an append-only revision history
//! and optimistic concurrency.
//!
//! Clients open a session pinned to the latest revision, mutate a graph
//! of named properties and cross-object references through a table
//! facade, and save; the repository either installs a new revision atop
//! the latest one or reports a conflict.
//!
//! # Quick Start
//!
//! ```
//! use smalltable::{PropertyValue, Repository, Table};
//! use std::sync::Arc;
//!
//! fn main() -> smalltable::Result<()> {
//!     let repository = Arc::new(Repository::new());
//!
//!     let mut table = Table::new(repository.create_session());
//!     let greeting = table.new_object();
//!     table.set_property(greeting, "value", "hello")?;
//!     table.set_root("greeting", Some(greeting))?;
//!     table.save()?;
//!
//!     let mut table = Table::new(repository.create_session());
//!     let greeting = table.root("greeting")?.expect("saved root");
//!     assert_eq!(
//!         table.get_property(greeting, "value")?,
//!         Some(PropertyValue::String("hello".into()))
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Layer | Crate | Contents |
//! |-------|-------|----------|
//! | Core | `smalltable-core` | References, values, entities, revisions, deltas |
//! | Engine | `smalltable-engine` | Repository, sessions, table facade |
//! | Durability | `smalltable-durability` | Snapshot dump/restore format |
//!
//! Revisions are immutable values; saving never rewrites history. A
//! conflicting save fails as a whole and leaves the repository unchanged,
//! so callers retry with a fresh session when they want to.

pub use smalltable_core::{
    Delta, Entity, EntityBuilder, EntityId, Error, Reference, Result, Revision, Value,
};
pub use smalltable_durability::{
    read_image, read_image_file, write_image, write_image_file, RepositoryImage,
};
pub use smalltable_engine::{ObjectHandle, PropertyValue, Repository, Session, Table};
