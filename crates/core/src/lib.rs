//! Core types for SmallTable
//!
//! This crate defines the foundational types used throughout the system:
//! - Reference: stable identity of an object across revisions
//! - EntityId: identity of one immutable snapshot of an object's contents
//! - Value: closed property value enum (Int, String, Ref)
//! - Entity: immutable property map tagged with its own Reference
//! - Revision: immutable snapshot of the whole repository state
//! - Delta: difference between two revisions, with explicit tombstones
//! - Error: error type hierarchy shared by all crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delta;
pub mod entity;
pub mod error;
pub mod ident;
pub mod revision;
pub mod value;

pub use delta::Delta;
pub use entity::{Entity, EntityBuilder};
pub use error::{Error, Result};
pub use ident::{EntityId, Reference};
pub use revision::Revision;
pub use value::Value;
