//! Error types for SmallTable
//!
//! This module defines the unified error type shared by all crates.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! ## Error Classification
//!
//! - **Temporal failures (`Conflict`)**: a save raced with changes that
//!   landed at the head after the session started. These are retryable
//!   with a freshly computed set of changes.
//! - **Structural failures** (`DuplicateProperty`, `ForeignObject`,
//!   `SessionConsumed`, `UnknownObject`): the input itself is wrong and
//!   must change before the operation can succeed.
//! - **Persistence failures** (`Corruption`, `Serialization`, `Io`): the
//!   snapshot byte stream could not be written or read back.
//!
//! Lookups of absent names, references, or ids are not errors; those
//! surface as `Option::None` at the call site.

use crate::ident::Reference;
use std::io;
use thiserror::Error;

/// Result type alias for SmallTable operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the SmallTable store
#[derive(Debug, Error)]
pub enum Error {
    /// A property with this name was already added to the entity
    #[error("property \"{name}\" already exists")]
    DuplicateProperty {
        /// Name of the duplicated property
        name: String,
    },

    /// A property value or root object belongs to a different table
    #[error("object is owned by a different table")]
    ForeignObject,

    /// Commit could not produce a rebased delta, or lost every install race
    ///
    /// The two causes are deliberately not distinguished. Both mean the
    /// save failed and repository state is unchanged; the caller may retry
    /// with a freshly computed set of changes.
    #[error("commit conflicts with changes already installed at head")]
    Conflict,

    /// The session was already consumed by a successful save
    #[error("session was already consumed by save")]
    SessionConsumed,

    /// A reference did not resolve to any entity in the session snapshot
    #[error("unknown object: {reference}")]
    UnknownObject {
        /// The reference that failed to resolve
        reference: Reference,
    },

    /// Data corruption detected while reading a snapshot
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Snapshot encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Check if this error is a commit conflict
    ///
    /// Used for retry logic - only conflict errors should be retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict)
    }
}
