//! Durability layer for SmallTable
//!
//! This crate implements the persisted form of a repository:
//! - RepositoryImage: the self-contained serializable state graph
//! - Snapshot format: header + bincode payload + CRC32 footer
//! - Stream and crash-safe file read/write entry points
//!
//! The format is a transparent dump/restore of the whole repository.
//! Restoring a dump reproduces the head revision exactly, and both
//! identifier sequences resume above every identifier appearing anywhere
//! in the persisted state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod image;
pub mod snapshot;

pub use image::RepositoryImage;
pub use snapshot::{
    read_image, read_image_file, write_image, write_image_file, SNAPSHOT_FORMAT_VERSION,
    SNAPSHOT_MAGIC,
};
