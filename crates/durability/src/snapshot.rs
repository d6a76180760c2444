//! Snapshot byte-stream format
//!
//! Layout:
//!
//! ```text
//! +--------------------+---------------------+-------------------+
//! | header (20 bytes)  | payload (bincode)   | footer (4 bytes)  |
//! | magic  u32 version | RepositoryImage     | CRC32 of header   |
//! | 8B     + u64 len   |                     | + payload (LE)    |
//! +--------------------+---------------------+-------------------+
//! ```
//!
//! The reader rejects a bad magic, an unknown format version, truncation
//! at any point, and a CRC mismatch, all as [`Error::Corruption`].
//!
//! The file entry points use the write-fsync-rename pattern so that
//! either the complete snapshot exists on disk or the previous one does;
//! a partial snapshot is never visible under the final path.

use crate::image::RepositoryImage;
use smalltable_core::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// Magic bytes at the start of every snapshot
pub const SNAPSHOT_MAGIC: [u8; 8] = *b"STBLSNAP";

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8 + 4 + 8;

/// Write an image to a byte stream
pub fn write_image<W: Write>(image: &RepositoryImage, writer: &mut W) -> Result<()> {
    let payload =
        bincode::serialize(image).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&SNAPSHOT_MAGIC);
    header.extend_from_slice(&SNAPSHOT_FORMAT_VERSION.to_le_bytes());
    header.extend_from_slice(&(payload.len() as u64).to_le_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header);
    hasher.update(&payload);
    let crc = hasher.finalize();

    writer.write_all(&header)?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Read an image back from a byte stream
pub fn read_image<R: Read>(reader: &mut R) -> Result<RepositoryImage> {
    let mut header = [0u8; HEADER_LEN];
    fill(reader, &mut header, "header")?;

    if header[..8] != SNAPSHOT_MAGIC {
        return Err(Error::Corruption("snapshot magic mismatch".to_string()));
    }
    let version = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    if version != SNAPSHOT_FORMAT_VERSION {
        return Err(Error::Corruption(format!(
            "unsupported snapshot format version {version}"
        )));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[12..20]);
    let payload_len = u64::from_le_bytes(len_bytes);

    let mut payload = Vec::new();
    let mut taken = reader.take(payload_len);
    taken.read_to_end(&mut payload)?;
    if payload.len() as u64 != payload_len {
        return Err(Error::Corruption(format!(
            "snapshot truncated: payload has {} of {} bytes",
            payload.len(),
            payload_len
        )));
    }

    let mut footer = [0u8; 4];
    fill(taken.get_mut(), &mut footer, "footer")?;
    let stored_crc = u32::from_le_bytes(footer);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header);
    hasher.update(&payload);
    let computed_crc = hasher.finalize();
    if stored_crc != computed_crc {
        return Err(Error::Corruption(format!(
            "snapshot CRC mismatch: stored {stored_crc:08x}, computed {computed_crc:08x}"
        )));
    }

    let image: RepositoryImage =
        bincode::deserialize(&payload).map_err(|e| Error::Serialization(e.to_string()))?;
    if image.revisions.is_empty() {
        return Err(Error::Corruption(
            "snapshot contains no revisions".to_string(),
        ));
    }
    Ok(image)
}

/// Write an image to a file using the write-fsync-rename pattern
pub fn write_image_file(image: &RepositoryImage, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&temp_path)?;
    write_image(image, &mut file)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}

/// Read an image back from a file
pub fn read_image_file(path: &Path) -> Result<RepositoryImage> {
    let mut reader = BufReader::new(File::open(path)?);
    read_image(&mut reader)
}

/// Read exactly `buf.len()` bytes, reporting EOF as corruption
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Corruption(format!("snapshot truncated while reading {what}"))
        } else {
            Error::Io(e)
        }
    })
}
