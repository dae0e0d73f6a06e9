//! Persistent local storage: audio blobs and transcript records.

pub mod blob;
pub mod records;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use records::{FsRecordStore, MemoryRecordStore, RecordStore};

use std::path::PathBuf;

/// Default store root directory.
///
/// Uses `~/.local/share/scriv/` on Linux/Unix.
pub fn default_store_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("scriv")
}
