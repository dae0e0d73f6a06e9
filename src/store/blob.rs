//! Key-addressed storage for uploaded audio blobs.

use crate::error::{Result, ScrivError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Opaque binary storage keyed by generated ids.
///
/// Implementations must be safe to call from async context; writes replace
/// the whole value for a key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns the generated id.
    async fn put(&self, bytes: &[u8]) -> Result<String>;

    /// Loads the blob for `id`, or `None` if absent.
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;
}

/// Filesystem blob store: one file per blob under `<root>/blobs/`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join("blobs").join(id)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let path = self.blob_path(&id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ScrivError::Store {
                message: format!("Failed to create blob directory: {}", e),
            })?;
        }
        fs::write(&path, bytes).map_err(|e| ScrivError::Store {
            message: format!("Failed to write blob {}: {}", id, e),
        })?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        read_optional(&self.blob_path(id))
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ScrivError::Store {
            message: format!("Failed to read {}: {}", path.display(), e),
        }),
    }
}

/// In-memory blob store for tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a blob under a caller-chosen id, bypassing id generation.
    pub fn insert(&self, id: &str, bytes: Vec<u8>) {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), bytes);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert(&id, bytes.to_vec());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }
}
