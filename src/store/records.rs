//! Durable storage for transcript records.
//!
//! Records are JSON documents replaced whole on every write. The filesystem
//! implementation writes to a temp file and renames it into place, so a
//! reader never observes a partially written record.

use crate::error::{Result, ScrivError};
use crate::record::TranscriptRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Key-addressed record storage with replace-on-write semantics.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores `record` under its id, replacing any previous version.
    async fn put(&self, record: &TranscriptRecord) -> Result<()>;

    /// Loads the record for `id`, or `None` if absent.
    async fn get(&self, id: &str) -> Result<Option<TranscriptRecord>>;

    /// Returns all records, in no particular order.
    async fn list_all(&self) -> Result<Vec<TranscriptRecord>>;
}

/// Filesystem record store: `<root>/records/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join("records")
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.records_dir().join(format!("{}.json", id))
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn put(&self, record: &TranscriptRecord) -> Result<()> {
        let dir = self.records_dir();
        fs::create_dir_all(&dir).map_err(|e| ScrivError::Store {
            message: format!("Failed to create records directory: {}", e),
        })?;

        let json = serde_json::to_vec_pretty(record).map_err(|e| ScrivError::Store {
            message: format!("Failed to serialize record {}: {}", record.id, e),
        })?;

        // Write-then-rename keeps the replace atomic for concurrent readers.
        let final_path = self.record_path(&record.id);
        let tmp_path = dir.join(format!("{}.json.tmp", record.id));
        fs::write(&tmp_path, &json).map_err(|e| ScrivError::Store {
            message: format!("Failed to write record {}: {}", record.id, e),
        })?;
        fs::rename(&tmp_path, &final_path).map_err(|e| ScrivError::Store {
            message: format!("Failed to commit record {}: {}", record.id, e),
        })?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<TranscriptRecord>> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ScrivError::Store {
                    message: format!("Failed to read record {}: {}", id, e),
                });
            }
        };
        let record = serde_json::from_slice(&bytes).map_err(|e| ScrivError::Store {
            message: format!("Failed to parse record {}: {}", id, e),
        })?;
        Ok(Some(record))
    }

    async fn list_all(&self) -> Result<Vec<TranscriptRecord>> {
        let dir = self.records_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ScrivError::Store {
                    message: format!("Failed to list records: {}", e),
                });
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ScrivError::Store {
                message: format!("Failed to list records: {}", e),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| ScrivError::Store {
                message: format!("Failed to read {}: {}", path.display(), e),
            })?;
            let record = serde_json::from_slice(&bytes).map_err(|e| ScrivError::Store {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// In-memory record store for tests.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, TranscriptRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &TranscriptRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<TranscriptRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<TranscriptRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TranscriptStatus;

    fn make_record(id: &str) -> TranscriptRecord {
        TranscriptRecord::new(id, "file.wav", "wav", 10, 160, 0.01, 16_000, 1)
    }

    #[tokio::test]
    async fn test_fs_record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());

        let record = make_record("r1");
        store.put(&record).await.unwrap();

        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_fs_record_replace_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());

        let mut record = make_record("r1");
        store.put(&record).await.unwrap();

        record.status = TranscriptStatus::Processing;
        store.put(&record).await.unwrap();

        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded.status, TranscriptStatus::Processing);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fs_record_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_list_all_empty_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path().join("never-created"));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fs_list_all_returns_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());

        store.put(&make_record("a")).await.unwrap();
        store.put(&make_record("b")).await.unwrap();
        store.put(&make_record("c")).await.unwrap();

        let mut ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fs_list_all_skips_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        store.put(&make_record("a")).await.unwrap();

        // A leftover temp file from an interrupted write must not break listing.
        std::fs::write(dir.path().join("records/b.json.tmp"), b"{").unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_record_store() {
        let store = MemoryRecordStore::new();
        store.put(&make_record("a")).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
