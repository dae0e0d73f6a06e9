//! Transcription pipeline: ingest, queue, per-record worker, progress.

pub mod progress;
pub mod queue;
pub mod worker;

pub use progress::{Clock, ProgressEstimator, SystemClock};
pub use queue::{CancelToken, QueueConfig, TranscriptionQueue, select_next};
pub use worker::{ProgressFn, WorkerContext, process_record};

use crate::audio::decode;
use crate::error::Result;
use crate::record::TranscriptRecord;
use crate::store::{BlobStore, RecordStore};
use std::path::Path;

/// Accepts an uploaded file: decodes it for metadata, persists the raw bytes
/// as a blob, and creates the `pending` record keyed by the blob id.
pub async fn ingest_file(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    path: &Path,
) -> Result<TranscriptRecord> {
    let bytes = std::fs::read(path)?;
    let decoded = decode::decode_wav_bytes(&bytes)?;

    let id = blobs.put(&bytes).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();

    let record = TranscriptRecord::new(
        id,
        name.as_str(),
        decode::format_tag(&name),
        bytes.len() as u64,
        decoded.length,
        decoded.duration,
        decoded.sample_rate,
        decoded.channels,
    );
    records.put(&record).await?;
    Ok(record)
}
