//! Single-flight transcription queue.
//!
//! The queue is an owned object with an explicit `enqueue` contract: no
//! ambient global state. One scheduler task drains `pending` records
//! sequentially, newest first, so at most one record is ever `processing`
//! process-wide. Each in-flight record carries its own [`CancelToken`],
//! honored at chunk boundaries.

use crate::audio::segmenter::SegmenterConfig;
use crate::defaults;
use crate::error::{Result, ScrivError};
use crate::pipeline::worker::{self, ProgressFn, WorkerContext};
use crate::record::{TranscriptRecord, TranscriptStatus};
use crate::store::{BlobStore, RecordStore};
use crate::stt::engine::SpeechEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Cooperative cancellation flag for one in-flight record.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Queue-wide transcription settings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Language hint passed to the engine per chunk.
    pub language: String,
    /// Thread budget for a single-chunk record; divided across chunks.
    pub threads: usize,
    /// Segmentation settings applied to every record.
    pub segmenter: SegmenterConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: defaults::default_threads(),
            segmenter: SegmenterConfig::default(),
        }
    }
}

struct InFlight {
    id: String,
    cancel: CancelToken,
}

struct QueueInner {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    engine: Arc<dyn SpeechEngine>,
    config: QueueConfig,
    progress: Option<ProgressFn>,
    in_flight: Mutex<Option<InFlight>>,
    /// Signalled on enqueue to wake an idle scheduler.
    wake: Notify,
    /// Signalled whenever a record finishes or the queue drains.
    idle: Notify,
}

impl QueueInner {
    fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            records: Arc::clone(&self.records),
            blobs: Arc::clone(&self.blobs),
            engine: Arc::clone(&self.engine),
            segmenter: self.config.segmenter.clone(),
            language: self.config.language.clone(),
            threads: self.config.threads,
            progress: self.progress.clone(),
        }
    }

    fn on_record_finished(&self) {
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.idle.notify_waiters();
    }
}

/// Owns the scheduler task driving the single-flight queue.
///
/// Dropping the queue aborts the scheduler; records stay durable in the
/// store and resume on the next run.
pub struct TranscriptionQueue {
    inner: Arc<QueueInner>,
    scheduler: JoinHandle<()>,
}

impl TranscriptionQueue {
    /// Creates the queue and starts its scheduler task.
    ///
    /// Records already `pending` in the store are picked up immediately.
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<dyn SpeechEngine>,
        config: QueueConfig,
        progress: Option<ProgressFn>,
    ) -> Self {
        let inner = Arc::new(QueueInner {
            records,
            blobs,
            engine,
            config,
            progress,
            in_flight: Mutex::new(None),
            wake: Notify::new(),
            idle: Notify::new(),
        });
        let scheduler = tokio::spawn(scheduler_loop(Arc::clone(&inner)));
        Self { inner, scheduler }
    }

    /// Persists a record and offers it to the scheduler.
    pub async fn enqueue(&self, record: &TranscriptRecord) -> Result<()> {
        self.inner.records.put(record).await?;
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Wakes the scheduler to re-scan the store for pending records.
    pub fn poke(&self) {
        self.inner.wake.notify_one();
    }

    /// Cancels a record.
    ///
    /// An in-flight record has its token raised and stops at the next chunk
    /// boundary; a `pending` record moves straight to `cancelled`. Records
    /// already terminal are left untouched.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        {
            let guard = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(in_flight) = guard.as_ref()
                && in_flight.id == id
            {
                in_flight.cancel.cancel();
                return Ok(());
            }
        }

        let mut record = self
            .inner
            .records
            .get(id)
            .await?
            .ok_or_else(|| ScrivError::RecordNotFound { id: id.to_string() })?;
        if record.status == TranscriptStatus::Pending {
            record.status = TranscriptStatus::Cancelled;
            record.touch();
            self.inner.records.put(&record).await?;
        }

        // The scheduler may have taken the record in flight while we were
        // looking at the store; raise its token as well so the worker's own
        // terminal write wins with `cancelled`.
        let guard = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(in_flight) = guard.as_ref()
            && in_flight.id == id
        {
            in_flight.cancel.cancel();
        }
        Ok(())
    }

    /// Id of the record currently in flight, if any.
    pub fn processing_id(&self) -> Option<String> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|f| f.id.clone())
    }

    /// True when nothing is in flight and no record is pending.
    pub async fn is_idle(&self) -> Result<bool> {
        if self.processing_id().is_some() {
            return Ok(false);
        }
        Ok(select_next(self.inner.records.as_ref()).await?.is_none())
    }

    /// Waits until the queue has fully drained.
    pub async fn wait_until_idle(&self) -> Result<()> {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle().await? {
                return Ok(());
            }
            notified.await;
        }
    }
}

impl Drop for TranscriptionQueue {
    fn drop(&mut self) {
        self.scheduler.abort();
    }
}

/// Picks the next record to process: most recently created `pending` first.
///
/// New uploads preempt older queued ones for the next slot; a record already
/// in flight is never preempted.
pub async fn select_next(records: &dyn RecordStore) -> Result<Option<TranscriptRecord>> {
    let all = records.list_all().await?;
    Ok(all
        .into_iter()
        .filter(|r| r.status == TranscriptStatus::Pending)
        .max_by(|a, b| {
            (a.created_at, a.id.as_str()).cmp(&(b.created_at, b.id.as_str()))
        }))
}

async fn scheduler_loop(inner: Arc<QueueInner>) {
    loop {
        let next = match select_next(inner.records.as_ref()).await {
            Ok(next) => next,
            Err(e) => {
                eprintln!("scriv: failed to scan queue: {e}");
                None
            }
        };

        match next {
            Some(record) => {
                let cancel = CancelToken::new();
                {
                    let mut guard =
                        inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
                    *guard = Some(InFlight {
                        id: record.id.clone(),
                        cancel: cancel.clone(),
                    });
                }

                let ctx = inner.worker_context();
                let outcome = worker::process_record(&ctx, record, &cancel).await;
                inner.on_record_finished();
                if let Err(e) = outcome {
                    // Persisting the terminal state failed; the record may
                    // still look pending, so don't rescan until new work
                    // arrives or we'd spin on the same store failure.
                    eprintln!("scriv: failed to persist record state: {e}");
                    inner.wake.notified().await;
                }
            }
            None => {
                inner.idle.notify_waiters();
                inner.wake.notified().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    fn record_created_at(id: &str, created_at: u64) -> TranscriptRecord {
        let mut record =
            TranscriptRecord::new(id, "file.wav", "wav", 1, 16_000, 1.0, 16_000, 1);
        record.created_at = created_at;
        record
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        // Clones observe the same flag
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_select_next_prefers_newest() {
        let store = MemoryRecordStore::new();
        store.put(&record_created_at("old", 100)).await.unwrap();
        store.put(&record_created_at("new", 200)).await.unwrap();
        store.put(&record_created_at("mid", 150)).await.unwrap();

        let next = select_next(&store).await.unwrap().unwrap();
        assert_eq!(next.id, "new");
    }

    #[tokio::test]
    async fn test_select_next_skips_non_pending() {
        let store = MemoryRecordStore::new();
        let mut done = record_created_at("done", 300);
        done.status = TranscriptStatus::Completed;
        store.put(&done).await.unwrap();
        store.put(&record_created_at("queued", 100)).await.unwrap();

        let next = select_next(&store).await.unwrap().unwrap();
        assert_eq!(next.id, "queued");
    }

    #[tokio::test]
    async fn test_select_next_empty() {
        let store = MemoryRecordStore::new();
        assert!(select_next(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_select_next_breaks_timestamp_ties_by_id() {
        let store = MemoryRecordStore::new();
        store.put(&record_created_at("aaa", 100)).await.unwrap();
        store.put(&record_created_at("zzz", 100)).await.unwrap();

        let next = select_next(&store).await.unwrap().unwrap();
        assert_eq!(next.id, "zzz");
    }
}
