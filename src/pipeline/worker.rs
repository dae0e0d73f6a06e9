//! Per-record processing: decode, segment, transcribe, persist.
//!
//! One call to [`process_record`] drives a single record from `processing`
//! to a terminal status. Chunks are transcribed strictly in order; output
//! timestamps are re-based onto the end of the previously accepted output,
//! which tolerates the engine trimming leading or trailing silence inside a
//! chunk. Any failure discards the partial output and marks the record
//! `error`; other records are never affected.

use crate::audio::segmenter::{SegmenterConfig, segment};
use crate::audio::{DecodedAudio, decode_wav_bytes};
use crate::defaults;
use crate::error::{Result, ScrivError};
use crate::pipeline::progress::ProgressEstimator;
use crate::pipeline::queue::CancelToken;
use crate::record::{TimedSegment, TranscriptRecord, TranscriptStatus};
use crate::store::{BlobStore, RecordStore};
use crate::stt::engine::SpeechEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Progress callback: record id plus blended progress in [0, 1].
pub type ProgressFn = Arc<dyn Fn(&str, f64) + Send + Sync>;

/// Everything a worker needs to process records.
#[derive(Clone)]
pub struct WorkerContext {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub engine: Arc<dyn SpeechEngine>,
    pub segmenter: SegmenterConfig,
    pub language: String,
    pub threads: usize,
    pub progress: Option<ProgressFn>,
}

/// Thread budget per engine call when a record splits into several chunks.
pub fn chunk_thread_budget(threads: usize, chunk_count: usize) -> usize {
    if chunk_count <= 1 {
        threads.max(1)
    } else {
        (threads / chunk_count).max(1)
    }
}

/// Drives one record to a terminal status and persists the result.
///
/// Returns the final record. An `Err` is only returned when the final state
/// itself could not be persisted; every transcription-level failure ends in
/// a persisted `error` status instead.
pub async fn process_record(
    ctx: &WorkerContext,
    mut record: TranscriptRecord,
    cancel: &CancelToken,
) -> Result<TranscriptRecord> {
    if cancel.is_cancelled() {
        record.status = TranscriptStatus::Cancelled;
        record.touch();
        ctx.records.put(&record).await?;
        return Ok(record);
    }

    record.status = TranscriptStatus::Processing;
    record.touch();
    ctx.records.put(&record).await?;

    match transcribe_record(ctx, &record, cancel).await {
        Ok(Some(segments)) => {
            record.segments = segments;
            record.error = None;
            record.status = TranscriptStatus::Completed;
        }
        Ok(None) => {
            record.status = TranscriptStatus::Cancelled;
        }
        Err(e) => {
            record.segments.clear();
            record.error = Some(e.to_string());
            record.status = TranscriptStatus::Error;
        }
    }

    record.touch();
    ctx.records.put(&record).await?;

    if record.status == TranscriptStatus::Completed
        && let Some(progress) = &ctx.progress
    {
        progress(&record.id, 1.0);
    }
    Ok(record)
}

/// Runs the transcription itself. `Ok(None)` means the record was cancelled
/// mid-flight.
async fn transcribe_record(
    ctx: &WorkerContext,
    record: &TranscriptRecord,
    cancel: &CancelToken,
) -> Result<Option<Vec<TimedSegment>>> {
    let bytes = ctx
        .blobs
        .get(&record.id)
        .await?
        .ok_or_else(|| ScrivError::MissingAudio {
            id: record.id.clone(),
        })?;

    let decoded: DecodedAudio = decode_wav_bytes(&bytes)?;

    let estimator = Arc::new(Mutex::new(ProgressEstimator::new(record.duration)));

    // Phase A: model residency, fed by the engine's download reporting.
    {
        let estimator = Arc::clone(&estimator);
        let progress = ctx.progress.clone();
        let id = record.id.clone();
        let hook = move |value: f64| {
            let blended = {
                let mut est = estimator.lock().unwrap_or_else(|e| e.into_inner());
                est.on_download_progress(value);
                est.current()
            };
            if let Some(progress) = &progress {
                progress(&id, blended);
            }
        };
        ctx.engine.prepare(&hook).await?;
    }
    estimator
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .on_download_progress(1.0);

    // Phase B: periodic estimate while chunks are in flight.
    let _ticker = ctx.progress.as_ref().map(|progress| {
        AbortOnDrop(tokio::spawn(progress_ticker(
            Arc::clone(&estimator),
            Arc::clone(progress),
            record.id.clone(),
        )))
    });

    let chunks = segment(&decoded.samples, defaults::SAMPLE_RATE, &ctx.segmenter);
    let thread_budget = chunk_thread_budget(ctx.threads, chunks.len());

    let mut merged: Vec<TimedSegment> = Vec::new();
    for chunk in &chunks {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let engine = Arc::clone(&ctx.engine);
        let language = ctx.language.clone();
        let samples = chunk.to_vec();
        let produced =
            tokio::task::spawn_blocking(move || engine.run(&samples, &language, thread_budget))
                .await
                .map_err(|e| ScrivError::InferenceFailed {
                    message: format!("Inference task panicked: {e}"),
                })??;

        // Re-base onto the end of the accepted output so far, not the chunk's
        // nominal duration.
        let offset = merged.last().map(|s| s.end).unwrap_or(0.0);
        merged.extend(produced.iter().map(|s| s.shifted(offset)));
    }

    Ok(Some(merged))
}

async fn progress_ticker(
    estimator: Arc<Mutex<ProgressEstimator>>,
    progress: ProgressFn,
    id: String,
) {
    let mut interval =
        tokio::time::interval(Duration::from_millis(defaults::PROGRESS_TICK_MS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let value = estimator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current();
        progress(&id, value);
    }
}

/// Aborts the wrapped task when dropped, on every exit path.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
