//! scriv - Offline batch transcription for long audio recordings
//!
//! Files are added to a durable queue, split at natural pauses into roughly
//! one-minute chunks, and fed sequentially through a local Whisper model.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod stt;

// Core data model
pub use record::{TimedSegment, TranscriptRecord, TranscriptStatus};

// Segmenter
pub use audio::segmenter::{SegmenterConfig, segment};

// Pipeline
pub use pipeline::queue::{CancelToken, QueueConfig, TranscriptionQueue};
pub use pipeline::worker::ProgressFn;

// Store and engine seams
pub use store::{BlobStore, RecordStore};
pub use stt::engine::SpeechEngine;

// Error handling
pub use error::{Result, ScrivError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
