//! Durable transcript records and their status state machine.
//!
//! A [`TranscriptRecord`] is the unit of durable state: one uploaded file,
//! its decoded metadata, its transcription output, and a status that only
//! moves forward. Records are replaced whole on every write; there are no
//! partial updates.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One timed span of transcribed text.
///
/// Times are seconds relative to the start of the whole recording once the
/// pipeline has merged chunk outputs; the inference engine produces them
/// relative to the chunk it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TimedSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Returns a copy shifted forward in time by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            text: self.text.clone(),
        }
    }
}

/// Lifecycle status of a transcript record.
///
/// `Pending → Processing → {Completed | Error}`, with `Cancelled` reachable
/// from either non-terminal state by explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl TranscriptStatus {
    /// Returns true if no further transition is allowed from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TranscriptStatus) -> bool {
        use TranscriptStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Error)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

impl std::fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The durable state for one uploaded recording.
///
/// `length`, `duration`, `sample_rate` and `channels` describe the source
/// file as decoded; `segments` is the merged transcription output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    /// Unique, stable identifier; also keys the audio blob.
    pub id: String,
    /// Display name, typically the original file name.
    pub name: String,
    /// Container format tag, e.g. "wav".
    pub format: String,
    /// Source file size in bytes.
    pub size: u64,
    /// Source sample count (frames, per channel).
    pub length: u64,
    /// Source duration in seconds.
    pub duration: f64,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Source channel count.
    pub channels: u16,
    /// Merged, re-timed transcription output.
    pub segments: Vec<TimedSegment>,
    pub status: TranscriptStatus,
    /// Failure detail when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation time, unix milliseconds.
    pub created_at: u64,
    /// Last status/content change, unix milliseconds.
    pub updated_at: u64,
}

impl TranscriptRecord {
    /// Creates a fresh `Pending` record for an accepted upload.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        format: impl Into<String>,
        size: u64,
        length: u64,
        duration: f64,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            name: name.into(),
            format: format.into(),
            size,
            length,
            duration,
            sample_rate,
            channels,
            segments: Vec::new(),
            status: TranscriptStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes the last-update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Formats a time in seconds as `hh:mm:ss.mmm` for transcript display.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> TranscriptRecord {
        TranscriptRecord::new(
            "id-1",
            "meeting.wav",
            "wav",
            1024,
            160_000,
            10.0,
            16_000,
            1,
        )
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = make_record();
        assert_eq!(record.status, TranscriptStatus::Pending);
        assert!(record.segments.is_empty());
        assert!(record.error.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_status_transitions() {
        use TranscriptStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));

        // Backwards and out-of-terminal moves are rejected
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Error.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_terminal_statuses() {
        use TranscriptStatus::*;
        assert!(!Pending.is_terminal());
        assert!(!Processing.is_terminal());
        assert!(Completed.is_terminal());
        assert!(Error.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TranscriptStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let parsed: TranscriptStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, TranscriptStatus::Cancelled);
    }

    #[test]
    fn test_record_roundtrips_through_json() {
        let mut record = make_record();
        record.segments.push(TimedSegment::new(0.0, 2.5, "hello"));
        record.status = TranscriptStatus::Completed;

        let json = serde_json::to_string(&record).unwrap();
        let parsed: TranscriptRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_error_field_omitted_when_none() {
        let record = make_record();
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_shifted_segment() {
        let segment = TimedSegment::new(1.0, 2.0, "text");
        let shifted = segment.shifted(58.5);
        assert_eq!(shifted.start, 59.5);
        assert_eq!(shifted.end, 60.5);
        assert_eq!(shifted.text, "text");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(61.25), "00:01:01.250");
        assert_eq!(format_timestamp(3661.5), "01:01:01.500");
        // Negative inputs clamp to zero rather than wrapping
        assert_eq!(format_timestamp(-1.0), "00:00:00.000");
    }

    #[test]
    fn test_touch_advances_updated_at() {
        let mut record = make_record();
        let before = record.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        record.touch();
        assert!(record.updated_at >= before);
    }
}
