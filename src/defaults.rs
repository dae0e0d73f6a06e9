//! Default configuration constants for scriv.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Audio sample rate expected by the inference engine, in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16_000;

/// Target chunk duration in milliseconds.
///
/// Chunks of about one minute keep per-call memory and latency bounded while
/// still giving the model enough context for coherent sentences.
pub const TARGET_CHUNK_MS: u32 = 60_000;

/// Minimum chunk duration in milliseconds.
///
/// A recording shorter than this is never split; cut points are never placed
/// closer than this to the previous cut.
pub const MIN_CHUNK_MS: u32 = 45_000;

/// Maximum chunk duration in milliseconds.
///
/// A tail shorter than this becomes the final chunk instead of being split
/// again.
pub const MAX_CHUNK_MS: u32 = 75_000;

/// Multiplier applied to the estimated background-noise level to obtain the
/// base silence threshold.
pub const SILENCE_MULTIPLIER: f32 = 1.5;

/// Minimum silence duration in milliseconds for a pause to count as a
/// candidate cut point.
///
/// Shorter dips (plosives, breaths, syllable gaps) are not usable boundaries.
pub const MIN_SILENCE_MS: u32 = 500;

/// Block size in samples for the background-noise estimate.
///
/// Large blocks (~1s at 16kHz) make the per-block RMS robust against
/// individual syllables and clicks.
pub const NOISE_BLOCK_SAMPLES: usize = 16_384;

/// Analysis window size in samples for the silence scan (~64ms at 16kHz).
pub const ENERGY_WINDOW_SAMPLES: usize = 1024;

/// Step size in samples between analysis windows.
pub const ENERGY_STEP_SAMPLES: usize = 256;

/// Neighborhood radius, in analysis steps, for the locally adaptive
/// threshold (~500ms total span at the default step size).
pub const LOCAL_NEIGHBORHOOD_STEPS: usize = 20;

/// Default Whisper model name.
///
/// "base" (multilingual) supports auto-detection of any language.
/// Use "base.en" explicitly for English-only optimized transcription.
pub const DEFAULT_MODEL: &str = "base";

/// Default language code for transcription.
///
/// "auto" lets Whisper detect the spoken language automatically.
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Suffix for English-only model variants.
pub const ENGLISH_ONLY_SUFFIX: &str = ".en";

/// English language code.
pub const ENGLISH_LANGUAGE: &str = "en";

/// Interval in milliseconds between progress estimate updates while a record
/// is being transcribed.
pub const PROGRESS_TICK_MS: u64 = 1000;

/// Number of inference threads to use when the configuration does not pin one.
///
/// Matches the machine's available parallelism, falling back to 4 when it
/// cannot be determined.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
