//! Speech-to-text engines.

pub mod engine;
pub mod whisper;

pub use engine::{MockEngine, MockInvocation, MockResponse, SpeechEngine};
pub use whisper::WhisperEngine;
