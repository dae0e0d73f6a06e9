//! Speech-to-text engine abstraction.
//!
//! The pipeline only ever talks to [`SpeechEngine`]; the real Whisper
//! implementation and the scripted mock used in tests are interchangeable
//! behind it.

use crate::defaults;
use crate::error::{Result, ScrivError};
use crate::record::TimedSegment;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback receiving model-residency progress in [0, 1].
pub type PrepareProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Trait for speech-to-text inference engines.
///
/// `prepare` must complete successfully before the first `run`; it makes the
/// model resident (cache hit or download) and reports progress while doing
/// so. `run` is a blocking call and is not assumed reentrant, so callers
/// serialize invocations.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Ensures the model is resident, reporting progress in [0, 1].
    async fn prepare(&self, on_progress: PrepareProgress<'_>) -> Result<()>;

    /// Transcribes one chunk of mono 16kHz samples.
    ///
    /// Returned timestamps are relative to the start of `samples`.
    fn run(&self, samples: &[f32], language: &str, threads: usize) -> Result<Vec<TimedSegment>>;

    /// Name of the configured model.
    fn model_name(&self) -> &str;

    /// True once `prepare` has succeeded.
    fn is_ready(&self) -> bool;
}

/// One scripted reply for [`MockEngine`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    Segments(Vec<TimedSegment>),
    Failure(String),
}

/// A recorded `run` invocation, for asserting call parameters in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct MockInvocation {
    pub sample_count: usize,
    pub language: String,
    pub threads: usize,
}

/// Scripted engine for testing.
///
/// Replies are consumed front-to-back; once the script is exhausted every
/// call succeeds with a single segment spanning the given chunk.
#[derive(Debug, Default)]
pub struct MockEngine {
    model_name: String,
    script: Mutex<VecDeque<MockResponse>>,
    invocations: Mutex<Vec<MockInvocation>>,
    prepare_calls: AtomicUsize,
    prepare_failure: Option<String>,
}

impl MockEngine {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            ..Self::default()
        }
    }

    /// Queues a successful reply.
    pub fn with_segments(self, segments: Vec<TimedSegment>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockResponse::Segments(segments));
        self
    }

    /// Queues a failing reply.
    pub fn with_failure(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockResponse::Failure(message.to_string()));
        self
    }

    /// Makes `prepare` fail with the given message.
    pub fn with_prepare_failure(mut self, message: &str) -> Self {
        self.prepare_failure = Some(message.to_string());
        self
    }

    /// Every `run` call observed so far.
    pub fn invocations(&self) -> Vec<MockInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of `prepare` calls observed so far.
    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    async fn prepare(&self, on_progress: PrepareProgress<'_>) -> Result<()> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.prepare_failure {
            return Err(ScrivError::ModelUnavailable {
                message: message.clone(),
            });
        }
        on_progress(1.0);
        Ok(())
    }

    fn run(&self, samples: &[f32], language: &str, threads: usize) -> Result<Vec<TimedSegment>> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockInvocation {
                sample_count: samples.len(),
                language: language.to_string(),
                threads,
            });

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(MockResponse::Segments(segments)) => Ok(segments),
            Some(MockResponse::Failure(message)) => Err(ScrivError::InferenceFailed { message }),
            None => {
                let duration = samples.len() as f64 / defaults::SAMPLE_RATE as f64;
                Ok(vec![TimedSegment::new(0.0, duration, "mock segment")])
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        self.prepare_failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_engine_default_reply_spans_chunk() {
        let engine = MockEngine::new("test-model");
        engine.prepare(&|_| {}).await.unwrap();

        let samples = vec![0.0f32; 32_000];
        let segments = engine.run(&samples, "auto", 4).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0.0);
        assert!((segments[0].end - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mock_engine_scripted_replies_in_order() {
        let engine = MockEngine::new("test-model")
            .with_segments(vec![TimedSegment::new(0.0, 1.0, "first")])
            .with_failure("boom");

        let ok = engine.run(&[0.0; 100], "en", 1).unwrap();
        assert_eq!(ok[0].text, "first");

        let err = engine.run(&[0.0; 100], "en", 1);
        assert!(matches!(err, Err(ScrivError::InferenceFailed { .. })));
    }

    #[tokio::test]
    async fn test_mock_engine_prepare_failure() {
        let engine = MockEngine::new("test-model").with_prepare_failure("no network");
        let result = engine.prepare(&|_| {}).await;
        assert!(matches!(result, Err(ScrivError::ModelUnavailable { .. })));
        assert!(!engine.is_ready());
    }

    #[tokio::test]
    async fn test_mock_engine_records_invocations() {
        let engine = MockEngine::new("test-model");
        engine.run(&[0.0; 64], "de", 2).unwrap();

        let calls = engine.invocations();
        assert_eq!(
            calls,
            vec![MockInvocation {
                sample_count: 64,
                language: "de".to_string(),
                threads: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_engine_prepare_reports_completion() {
        let engine = MockEngine::new("test-model");
        let reported = Mutex::new(Vec::new());
        engine
            .prepare(&|p| reported.lock().unwrap().push(p))
            .await
            .unwrap();
        assert_eq!(*reported.lock().unwrap(), vec![1.0]);
        assert_eq!(engine.prepare_calls(), 1);
    }

    #[test]
    fn test_engine_trait_is_object_safe() {
        let engine: Box<dyn SpeechEngine> = Box::new(MockEngine::new("boxed"));
        assert_eq!(engine.model_name(), "boxed");
    }
}
