//! Whisper-based speech-to-text engine.
//!
//! Implements [`SpeechEngine`] over whisper-rs. The model is made resident on
//! `prepare` (cache hit or download via the models subsystem) and reused for
//! every subsequent chunk.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::defaults;
use crate::error::{Result, ScrivError};
use crate::models;
use crate::record::TimedSegment;
use crate::stt::engine::{PrepareProgress, SpeechEngine};
use async_trait::async_trait;
use std::sync::Mutex;

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Whisper engine backed by a locally cached ggml model.
///
/// The `WhisperContext` is created lazily in `prepare` and guarded by a
/// mutex; the pipeline serializes `run` calls anyway, the lock just keeps the
/// type honest about it.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    model: String,
    context: Mutex<Option<WhisperContext>>,
}

/// Whisper engine placeholder (without the whisper feature).
///
/// Returns errors when used; enable the `whisper` feature for real
/// transcription.
#[cfg(not(feature = "whisper"))]
pub struct WhisperEngine {
    model: String,
    context: Mutex<Option<()>>,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("model", &self.model)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl WhisperEngine {
    /// Creates an engine for the given catalog model name or alias.
    ///
    /// Cheap: the model file is neither checked nor loaded until `prepare`.
    pub fn new(model: impl Into<String>) -> Self {
        let model = models::resolve_name(&model.into()).to_string();
        Self {
            model,
            context: Mutex::new(None),
        }
    }

    /// Effective language hint: English-only models pin "en" even under auto
    /// detection.
    fn effective_language<'a>(&self, language: &'a str) -> Option<&'a str> {
        if language == defaults::AUTO_LANGUAGE {
            if self.model.ends_with(defaults::ENGLISH_ONLY_SUFFIX) {
                Some(defaults::ENGLISH_LANGUAGE)
            } else {
                None
            }
        } else {
            Some(language)
        }
    }
}

#[cfg(feature = "whisper")]
#[async_trait]
impl SpeechEngine for WhisperEngine {
    async fn prepare(&self, on_progress: PrepareProgress<'_>) -> Result<()> {
        {
            let guard = self.context.lock().unwrap_or_else(|e| e.into_inner());
            if guard.is_some() {
                on_progress(1.0);
                return Ok(());
            }
        }

        // Quiet down whisper.cpp's stderr chatter (only once per process).
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let path = models::ensure_model(&self.model, Some(on_progress), false).await?;
        let path_str = path
            .to_str()
            .ok_or_else(|| ScrivError::ModelUnavailable {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;

        let context = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| ScrivError::ModelUnavailable {
                message: format!("Failed to load Whisper model: {}", e),
            })?;

        *self.context.lock().unwrap_or_else(|e| e.into_inner()) = Some(context);
        Ok(())
    }

    fn run(&self, samples: &[f32], language: &str, threads: usize) -> Result<Vec<TimedSegment>> {
        let guard = self.context.lock().unwrap_or_else(|e| e.into_inner());
        let context = guard.as_ref().ok_or_else(|| ScrivError::InferenceFailed {
            message: "Engine used before prepare()".to_string(),
        })?;

        let mut state = context
            .create_state()
            .map_err(|e| ScrivError::InferenceFailed {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(self.effective_language(language));
        params.set_n_threads(threads as i32);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| ScrivError::InferenceFailed {
                message: format!("Whisper inference failed: {}", e),
            })?;

        // Timestamps come back in centiseconds relative to the chunk.
        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string().trim().to_string();
            if text.is_empty() {
                continue;
            }
            segments.push(TimedSegment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text,
            });
        }

        Ok(segments)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_ready(&self) -> bool {
        self.context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(not(feature = "whisper"))]
#[async_trait]
impl SpeechEngine for WhisperEngine {
    async fn prepare(&self, _on_progress: PrepareProgress<'_>) -> Result<()> {
        Err(ScrivError::ModelUnavailable {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn run(&self, _samples: &[f32], _language: &str, _threads: usize) -> Result<Vec<TimedSegment>> {
        Err(ScrivError::InferenceFailed {
            message: "Whisper feature not enabled".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_ready(&self) -> bool {
        self.context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_resolves_alias_on_construction() {
        let engine = WhisperEngine::new("large");
        assert_eq!(engine.model_name(), "large-v3-turbo");
    }

    #[test]
    fn test_engine_not_ready_before_prepare() {
        let engine = WhisperEngine::new("base");
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_effective_language_auto_multilingual() {
        let engine = WhisperEngine::new("base");
        assert_eq!(engine.effective_language("auto"), None);
    }

    #[test]
    fn test_effective_language_auto_english_only() {
        let engine = WhisperEngine::new("base.en");
        assert_eq!(engine.effective_language("auto"), Some("en"));
    }

    #[test]
    fn test_effective_language_explicit() {
        let engine = WhisperEngine::new("base");
        assert_eq!(engine.effective_language("de"), Some("de"));
    }

    #[cfg(feature = "whisper")]
    #[test]
    fn test_run_before_prepare_fails() {
        let engine = WhisperEngine::new("base");
        let result = engine.run(&[0.0; 100], "auto", 1);
        assert!(matches!(result, Err(ScrivError::InferenceFailed { .. })));
    }
}
