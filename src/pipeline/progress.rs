//! Two-phase progress estimation for one record.
//!
//! Phase A (0 to 0.5) tracks the externally reported model download. Phase B
//! (0.5 to 1.0) cannot be observed, since the engine gives no mid-call
//! signal, so it is *estimated* as wall-clock time since download completion
//! over the recording's total duration, clamped at 1.0. The estimate is
//! cosmetic: it drives display only and never gates correctness.

use std::time::Instant;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Blends download progress and the elapsed-time heuristic into one value.
#[derive(Debug)]
pub struct ProgressEstimator<C: Clock = SystemClock> {
    clock: C,
    /// Total duration of the recording, in seconds.
    total_duration: f64,
    download_progress: f64,
    inference_started_at: Option<Instant>,
}

impl ProgressEstimator<SystemClock> {
    /// Creates an estimator for a recording of `total_duration` seconds.
    pub fn new(total_duration: f64) -> Self {
        Self::with_clock(total_duration, SystemClock)
    }
}

impl<C: Clock> ProgressEstimator<C> {
    /// Creates an estimator with a custom clock (for tests).
    pub fn with_clock(total_duration: f64, clock: C) -> Self {
        Self {
            clock,
            total_duration,
            download_progress: 0.0,
            inference_started_at: None,
        }
    }

    /// Feeds a download progress value in [0, 1].
    ///
    /// The first time the download reaches 1.0 the phase-B timer starts.
    pub fn on_download_progress(&mut self, progress: f64) {
        self.download_progress = progress.clamp(0.0, 1.0);
        if self.download_progress >= 1.0 && self.inference_started_at.is_none() {
            self.inference_started_at = Some(self.clock.now());
        }
    }

    /// Current blended progress in [0, 1].
    pub fn current(&self) -> f64 {
        match self.inference_started_at {
            None => self.download_progress * 0.5,
            Some(started) => {
                if self.total_duration <= 0.0 {
                    return 1.0;
                }
                let elapsed = self
                    .clock
                    .now()
                    .saturating_duration_since(started)
                    .as_secs_f64();
                0.5 + 0.5 * (elapsed / self.total_duration).min(1.0)
            }
        }
    }
}
