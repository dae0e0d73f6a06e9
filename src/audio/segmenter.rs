//! Pause-aware audio segmentation.
//!
//! Splits a long mono recording into chunks of roughly one minute, preferring
//! cut points inside natural pauses:
//! - The background-noise level is estimated from the quietest quartile of
//!   coarse analysis blocks, so a fixed volume threshold is never needed.
//! - In adaptive mode every position additionally gets a local threshold, so
//!   quiet passages use a lower bar for "silence" than loud passages.
//! - Candidate pauses are scored by silence depth and proximity to the target
//!   chunk length; the best one inside the duration envelope wins.
//!
//! The function is pure: no I/O, no shared state, and bit-identical output
//! for identical input.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// Configuration for [`segment`].
///
/// All durations are in milliseconds. `silence_threshold` is an absolute
/// mean-amplitude value in [0, 1]; when `None` (or when `adaptive_threshold`
/// is on) it is derived from the recording itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub target_duration_ms: u32,
    pub min_duration_ms: u32,
    pub max_duration_ms: u32,
    pub silence_threshold: Option<f32>,
    pub silence_multiplier: f32,
    pub min_silence_duration_ms: u32,
    pub force_segmentation: bool,
    pub adaptive_threshold: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            target_duration_ms: defaults::TARGET_CHUNK_MS,
            min_duration_ms: defaults::MIN_CHUNK_MS,
            max_duration_ms: defaults::MAX_CHUNK_MS,
            silence_threshold: None,
            silence_multiplier: defaults::SILENCE_MULTIPLIER,
            min_silence_duration_ms: defaults::MIN_SILENCE_MS,
            force_segmentation: true,
            adaptive_threshold: true,
        }
    }
}

/// A detected pause: a half-open sample-index interval below the silence
/// threshold for at least the minimum silence duration.
///
/// `intensity` is the mean margin below the threshold over the interval's
/// analysis windows; larger means more confidently silent.
#[derive(Debug, Clone, PartialEq)]
pub struct SilenceRange {
    pub start: usize,
    pub end: usize,
    pub intensity: f32,
}

impl SilenceRange {
    /// Midpoint sample index, used as the actual cut position.
    pub fn midpoint(&self) -> usize {
        (self.start + self.end) / 2
    }
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Splits `samples` into ordered, contiguous chunks within the configured
/// duration envelope.
///
/// The returned slices partition the input exactly: concatenated in order
/// they reconstruct it with no gaps and no overlaps. Every chunk except
/// possibly the last is within `[min_duration, max_duration]`; the last may
/// be shorter only when the remaining tail itself is shorter.
pub fn segment<'a>(
    samples: &'a [f32],
    sample_rate: u32,
    config: &SegmenterConfig,
) -> Vec<&'a [f32]> {
    if samples.is_empty() {
        return Vec::new();
    }

    let target_samples = ms_to_samples(config.target_duration_ms, sample_rate);
    let min_samples = ms_to_samples(config.min_duration_ms, sample_rate);
    let max_samples = ms_to_samples(config.max_duration_ms, sample_rate);
    let min_silence_samples = ms_to_samples(config.min_silence_duration_ms, sample_rate);

    // Inputs at or below the minimum are never split.
    if samples.len() <= min_samples {
        return vec![samples];
    }

    let base_threshold = match (config.silence_threshold, config.adaptive_threshold) {
        (Some(threshold), false) => threshold,
        _ => noise_floor_threshold(samples, config.silence_multiplier),
    };

    let ranges = find_silence_ranges(
        samples,
        base_threshold,
        min_silence_samples,
        config.adaptive_threshold,
    );

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < samples.len() {
        let remaining = samples.len() - start;
        if remaining <= max_samples {
            chunks.push(&samples[start..]);
            break;
        }

        let valid_start = start + min_samples;
        let valid_end = start + max_samples;
        let target = start + target_samples;

        let mut best: Option<(usize, f32)> = None;
        for range in &ranges {
            if range.end <= valid_start || range.start >= valid_end {
                continue;
            }
            let midpoint = range.midpoint();
            if midpoint < valid_start || midpoint > valid_end {
                continue;
            }

            let distance = midpoint.abs_diff(target) as f32;
            let proximity = 1.0 - distance / target_samples as f32;
            let score = range.intensity * 0.7 + proximity * 0.3;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((midpoint, score));
            }
        }

        let cut = match best {
            Some((midpoint, _)) => midpoint,
            None if config.force_segmentation => target.min(samples.len()),
            None => {
                // No usable pause and forcing disabled: keep the rest whole.
                chunks.push(&samples[start..]);
                break;
            }
        };

        chunks.push(&samples[start..cut]);
        start = cut;
    }

    chunks
}

/// Estimates the base silence threshold from the recording itself.
///
/// Partitions the buffer into coarse blocks, takes the 25th percentile of the
/// per-block RMS energies as the background-noise estimate, and scales it by
/// `multiplier`. The percentile keeps a few loud or dead blocks from skewing
/// the estimate.
pub fn noise_floor_threshold(samples: &[f32], multiplier: f32) -> f32 {
    let block_size = defaults::NOISE_BLOCK_SAMPLES;
    let block_count = samples.len().div_ceil(block_size).max(1);

    let mut energies = Vec::with_capacity(block_count);
    for block in 0..block_count {
        let start = block * block_size;
        let end = (start + block_size).min(samples.len());
        if start >= end {
            break;
        }
        let sum_squared: f32 = samples[start..end].iter().map(|s| s * s).sum();
        energies.push((sum_squared / (end - start) as f32).sqrt());
    }

    if energies.is_empty() {
        return 0.0;
    }
    energies.sort_unstable_by(f32::total_cmp);
    let lower_quartile = (energies.len() as f32 * 0.25) as usize;
    energies[lower_quartile.min(energies.len() - 1)] * multiplier
}

/// Mean absolute amplitude of each analysis window, one entry per step.
fn window_energies(samples: &[f32]) -> Vec<f32> {
    let window = defaults::ENERGY_WINDOW_SAMPLES;
    let step = defaults::ENERGY_STEP_SAMPLES;
    let count = samples.len().div_ceil(step);

    let mut energies = Vec::with_capacity(count);
    for index in 0..count {
        let start = index * step;
        let end = (start + window).min(samples.len());
        let sum: f32 = samples[start..end].iter().map(|s| s.abs()).sum();
        energies.push(sum / (end - start) as f32);
    }
    energies
}

/// Per-step thresholds blending the global base with the local energy range.
///
/// For each step the neighborhood's minimum energy stands in for the local
/// noise level; adding 30% of the local dynamic range keeps the bar above
/// fluctuations, and the 0.7 × base floor keeps loud-room estimates from
/// collapsing entirely.
fn local_thresholds(energies: &[f32], base_threshold: f32) -> Vec<f32> {
    let radius = defaults::LOCAL_NEIGHBORHOOD_STEPS;
    let mut thresholds = Vec::with_capacity(energies.len());

    for index in 0..energies.len() {
        let lo = index.saturating_sub(radius);
        let hi = (index + radius + 1).min(energies.len());

        let mut min_energy = f32::INFINITY;
        let mut max_energy = 0.0f32;
        for &energy in &energies[lo..hi] {
            min_energy = min_energy.min(energy);
            max_energy = max_energy.max(energy);
        }

        let dynamic = min_energy + (max_energy - min_energy) * 0.3;
        thresholds.push((base_threshold * 0.7).max(dynamic));
    }
    thresholds
}

/// Scans the buffer for intervals that stay below the silence threshold for
/// at least `min_silence_samples`.
pub fn find_silence_ranges(
    samples: &[f32],
    base_threshold: f32,
    min_silence_samples: usize,
    adaptive: bool,
) -> Vec<SilenceRange> {
    let step = defaults::ENERGY_STEP_SAMPLES;
    let energies = window_energies(samples);
    let thresholds = if adaptive {
        Some(local_thresholds(&energies, base_threshold))
    } else {
        None
    };

    let mut ranges = Vec::new();
    let mut in_silence = false;
    let mut silence_start = 0usize;
    let mut silence_sum = 0.0f32;
    let mut consecutive_samples = 0usize;

    for (index, &energy) in energies.iter().enumerate() {
        let position = index * step;
        let threshold = match &thresholds {
            Some(local) => local[index],
            None => base_threshold,
        };

        if energy < threshold {
            if !in_silence {
                in_silence = true;
                silence_start = position;
                silence_sum = 0.0;
                consecutive_samples = 0;
            }
            consecutive_samples += step;
            silence_sum += threshold - energy;
        } else if in_silence {
            if consecutive_samples >= min_silence_samples {
                ranges.push(SilenceRange {
                    start: silence_start,
                    end: position,
                    intensity: silence_sum / (consecutive_samples / step) as f32,
                });
            }
            in_silence = false;
        }
    }

    // Recording may end mid-silence.
    if in_silence && consecutive_samples >= min_silence_samples {
        ranges.push(SilenceRange {
            start: silence_start,
            end: samples.len(),
            intensity: silence_sum / (consecutive_samples / step) as f32,
        });
    }

    ranges
}
