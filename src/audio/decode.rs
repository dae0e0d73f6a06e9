//! WAV decoding for uploaded recordings.
//!
//! Produces the mono 16kHz float buffer the inference path works on while
//! keeping the source file's own metadata (rate, channels, duration) for the
//! transcript record. Supports 16-bit PCM and 32-bit float WAV input with
//! arbitrary sample rates and channel counts.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, ScrivError};
use std::io::{Cursor, Read};
use std::path::Path;

/// A decoded recording: inference samples plus source-file metadata.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples at [`SAMPLE_RATE`], normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Source frame count (samples per channel).
    pub length: u64,
    /// Source duration in seconds.
    pub duration: f64,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Source channel count.
    pub channels: u16,
}

/// Decodes WAV data held in memory.
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<DecodedAudio> {
    decode_wav(Box::new(Cursor::new(bytes.to_vec())))
}

/// Decodes a WAV file from disk.
///
/// The extension is not trusted; the container header decides whether the
/// file is accepted.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)?;
    decode_wav(Box::new(std::io::BufReader::new(file)))
}

/// Decodes WAV data from any reader.
pub fn decode_wav(reader: Box<dyn Read + Send>) -> Result<DecodedAudio> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ScrivError::DecodeFailure {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    let source_rate = spec.sample_rate;
    let source_channels = spec.channels;
    if source_channels == 0 {
        return Err(ScrivError::DecodeFailure {
            message: "WAV file declares zero channels".to_string(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample != 16 {
                return Err(ScrivError::DecodeFailure {
                    message: format!(
                        "Unsupported WAV bit depth: {} (only 16-bit PCM and 32-bit float)",
                        spec.bits_per_sample
                    ),
                });
            }
            wav_reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScrivError::DecodeFailure {
                    message: format!("Failed to read WAV samples: {}", e),
                })?
        }
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScrivError::DecodeFailure {
                message: format!("Failed to read WAV samples: {}", e),
            })?,
    };

    // Downmix to mono by averaging channels.
    let mono: Vec<f32> = if source_channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(source_channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / source_channels as f32)
            .collect()
    };

    let length = mono.len() as u64;
    let duration = length as f64 / source_rate as f64;

    let samples = if source_rate == SAMPLE_RATE {
        mono
    } else {
        resample(&mono, source_rate, SAMPLE_RATE)
    };

    Ok(DecodedAudio {
        samples,
        length,
        duration,
        sample_rate: source_rate,
        channels: source_channels,
    })
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let index = source_pos as usize;
            let frac = source_pos - index as f64;

            if index + 1 < samples.len() {
                let a = samples[index] as f64;
                let b = samples[index + 1] as f64;
                (a + (b - a) * frac) as f32
            } else {
                samples[samples.len() - 1]
            }
        })
        .collect()
}

/// Container format tag derived from a file name, e.g. "wav".
pub fn format_tag(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}
