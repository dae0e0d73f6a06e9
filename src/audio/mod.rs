//! Audio handling: container decoding and pause-aware segmentation.

pub mod decode;
pub mod segmenter;

pub use decode::{DecodedAudio, decode_file, decode_wav, decode_wav_bytes};
pub use segmenter::{SegmenterConfig, SilenceRange, segment};
