//! Audio pipeline: decoded buffers, PCM decoding, resampling, device output

pub mod decode;
pub mod output;
pub mod resampler;
pub mod types;

pub use types::{ChunkBuffer, SYNTHESIS_CHANNELS, SYNTHESIS_SAMPLE_RATE};
