//! Synthesized audio decoding
//!
//! Turns a synthesis response (base64-encoded raw PCM) into a normalized
//! [`ChunkBuffer`]. Both stages fail with [`Error::Decode`]; the controller
//! treats a decode failure exactly like a synthesis failure, since either way
//! the chunk did not yield playable audio.

use crate::audio::types::{ChunkBuffer, SYNTHESIS_SAMPLE_RATE};
use crate::error::{Error, Result};
use base64::Engine;

/// Decode a base64 string into raw audio bytes
pub fn decode_base64_audio(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| Error::Decode(format!("Invalid base64 audio payload: {}", e)))
}

/// Interpret raw bytes as interleaved 16-bit little-endian signed samples and
/// produce a normalized f32 buffer.
///
/// # Errors
/// - Empty payload
/// - Odd byte count (truncated final sample)
pub fn pcm16_to_buffer(bytes: &[u8], sample_rate: u32) -> Result<ChunkBuffer> {
    if bytes.is_empty() {
        return Err(Error::Decode("Empty PCM payload".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "Truncated PCM payload: {} bytes is not a whole number of samples",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(ChunkBuffer::new(samples, sample_rate))
}

/// Decode one synthesis response into a playable buffer at the synthesis rate
pub fn decode_synthesized_chunk(base64_data: &str) -> Result<ChunkBuffer> {
    let bytes = decode_base64_audio(base64_data)?;
    pcm16_to_buffer(&bytes, SYNTHESIS_SAMPLE_RATE)
}
