//! Streaming resampler using rubato
//!
//! Converts the 24 kHz mono synthesis stream to the output device rate at the
//! playback edge. The scheduler and its clock always run at the synthesis
//! rate; only the device-facing pull path goes through here.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, Resampler as RubatoResampler};

/// Input chunk size fed to rubato per process call, in frames
const RESAMPLE_CHUNK_FRAMES: usize = 512;

/// Mono streaming resampler with a fixed input chunk size.
///
/// When input and output rates match, `process` passes samples through
/// untouched.
pub struct StreamResampler {
    inner: Option<FastFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
}

impl StreamResampler {
    /// Create a resampler from `input_rate` to `output_rate` (mono).
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        let inner = if input_rate == output_rate {
            None
        } else {
            let resampler = FastFixedIn::<f32>::new(
                output_rate as f64 / input_rate as f64,
                1.0, // max_relative_ratio (no runtime changes)
                rubato::PolynomialDegree::Septic,
                RESAMPLE_CHUNK_FRAMES,
                1, // mono
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {}", e)))?;
            Some(resampler)
        };

        Ok(Self { inner, input_rate, output_rate })
    }

    /// Number of input frames expected per `process` call
    pub fn chunk_frames(&self) -> usize {
        RESAMPLE_CHUNK_FRAMES
    }

    /// Input sample rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Output sample rate
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Resample one input chunk of exactly `chunk_frames()` mono samples.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        match self.inner.as_mut() {
            None => Ok(input.to_vec()),
            Some(resampler) => {
                let planar_output = resampler
                    .process(&[input], None)
                    .map_err(|e| Error::AudioOutput(format!("Resampling failed: {}", e)))?;
                Ok(planar_output.into_iter().next().unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_same_rate() {
        let mut resampler = StreamResampler::new(24000, 24000).unwrap();
        let input: Vec<f32> = (0..resampler.chunk_frames()).map(|i| i as f32 / 512.0).collect();
        let output = resampler.process(&input).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_upsample_ratio() {
        let mut resampler = StreamResampler::new(24000, 48000).unwrap();
        let input = vec![0.25f32; resampler.chunk_frames()];

        // Feed a few chunks so internal buffering settles
        let mut total_out = 0usize;
        let chunks = 8;
        for _ in 0..chunks {
            total_out += resampler.process(&input).unwrap().len();
        }

        let expected = resampler.chunk_frames() * chunks * 2;
        // Allow variance for resampler startup latency
        assert!(
            total_out >= expected - 2048 && total_out <= expected + 2048,
            "Expected ~{} output frames, got {}",
            expected,
            total_out
        );
    }

    #[test]
    fn test_downsample_ratio() {
        let mut resampler = StreamResampler::new(48000, 44100).unwrap();
        let input = vec![0.0f32; resampler.chunk_frames()];

        let mut total_out = 0usize;
        let chunks = 8;
        for _ in 0..chunks {
            total_out += resampler.process(&input).unwrap().len();
        }

        let expected =
            (resampler.chunk_frames() as f64 * chunks as f64 * 44100.0 / 48000.0) as usize;
        assert!(
            total_out >= expected.saturating_sub(2048) && total_out <= expected + 2048,
            "Expected ~{} output frames, got {}",
            expected,
            total_out
        );
    }
}
