//! Resampling decoded audio to the configured output rate, via rubato.
//!
//! Splits into a pass-through case (input and output rates already
//! match) and an active case that reuses one rubato instance across
//! chunks so its internal filter state stays continuous.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};

/// A resampler bound to one input rate, reused across chunks of one
/// song's decode so rubato's internal filter state is continuous.
pub enum StatefulResampler {
    PassThrough,
    Active {
        resampler: FastFixedIn<f32>,
        channels: u16,
    },
}

impl StatefulResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16, chunk_size: usize) -> Result<Self> {
        if input_rate == output_rate {
            return Ok(Self::PassThrough);
        }
        let ratio = output_rate as f64 / input_rate as f64;
        let resampler = FastFixedIn::new(
            ratio,
            1.0,
            PolynomialDegree::Cubic,
            chunk_size,
            channels as usize,
        )
        .map_err(|e| Error::Other(anyhow::anyhow!("failed to build resampler: {e}")))?;
        Ok(Self::Active { resampler, channels })
    }

    /// Resample one chunk of interleaved samples, maintaining filter
    /// state across calls for seamless streaming.
    pub fn process_chunk(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        match self {
            Self::PassThrough => Ok(input.to_vec()),
            Self::Active { resampler, channels } => {
                let planar_input = deinterleave(input, *channels);
                let planar_output = resampler
                    .process(&planar_input, None)
                    .map_err(|e| Error::Other(anyhow::anyhow!("resampling failed: {e}")))?;
                Ok(interleave(planar_output))
            }
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }
}

fn deinterleave(input: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels as usize;
    let frames = input.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in input.chunks(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }
    let frames = planar[0].len();
    let channels = planar.len();
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for channel in &planar {
            out.push(channel[frame]);
        }
    }
    out
}

/// One-shot resample of an entire buffer, used when a whole decoded
/// song needs to move to the target rate in a single call rather than
/// chunk-by-chunk (the common case here, since clips are decoded whole
/// before trimming).
pub fn resample_all(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    let mut resampler = StatefulResampler::new(input_rate, output_rate, channels, input.len() / channels.max(1) as usize)?;
    resampler.process_chunk(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_returns_copy() {
        let r = StatefulResampler::new(44100, 44100, 2, 256).unwrap();
        assert!(r.is_pass_through());
    }

    #[test]
    fn resample_all_changes_frame_count_proportionally() {
        let input = vec![0.0f32; 2 * 4800];
        let out = resample_all(&input, 48000, 44100, 2).unwrap();
        let expected_frames = (4800.0 * 44100.0 / 48000.0).round() as usize;
        let actual_frames = out.len() / 2;
        assert!((actual_frames as i64 - expected_frames as i64).abs() <= 4);
    }
}
