//! Core audio data types shared by the decode/resample/output stages.

/// Decoded, not-yet-trimmed PCM for one fetched song: interleaved
/// float32 samples at the decoder's native rate, before resampling to
/// `AudioConfig::sample_rate`.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}
