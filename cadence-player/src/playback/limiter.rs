//! Peak limiter: a stateless amplitude clamp applied to each callback
//! block.

/// Scales a block down if its peak sample magnitude exceeds
/// `threshold`, preserving relative levels within the block. A no-op
/// when the block is already within range.
#[derive(Debug, Clone, Copy)]
pub struct PeakLimiter {
    threshold: f32,
}

impl PeakLimiter {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn apply(&self, block: &mut [f32]) {
        let peak = block.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
        if peak > self.threshold {
            let scale = self.threshold / peak;
            for sample in block.iter_mut() {
                *sample *= scale;
            }
        }
    }
}
