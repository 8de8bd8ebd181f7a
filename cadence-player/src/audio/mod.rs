//! Decode/resample/output stack: everything between "compressed bytes
//! from the download backend" and "interleaved float frames handed to
//! the device". Clip timing, fading, and crossfade join live in
//! `playback::clip_processor`, one layer up.

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod source;
pub mod types;

pub use source::{AudioSource, FileAudioSource, HttpAudioSource, TimeRange};
pub use types::DecodedAudio;
