//! Audio configuration loading and validation.
//!
//! Loads the immutable `AudioConfig` the pipeline runs with for the
//! duration of one playback cycle. Settings storage, live editing, and
//! any UI for it live elsewhere; this module only knows how to parse a
//! TOML bootstrap file and validate the result.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Supported output sample rates.
pub const VALID_SAMPLE_RATES: [u32; 4] = [44100, 48000, 96000, 192000];

/// Output latency hint, passed opaquely to the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Latency {
    Low,
    Medium,
    High,
}

impl Default for Latency {
    fn default() -> Self {
        Latency::High
    }
}

/// Immutable audio configuration for one playback run.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Output rate; decoder target. One of 44100/48000/96000/192000.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Interleaved output channels (1 or 2).
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Callback and ring buffer block granularity.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Passed opaquely to the output device.
    #[serde(default)]
    pub latency: Latency,

    /// Ring capacity target in seconds. Must be >= 10.
    #[serde(default = "default_buffer_seconds")]
    pub buffer_seconds: f64,

    /// Seconds of audio that must be buffered before playback starts.
    #[serde(default = "default_prefill_time")]
    pub prefill_time: f64,

    /// Max seconds the Supervisor waits for the initial prefill before
    /// forcing playback to start with a partial buffer — a
    /// Supervisor-owned watchdog independent of the Player's own gate.
    #[serde(default = "default_prebuffer_timeout")]
    pub prebuffer_timeout: f64,

    /// Sleep on ring-full in the filler, in seconds.
    #[serde(default = "default_buffer_backoff")]
    pub buffer_backoff: f64,

    /// Target excerpt length in seconds. 0 means whole song.
    #[serde(default = "default_clip_length")]
    pub clip_length: f64,

    /// Crossfade/fade envelope length in seconds. Must be <= clip_length / 2.
    #[serde(default = "default_fade_duration")]
    pub fade_duration: f64,

    /// Pause/resume ramp length in seconds.
    #[serde(default = "default_pause_fade")]
    pub pause_fade: f64,

    /// Gain applied before fades, in dB.
    #[serde(default = "default_volume_adjustment")]
    pub volume_adjustment: f32,

    /// Peak-limiter ceiling, in (0, 1].
    #[serde(default = "default_limiter_threshold")]
    pub limiter_threshold: f32,

    /// Shuffle the admission order within a cycle.
    #[serde(default)]
    pub shuffle: bool,

    /// Loop back to the start of the playlist after the last song.
    #[serde(default)]
    pub repeat: bool,

    /// File-system location for cached/downloaded audio.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// File-system location for playlist files.
    #[serde(default = "default_playlists_dir")]
    pub playlists_dir: PathBuf,

    /// Path to the last-used playlist file, if any. Read only as a
    /// fallback default; the pipeline never persists changes back to it.
    #[serde(default)]
    pub recent_playlist: Option<PathBuf>,

    /// Worker pool size for the clip-processing pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_sample_rate() -> u32 {
    44100
}
fn default_channels() -> u16 {
    2
}
fn default_block_size() -> usize {
    4096
}
fn default_buffer_seconds() -> f64 {
    30.0
}
fn default_prefill_time() -> f64 {
    6.0
}
fn default_prebuffer_timeout() -> f64 {
    25.0
}
fn default_buffer_backoff() -> f64 {
    0.05
}
fn default_clip_length() -> f64 {
    30.0
}
fn default_fade_duration() -> f64 {
    4.0
}
fn default_pause_fade() -> f64 {
    0.5
}
fn default_volume_adjustment() -> f32 {
    -3.0
}
fn default_limiter_threshold() -> f32 {
    0.97
}
fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}
fn default_playlists_dir() -> PathBuf {
    PathBuf::from("playlists")
}
fn default_worker_count() -> usize {
    4
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            block_size: default_block_size(),
            latency: Latency::default(),
            buffer_seconds: default_buffer_seconds(),
            prefill_time: default_prefill_time(),
            prebuffer_timeout: default_prebuffer_timeout(),
            buffer_backoff: default_buffer_backoff(),
            clip_length: default_clip_length(),
            fade_duration: default_fade_duration(),
            pause_fade: default_pause_fade(),
            volume_adjustment: default_volume_adjustment(),
            limiter_threshold: default_limiter_threshold(),
            shuffle: false,
            repeat: false,
            audio_dir: default_audio_dir(),
            playlists_dir: default_playlists_dir(),
            recent_playlist: None,
            worker_count: default_worker_count(),
        }
    }
}

impl AudioConfig {
    /// Load configuration from a TOML bootstrap file, validating every
    /// field against its documented constraints.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: AudioConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate each field's documented constraints.
    pub fn validate(&self) -> Result<()> {
        if !VALID_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(Error::Config(format!(
                "sample_rate must be one of {VALID_SAMPLE_RATES:?}, got {}",
                self.sample_rate
            )));
        }
        if self.channels != 1 && self.channels != 2 {
            return Err(Error::Config(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.buffer_seconds < 10.0 {
            return Err(Error::Config(format!(
                "buffer_seconds must be >= 10, got {}",
                self.buffer_seconds
            )));
        }
        if self.clip_length < 0.0 {
            return Err(Error::Config("clip_length must be >= 0".into()));
        }
        if self.fade_duration < 0.0
            || (self.clip_length > 0.0 && self.fade_duration > self.clip_length / 2.0)
        {
            return Err(Error::Config(
                "fade_duration must be in [0, clip_length / 2]".into(),
            ));
        }
        if self.limiter_threshold <= 0.0 || self.limiter_threshold > 1.0 {
            return Err(Error::Config("limiter_threshold must be in (0, 1]".into()));
        }
        Ok(())
    }

    /// Fade length in samples: `F = min(fade_duration, clip_length/2) * sample_rate`.
    ///
    /// When `clip_length` is 0 (whole-song mode) the cap is not applied
    /// here; callers resolve the effective clip length first (see
    /// `cadence_player::clip_processor`).
    pub fn fade_samples_for(&self, clip_length_seconds: f64) -> usize {
        let capped = if clip_length_seconds > 0.0 {
            self.fade_duration.min(clip_length_seconds / 2.0)
        } else {
            self.fade_duration
        };
        (capped * self.sample_rate as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AudioConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let mut c = AudioConfig::default();
        c.sample_rate = 22050;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_short_buffer() {
        let mut c = AudioConfig::default();
        c.buffer_seconds = 2.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_fade_longer_than_half_clip() {
        let mut c = AudioConfig::default();
        c.clip_length = 10.0;
        c.fade_duration = 6.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn fade_samples_capped_at_half_clip() {
        let mut c = AudioConfig::default();
        c.sample_rate = 48000;
        c.fade_duration = 10.0;
        // clip_length 6s -> cap fade to 3s -> 144000 samples
        assert_eq!(c.fade_samples_for(6.0), 144_000);
    }

    #[test]
    fn load_from_toml_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.toml");
        std::fs::write(&path, "shuffle = true\nrepeat = true\n").unwrap();
        let config = AudioConfig::load(&path).unwrap();
        assert!(config.shuffle);
        assert!(config.repeat);
        assert_eq!(config.sample_rate, 44100);
    }
}
