//! Error types for the streaming pipeline.
//!
//! A top-level enum wraps per-concern error enums via `#[from]`,
//! narrowed to the concerns this pipeline actually owns: fetch, decode,
//! playback and device errors. There is no database error variant
//! here — the config/catalog/DB layers are out-of-scope collaborators.

use thiserror::Error;

/// Top-level error type for the streaming pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("config error: {0}")]
    Config(#[from] cadence_common::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Errors fetching compressed audio bytes from the download backend.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to fetch {song_id} failed: {reason}")]
    Request { song_id: String, reason: String },

    #[error("fetch of {song_id} timed out after {seconds}s")]
    Timeout { song_id: String, seconds: u64 },

    #[error("fetch of {song_id} exhausted retries ({attempts} attempts)")]
    RetriesExhausted { song_id: String, attempts: u32 },
}

/// Errors decoding compressed audio to PCM.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("failed to probe format: {0}")]
    ProbeFailed(String),

    #[error("decoder construction failed: {0}")]
    DecoderInit(String),
}

/// Errors in the ring buffer / real-time playback path.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("audio output device error: {0}")]
    Device(String),

    #[error("unsupported sample format: {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),
}

pub type Result<T> = std::result::Result<T, Error>;
