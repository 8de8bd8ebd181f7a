//! Continuous, gapless streaming playback pipeline.
//!
//! `audio` holds the decode/resample/output stack; `playback` holds
//! the ring buffer, limiter, clip processing, scheduling, and the
//! Player; `supervisor` glues the two zones together and owns
//! lifecycle.

pub mod audio;
pub mod error;
pub mod playback;
pub mod supervisor;

pub use error::{Error, Result};
pub use supervisor::Supervisor;
