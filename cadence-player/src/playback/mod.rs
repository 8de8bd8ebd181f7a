//! The streaming/playback core: ring buffer, limiter, clip processing,
//! scheduling, queueing, and the Player itself.

pub mod clip_processor;
pub mod limiter;
pub mod player;
pub mod queue;
pub mod ring_buffer;
pub mod scheduler;
pub mod types;

pub use clip_processor::TailRegistry;
pub use limiter::PeakLimiter;
pub use player::Player;
pub use queue::{bounded as bounded_queue, ProcessedClipsReceiver, ProcessedClipsSender, QueueItem};
pub use ring_buffer::{ReadOutcome, RingBuffer};
pub use scheduler::Scheduler;
pub use types::{ClipJob, ProcessedClip, Song};
