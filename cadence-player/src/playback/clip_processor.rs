//! Per-song processing pipeline: fetch, decode, trim, fade, and
//! crossfade-join with the predecessor's tail.
//!
//! Clip start time is chosen from a clamped Gaussian rather than a
//! uniform distribution with fixed margins, biasing toward the middle
//! of the song while still covering its full valid range. Predecessor
//! hand-off runs through a registry of one-shot notifications keyed by
//! song id.

use crate::audio::source::AudioSource;
use crate::audio::{decoder, resampler};
use crate::error::Result;
use crate::playback::queue::ProcessedClipsSender;
use crate::playback::types::{ClipJob, ProcessedClip};
use cadence_common::{fade, AudioConfig, StatusEvent};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{info_span, warn, Instrument};

/// Registry of per-song tail hand-offs: each admitted song gets a
/// `Notify` that its processor fires after publishing its tail, and a
/// slot in `tails` for the tail itself (`None` means the predecessor
/// failed and produced no tail, treated the same as having no
/// predecessor at all).
#[derive(Default)]
pub struct TailRegistry {
    notify: Mutex<HashMap<String, Arc<Notify>>>,
    tails: Mutex<HashMap<String, Option<Vec<f32>>>>,
}

impl TailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn notify_for(&self, song_id: &str) -> Arc<Notify> {
        let mut map = self.notify.lock().await;
        map.entry(song_id.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Wait for `song_id`'s processor to publish (or fail to publish)
    /// its tail, then return what it published.
    ///
    /// `notify_waiters()` wakes only tasks already registered as
    /// waiters when it's called; it stores no permit the way
    /// `notify_one()` does. So the `Notified` future must be created
    /// *before* checking whether the tail already landed, or a
    /// publisher that finishes between our check and our wait would
    /// leave us waiting forever. Create-then-check-then-await is the
    /// pattern `tokio::sync::Notify`'s own docs call for.
    pub async fn wait_for_tail(&self, song_id: &str) -> Option<Vec<f32>> {
        let notify = self.notify_for(song_id).await;
        let notified = notify.notified();
        if let Some(tail) = self.tails.lock().await.get(song_id) {
            return tail.clone();
        }
        notified.await;
        self.tails.lock().await.get(song_id).cloned().flatten()
    }

    /// Publish this song's tail (or `None` on failure) and wake
    /// whichever successor is waiting.
    pub async fn publish(&self, song_id: &str, tail: Option<Vec<f32>>) {
        self.tails.lock().await.insert(song_id.to_string(), tail);
        self.notify_for(song_id).await.notify_waiters();
    }

    /// Cleared only at cycle rollover — event fires are otherwise
    /// idempotent within one cycle.
    pub async fn clear(&self) {
        self.notify.lock().await.clear();
        self.tails.lock().await.clear();
    }
}

/// Choose a clip start time in `[0, duration - clip_len]` from a
/// Gaussian clamped to that range, mean at the midpoint, stddev a
/// quarter of the range. Falls back to `0` when the range is
/// degenerate.
fn choose_start_seconds(duration: f64, clip_len: f64) -> f64 {
    let span = duration - clip_len;
    if span <= 0.0 {
        return 0.0;
    }
    let mean = span / 2.0;
    let stddev = span / 4.0;
    let mut rng = rand::thread_rng();
    // Box-Muller transform for a standard normal sample.
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    (mean + z * stddev).clamp(0.0, span)
}

/// Run one ClipJob to completion: fetch, decode, trim, fade, join, and
/// enqueue. Failures emit `error:<song_id>:<reason>` on `status` and
/// publish this song's tail as `None` rather than leaving it
/// unpublished: the successor then treats itself as a first clip
/// instead of the whole pipeline stalling.
pub async fn process_job(
    job: ClipJob,
    config: &AudioConfig,
    source: &impl AudioSource,
    tails: &TailRegistry,
    output: &ProcessedClipsSender,
    status: &mpsc::UnboundedSender<StatusEvent>,
) {
    let span = info_span!("clip_processor", song_id = %job.song.id, index = job.song.index);
    async {
        status_processing(status, &job.song.id);
        if let Err(e) = run(job.clone(), config, source, tails, output).await {
            warn!(error = %e, "clip processing failed");
            let _ = status.send(StatusEvent::Error {
                song_id: job.song.id.clone(),
                message: e.to_string(),
            });
            tails.publish(&job.song.id, None).await;
        }
    }
    .instrument(span)
    .await;
}

fn status_processing(status: &mpsc::UnboundedSender<StatusEvent>, song_id: &str) {
    let _ = status.send(StatusEvent::Processing {
        song_id: song_id.to_string(),
    });
}

async fn run(
    job: ClipJob,
    config: &AudioConfig,
    source: &impl AudioSource,
    tails: &TailRegistry,
    output: &ProcessedClipsSender,
) -> Result<()> {
    let song = &job.song;

    // 1. Clip timing.
    let whole_song = config.clip_length <= 0.0
        || song.duration_seconds <= 0.0
        || config.clip_length > song.duration_seconds;
    let (start, clip_len) = if whole_song {
        (0.0, song.duration_seconds)
    } else {
        (
            choose_start_seconds(song.duration_seconds, config.clip_length),
            config.clip_length,
        )
    };

    // 2. Fetch.
    let fetch_whole = whole_song || config.clip_length > song.duration_seconds / 2.0;
    let bytes = if fetch_whole {
        source.fetch_full(&song.id).await?
    } else {
        source
            .fetch_range(
                &song.id,
                crate::audio::source::TimeRange {
                    start_seconds: start,
                    end_seconds: start + clip_len,
                },
            )
            .await?
    };

    // 3. Decode and normalize.
    let decoded = decoder::decode_bytes(bytes, None)?;
    let gain = 10f32.powf(config.volume_adjustment / 20.0);
    let remixed = decoder::remix_channels(&decoded.samples, decoded.channels, config.channels);
    let resampled = resampler::resample_all(
        &remixed,
        decoded.sample_rate,
        config.sample_rate,
        config.channels,
    )?;
    // Both shipped `AudioSource` impls degrade `fetch_range` to a full
    // fetch (see audio/source.rs), so the decoded buffer always starts
    // at the song's beginning regardless of which fetch path ran. Trim
    // by time whenever a window is wanted at all, not only when we know
    // we asked for the whole song.
    let mut clip = if !whole_song {
        decoder::trim_seconds(
            &crate::audio::types::DecodedAudio {
                samples: resampled,
                sample_rate: config.sample_rate,
                channels: config.channels,
            },
            start,
            clip_len,
        )
    } else {
        resampled
    };
    for sample in clip.iter_mut() {
        *sample *= gain;
    }

    // 4. Envelopes.
    let effective_clip_len = clip.len() as f64 / config.channels as f64 / config.sample_rate as f64;
    let fade_samples_per_channel = config.fade_samples_for(effective_clip_len);
    let fade_samples = fade_samples_per_channel.min(clip.len() / (2 * config.channels.max(1) as usize).max(1));
    fade::linear_fade_in_out(&mut clip, config.channels, fade_samples);

    let fade_len = fade_samples * config.channels as usize;

    // 5. Await predecessor.
    let tail_prev = match &job.prev_song_id {
        Some(prev_id) => tails.wait_for_tail(prev_id).await,
        None => None,
    };

    // 6. Join.
    let mut joined = match &tail_prev {
        Some(tail) if fade_len > 0 && tail.len() == fade_len => {
            let mut head = vec![0.0f32; fade_len];
            head.copy_from_slice(&clip[..fade_len]);
            let mut crossfaded = vec![0.0f32; fade_len];
            fade::crossfade_sum(tail, &head, &mut crossfaded);
            let mut out = crossfaded;
            out.extend_from_slice(&clip[fade_len..clip.len() - fade_len]);
            out
        }
        _ => clip[..clip.len() - fade_len].to_vec(),
    };
    if job.is_final {
        joined.extend_from_slice(&clip[clip.len() - fade_len..]);
    }

    // 7. Publish tail for the successor.
    let own_tail = if job.is_final {
        None
    } else {
        Some(clip[clip.len() - fade_len..].to_vec())
    };
    tails.publish(&song.id, own_tail).await;

    // 8. Enqueue.
    output
        .send(ProcessedClip {
            song_id: song.id.clone(),
            title: song.title.clone(),
            samples: joined,
            tag: song.index as i32,
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_start_stays_within_valid_range() {
        for _ in 0..200 {
            let start = choose_start_seconds(120.0, 30.0);
            assert!((0.0..=90.0).contains(&start));
        }
    }

    #[test]
    fn choose_start_handles_degenerate_range() {
        assert_eq!(choose_start_seconds(20.0, 30.0), 0.0);
    }

    #[tokio::test]
    async fn tail_registry_roundtrips_published_tail() {
        let registry = TailRegistry::new();
        let publisher = async {
            registry.publish("song-a", Some(vec![1.0, 2.0])).await;
        };
        let waiter = registry.wait_for_tail("song-a");
        let (_, tail) = tokio::join!(publisher, waiter);
        assert_eq!(tail, Some(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn failed_predecessor_publishes_none() {
        let registry = TailRegistry::new();
        registry.publish("song-a", None).await;
        assert_eq!(registry.wait_for_tail("song-a").await, None);
    }
}
