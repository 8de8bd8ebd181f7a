//! Player: owns the RingBuffer, runs the filler and command tasks, and
//! implements the real-time audio callback.

use crate::audio::output::AudioOutput;
use crate::error::Result;
use crate::playback::limiter::PeakLimiter;
use crate::playback::queue::{ProcessedClipsReceiver, QueueItem};
use crate::playback::ring_buffer::{ReadOutcome, RingBuffer};
use cadence_common::{AudioConfig, Command, StatusEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, info};


/// State shared between the filler, command loop, and the real-time
/// callback. `song_titles`/`tag_to_id` are written only by the filler
/// and read only by the callback; both are behind a small `Mutex`
/// rather than lock-free publication (see DESIGN.md) since they're
/// tiny insert-mostly maps and the hold time is a single hash lookup.
struct Shared {
    ring: RingBuffer,
    limiter: PeakLimiter,
    paused: AtomicBool,
    prefill_complete: AtomicBool,
    current_volume_bits: AtomicU32,
    current_song_id: Mutex<Option<String>>,
    tag_to_id: Mutex<HashMap<i32, String>>,
    song_titles: Mutex<HashMap<String, String>>,
    stop: AtomicBool,
}

impl Shared {
    fn volume(&self) -> f32 {
        f32::from_bits(self.current_volume_bits.load(Ordering::Acquire))
    }

    fn set_volume(&self, v: f32) {
        self.current_volume_bits.store(v.to_bits(), Ordering::Release);
    }
}

pub struct Player {
    shared: Arc<Shared>,
    config: Arc<AudioConfig>,
    status_for_callback: mpsc::UnboundedSender<StatusEvent>,
}

impl Player {
    pub fn new(config: Arc<AudioConfig>, status: mpsc::UnboundedSender<StatusEvent>) -> Self {
        let ring_capacity =
            (config.buffer_seconds * config.sample_rate as f64 * config.channels as f64).round() as usize;
        let block_size = config.block_size * config.channels as usize;
        let shared = Arc::new(Shared {
            ring: RingBuffer::new(ring_capacity, block_size),
            limiter: PeakLimiter::new(config.limiter_threshold),
            paused: AtomicBool::new(false),
            prefill_complete: AtomicBool::new(false),
            current_volume_bits: AtomicU32::new(1.0f32.to_bits()),
            current_song_id: Mutex::new(None),
            tag_to_id: Mutex::new(HashMap::new()),
            song_titles: Mutex::new(HashMap::new()),
            stop: AtomicBool::new(false),
        });
        Self {
            shared,
            config,
            status_for_callback: status,
        }
    }

    /// Filler task: drains the ProcessedClipsQueue into the ring,
    /// chunked into `block_size` writes, emitting buffering progress
    /// until the prefill target is first reached.
    pub async fn run_filler(
        &self,
        mut queue: ProcessedClipsReceiver,
        status: mpsc::UnboundedSender<StatusEvent>,
    ) {
        let block_size = self.config.block_size * self.config.channels as usize;
        let prefill_target_samples =
            (self.config.prefill_time * self.config.sample_rate as f64 * self.config.channels as f64)
                .round() as usize;
        let mut written_since_prefill = 0usize;
        let mut last_percent_reported = -1i32;
        let mut announced_prefill_target = false;

        loop {
            if self.shared.stop.load(Ordering::SeqCst) {
                break;
            }
            match queue.recv_timeout().await {
                None => continue,
                Some(QueueItem::Sentinel) => {
                    self.shared.ring.set_loader_complete();
                    break;
                }
                Some(QueueItem::Clip(clip)) => {
                    let tag = clip.tag;
                    self.shared
                        .tag_to_id
                        .lock()
                        .unwrap()
                        .insert(tag, clip.song_id.clone());
                    self.shared
                        .song_titles
                        .lock()
                        .unwrap()
                        .insert(clip.song_id.clone(), clip.title.clone());

                    let mut offset = 0;
                    while offset < clip.samples.len() {
                        let end = (offset + block_size).min(clip.samples.len());
                        let chunk = &clip.samples[offset..end];
                        let written = self.shared.ring.write(chunk, tag);
                        offset += written;
                        if written == 0 {
                            sleep(Duration::from_secs_f64(self.config.buffer_backoff)).await;
                            continue;
                        }
                        if !self.shared.prefill_complete.load(Ordering::SeqCst) {
                            written_since_prefill += written;
                            let percent = ((written_since_prefill as f64
                                / prefill_target_samples.max(1) as f64)
                                * 100.0)
                                .min(100.0) as i32;
                            if percent >= last_percent_reported + 5 {
                                last_percent_reported = percent;
                                let _ = status.send(StatusEvent::Buffering {
                                    song_id: clip.song_id.clone(),
                                    percent: percent as f32,
                                });
                            }
                            if written_since_prefill >= prefill_target_samples {
                                self.shared.prefill_complete.store(true, Ordering::SeqCst);
                                if !announced_prefill_target {
                                    announced_prefill_target = true;
                                    let _ = status.send(StatusEvent::Audio {
                                        message: "prefill target reached".to_string(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        debug!("filler task exiting");
    }

    /// Command loop: executes PAUSE/RESUME/FORCE_START/STOP.
    pub async fn run_commands(&self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Pause => self.fade_to(0.0).await,
                Command::Resume => {
                    self.shared.paused.store(false, Ordering::SeqCst);
                    self.fade_to(1.0).await;
                }
                Command::ForceStart => {
                    if !self.shared.prefill_complete.load(Ordering::SeqCst) {
                        self.shared.prefill_complete.store(true, Ordering::SeqCst);
                    }
                }
                Command::Stop => {
                    self.shared.stop.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    async fn fade_to(&self, target: f32) {
        const TICK: Duration = Duration::from_millis(10);
        let steps = ((self.config.pause_fade / TICK.as_secs_f64()).round() as u32).max(1);
        let start = self.shared.volume();
        let mut ticker = interval(TICK);
        for step in 1..=steps {
            ticker.tick().await;
            let t = step as f32 / steps as f32;
            self.shared.set_volume(start + (target - start) * t);
        }
        self.shared.set_volume(target);
        if target == 0.0 {
            self.shared.paused.store(true, Ordering::SeqCst);
        }
    }

    /// Whether the prefill target has been reached at least once since
    /// the last underrun. Read by the Supervisor's prebuffer watchdog,
    /// which is independent of this gate: the watchdog force-starts a
    /// stalled prefill, this gate re-arms on every underrun.
    pub fn prefill_complete(&self) -> bool {
        self.shared.prefill_complete.load(Ordering::SeqCst)
    }

    /// Start the device output stream, wiring the real-time callback.
    pub fn start_output(&self, device_name: Option<&str>) -> Result<AudioOutput> {
        let mut output = AudioOutput::new(device_name, self.config.sample_rate, self.config.channels)?;
        let shared = Arc::clone(&self.shared);
        let status_for_cb = self.status_for_callback.clone();
        output.start(move |out: &mut [f32]| {
            audio_callback(&shared, out, &status_for_cb);
        })?;
        Ok(output)
    }
}

/// The real-time audio callback body. Takes only `Shared`'s ring lock;
/// `status.send` on an unbounded channel is non-blocking (a bounded
/// push into a lock-free queue), so it does not violate the
/// deadline-critical constraint either.
fn audio_callback(shared: &Shared, out: &mut [f32], status: &mpsc::UnboundedSender<StatusEvent>) {
    if shared.paused.load(Ordering::SeqCst) || !shared.prefill_complete.load(Ordering::SeqCst) {
        out.fill(0.0);
        return;
    }

    match shared.ring.read(out.len()) {
        ReadOutcome::Underrun => {
            out.fill(0.0);
            shared.prefill_complete.store(false, Ordering::SeqCst);
            let current = shared.current_song_id.lock().unwrap().clone();
            let _ = status.send(StatusEvent::Buffering {
                song_id: current.unwrap_or_default(),
                percent: 0.0,
            });
        }
        ReadOutcome::Eos => {
            let _ = status.send(StatusEvent::PlaybackComplete);
            out.fill(0.0);
        }
        ReadOutcome::Data { samples, tag } => {
            let n = samples.len().min(out.len());
            out[..n].copy_from_slice(&samples[..n]);
            if n < out.len() {
                out[n..].fill(0.0);
            }

            let song_id = shared.tag_to_id.lock().unwrap().get(&tag).cloned();
            if let Some(song_id) = song_id {
                let mut current = shared.current_song_id.lock().unwrap();
                if current.as_deref() != Some(song_id.as_str()) {
                    *current = Some(song_id.clone());
                    let title = shared
                        .song_titles
                        .lock()
                        .unwrap()
                        .get(&song_id)
                        .cloned()
                        .unwrap_or_default();
                    let _ = status.send(StatusEvent::Playing { song_id, title });
                }
            }

            let volume = shared.volume();
            for sample in out.iter_mut() {
                *sample *= volume;
            }
            shared.limiter.apply(out);
        }
    }
}
