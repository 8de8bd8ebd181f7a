//! Admission, ordering, and shuffle/repeat policy over the playlist.
//!
//! The worker pool is a fixed-size set of tasks draining one shared,
//! mutex-guarded channel receiver — the "fixed pool drains one shared
//! FIFO" idiom in this crate's async style.

use crate::audio::source::AudioSource;
use crate::playback::clip_processor::{self, TailRegistry};
use crate::playback::queue::ProcessedClipsSender;
use crate::playback::types::{ClipJob, Song};
use cadence_common::StatusEvent;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::info;

const ADMISSION_EVAL_INTERVAL: Duration = Duration::from_millis(500);

/// A song has finished processing (successfully or not); reported back
/// to the admission loop so it can retire the song from `in_flight` and
/// re-evaluate how much is queued.
struct Completion {
    song_id: String,
    clip_length_seconds: f64,
}

struct AdmissionState {
    processed_ids: HashSet<String>,
    in_flight: Vec<String>,
    last_cycle_recent: VecDeque<String>,
    last_admitted_id: Option<String>,
    cycle_index: u64,
    queued_lengths: VecDeque<f64>,
}

/// Coordinates admission of songs into the worker pool, ordering,
/// shuffle-with-history, repeat, and cycle rollover.
pub struct Scheduler {
    songs: Vec<Song>,
    config: Arc<cadence_common::AudioConfig>,
    state: Mutex<AdmissionState>,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(songs: Vec<Song>, config: Arc<cadence_common::AudioConfig>) -> Self {
        let state = AdmissionState {
            processed_ids: HashSet::new(),
            in_flight: Vec::new(),
            last_cycle_recent: VecDeque::new(),
            last_admitted_id: None,
            cycle_index: 0,
            queued_lengths: VecDeque::new(),
        };
        Self {
            songs,
            config,
            state: Mutex::new(state),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the admission loop plus a fixed-size worker pool to
    /// completion (or until stopped). Returns once `loader:complete`
    /// has been emitted, or immediately on stop.
    pub async fn run<S: AudioSource>(
        &self,
        source: Arc<S>,
        tails: Arc<TailRegistry>,
        output: ProcessedClipsSender,
        status: mpsc::UnboundedSender<StatusEvent>,
    ) {
        let worker_count = self.config.worker_count.max(1);
        let (job_tx, job_rx) = mpsc::channel::<ClipJob>(worker_count * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let source = Arc::clone(&source);
            let tails = Arc::clone(&tails);
            let output = output.clone();
            let status = status.clone();
            let completion_tx = completion_tx.clone();
            let config = Arc::clone(&self.config);
            workers.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = job_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else { break };
                    let song_id = job.song.id.clone();
                    let clip_length_seconds = if job.song.duration_seconds > 0.0 {
                        job.song.duration_seconds
                    } else {
                        0.0
                    };
                    clip_processor::process_job(job, &config, source.as_ref(), &tails, &output, &status)
                        .await;
                    let _ = completion_tx.send(Completion {
                        song_id,
                        clip_length_seconds,
                    });
                }
                info!(worker_id, "clip worker exiting");
            }));
        }
        drop(completion_tx);

        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            while let Ok(completion) = completion_rx.try_recv() {
                let mut state = self.state.lock().await;
                state.in_flight.retain(|id| id != &completion.song_id);
                state.processed_ids.insert(completion.song_id);
            }

            let emitted_completion = {
                let mut state = self.state.lock().await;
                self.evaluate_and_admit(&mut state, &job_tx, &tails, &output)
                    .await
            };
            if emitted_completion {
                break;
            }

            sleep(ADMISSION_EVAL_INTERVAL).await;
        }

        drop(job_tx);
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// One admission evaluation pass. Returns true if `loader:complete`
    /// was just emitted (repeat off, playlist exhausted).
    async fn evaluate_and_admit(
        &self,
        state: &mut AdmissionState,
        job_tx: &mpsc::Sender<ClipJob>,
        tails: &TailRegistry,
        output: &ProcessedClipsSender,
    ) -> bool {
        // Compensation target per the admission rule: jobs still in the
        // worker pool plus clips already handed off to the
        // ProcessedClipsQueue but not yet drained by the filler. Without
        // the queue term, clips sitting on that queue go uncounted and
        // admission over-admits by up to the queue's capacity.
        let in_flight_and_queued = state.in_flight.len() + output.len();
        while state.queued_lengths.len() > in_flight_and_queued {
            state.queued_lengths.pop_front();
        }

        loop {
            let queued_seconds: f64 = state.queued_lengths.iter().sum();
            if queued_seconds >= self.config.buffer_seconds {
                return false;
            }

            if state.processed_ids.len() >= self.songs.len() {
                if self.config.repeat {
                    self.cycle_rollover(state);
                } else {
                    self.emit_terminal_sentinel(tails, output).await;
                    return true;
                }
            }

            let candidates = self.pick_candidates(state);
            if candidates.is_empty() {
                return false;
            }

            let ordered = self.order_candidates(state, candidates);
            let remaining_after_this_cycle = self.songs.len()
                - state.processed_ids.len()
                - state.in_flight.len()
                - ordered.len();
            let last_index = ordered.len().saturating_sub(1);

            for (i, song) in ordered.into_iter().enumerate() {
                // Only the last song in the chain this batch admits, when
                // it's also the last the playlist will ever offer, closes
                // the cycle: `prev_song_id` chains admission order within
                // `ordered`, so the tail of the chain is `i == last_index`,
                // not its head.
                let is_final =
                    !self.config.repeat && remaining_after_this_cycle == 0 && i == last_index;
                let job = ClipJob {
                    prev_song_id: state.last_admitted_id.clone(),
                    is_final,
                    song: song.clone(),
                };
                state.last_admitted_id = Some(song.id.clone());
                state.in_flight.push(song.id.clone());
                state
                    .queued_lengths
                    .push_back(song.duration_seconds.max(self.config.clip_length));
                if job_tx.send(job).await.is_err() {
                    return false;
                }
            }
        }
    }

    fn pick_candidates<'a>(&'a self, state: &AdmissionState) -> Vec<&'a Song> {
        let limit = 2 * self.config.worker_count.max(1);
        self.songs
            .iter()
            .filter(|s| !state.processed_ids.contains(&s.id) && !state.in_flight.contains(&s.id))
            .take(limit)
            .collect()
    }

    fn order_candidates<'a>(&self, state: &AdmissionState, candidates: Vec<&'a Song>) -> Vec<&'a Song> {
        if !self.config.shuffle {
            return candidates;
        }
        let (mut recent, mut others): (Vec<&Song>, Vec<&Song>) = candidates
            .into_iter()
            .partition(|s| state.last_cycle_recent.contains(&s.id));
        let mut rng = rand::thread_rng();
        recent.shuffle(&mut rng);
        others.shuffle(&mut rng);
        others.into_iter().chain(recent).collect()
    }

    fn cycle_rollover(&self, state: &mut AdmissionState) {
        let keep = self.songs.len() / 3;
        let mut recent: VecDeque<String> = state.in_flight.iter().cloned().collect();
        for id in state.processed_ids.iter() {
            if recent.len() >= keep {
                break;
            }
            recent.push_back(id.clone());
        }
        while recent.len() > keep {
            recent.pop_front();
        }
        state.last_cycle_recent = recent;
        state.processed_ids.clear();
        state.cycle_index += 1;
        info!(cycle_index = state.cycle_index, "cycle rollover");
    }

    async fn emit_terminal_sentinel(&self, tails: &TailRegistry, output: &ProcessedClipsSender) {
        tails.clear().await;
        output.send_sentinel().await;
        info!("loader complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str, index: usize) -> Song {
        Song {
            id: id.to_string(),
            title: id.to_string(),
            artists: vec![],
            duration_seconds: 60.0,
            index,
        }
    }

    #[tokio::test]
    async fn cycle_rollover_keeps_a_third_as_recent() {
        let songs = (0..9).map(|i| song(&format!("s{i}"), i)).collect::<Vec<_>>();
        let config = Arc::new(cadence_common::AudioConfig::default());
        let scheduler = Scheduler::new(songs.clone(), config);
        let mut state = AdmissionState {
            processed_ids: songs.iter().map(|s| s.id.clone()).collect(),
            in_flight: vec![],
            last_cycle_recent: VecDeque::new(),
            last_admitted_id: None,
            cycle_index: 0,
            queued_lengths: VecDeque::new(),
        };
        scheduler.cycle_rollover(&mut state);
        assert_eq!(state.last_cycle_recent.len(), 3);
        assert!(state.processed_ids.is_empty());
        assert_eq!(state.cycle_index, 1);
    }

    #[test]
    fn shuffle_keeps_recent_songs_at_the_tail() {
        let songs = (0..6).map(|i| song(&format!("s{i}"), i)).collect::<Vec<_>>();
        let mut config = cadence_common::AudioConfig::default();
        config.shuffle = true;
        let scheduler = Scheduler::new(songs.clone(), Arc::new(config));
        let mut recent = VecDeque::new();
        recent.push_back("s0".to_string());
        recent.push_back("s1".to_string());
        let state = AdmissionState {
            processed_ids: HashSet::new(),
            in_flight: vec![],
            last_cycle_recent: recent,
            last_admitted_id: None,
            cycle_index: 0,
            queued_lengths: VecDeque::new(),
        };
        let candidates: Vec<&Song> = songs.iter().collect();
        let ordered = scheduler.order_candidates(&state, candidates);
        let recent_positions: Vec<usize> = ordered
            .iter()
            .enumerate()
            .filter(|(_, s)| s.id == "s0" || s.id == "s1")
            .map(|(i, _)| i)
            .collect();
        assert!(recent_positions.iter().all(|&p| p >= ordered.len() - 2));
    }
}
