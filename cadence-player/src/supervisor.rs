//! Supervisor: owns pipeline lifecycle and multiplexes Scheduler and
//! Player status into one stream.
//!
//! Spawns the Scheduler and Player as tasks on the same runtime rather
//! than isolated OS processes: the audio callback's real-time priority
//! comes from cpal's dedicated callback thread, so process isolation
//! buys nothing extra here. On stop, sends STOP, gives every task up to
//! 5 s to drain, then aborts stragglers.

use crate::audio::output::AudioOutput;
use crate::audio::source::AudioSource;
use crate::error::Result;
use crate::playback::{bounded_queue, Player, Scheduler, Song, TailRegistry};
use cadence_common::{AudioConfig, Command, StatusEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running pipeline: scheduler admission+worker-pool task, player
/// filler task, player command task, and the live output stream.
pub struct Supervisor {
    scheduler_handle: tokio::task::JoinHandle<()>,
    filler_handle: tokio::task::JoinHandle<()>,
    commands_handle: tokio::task::JoinHandle<()>,
    command_tx: mpsc::UnboundedSender<Command>,
    /// Shared with the Scheduler's admission loop so STOP propagates
    /// there too (the loop only otherwise breaks on playlist exhaustion
    /// with repeat off, which a `repeat = true` run would never reach).
    scheduler_stop: Arc<AtomicBool>,
    _output: AudioOutput,
}

impl Supervisor {
    /// Start the full pipeline: construct the Player and Scheduler,
    /// spawn them as isolated tasks, and begin rendering to the output
    /// device. Returns the running `Supervisor` plus a single
    /// multiplexed status stream.
    pub async fn start<S: AudioSource>(
        config: AudioConfig,
        songs: Vec<Song>,
        source: S,
        device_name: Option<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StatusEvent>)> {
        let config = Arc::new(config);
        let (status_tx, status_rx) = mpsc::unbounded_channel::<StatusEvent>();
        let (command_tx, command_rx) = mpsc::unbounded_channel::<Command>();

        let (clip_tx, clip_rx) = bounded_queue(songs.len());
        let tails = Arc::new(TailRegistry::new());
        let scheduler = Arc::new(Scheduler::new(songs, Arc::clone(&config)));
        let scheduler_stop = scheduler.stop_flag();

        let player = Arc::new(Player::new(Arc::clone(&config), status_tx.clone()));
        let output = player.start_output(device_name.as_deref())?;

        let scheduler_handle = {
            let scheduler = Arc::clone(&scheduler);
            let source = Arc::new(source);
            let tails = Arc::clone(&tails);
            let status_tx = status_tx.clone();
            tokio::spawn(async move {
                scheduler.run(source, tails, clip_tx, status_tx).await;
            })
        };

        let filler_handle = {
            let player = Arc::clone(&player);
            let status_tx = status_tx.clone();
            tokio::spawn(async move {
                player.run_filler(clip_rx, status_tx).await;
            })
        };

        let commands_handle = {
            let player = Arc::clone(&player);
            tokio::spawn(async move {
                player.run_commands(command_rx).await;
            })
        };

        {
            let player = Arc::clone(&player);
            let command_tx = command_tx.clone();
            let prebuffer_timeout = Duration::from_secs_f64(config.prebuffer_timeout.max(0.0));
            tokio::spawn(async move {
                tokio::time::sleep(prebuffer_timeout).await;
                if !player.prefill_complete() {
                    warn!(
                        seconds = prebuffer_timeout.as_secs_f64(),
                        "prebuffer timeout elapsed, forcing playback start"
                    );
                    let _ = command_tx.send(Command::ForceStart);
                }
            });
        }

        info!("pipeline started");
        Ok((
            Self {
                scheduler_handle,
                filler_handle,
                commands_handle,
                command_tx,
                scheduler_stop,
                _output: output,
            },
            status_rx,
        ))
    }

    pub fn send_command(&self, command: Command) {
        let _ = self.command_tx.send(command);
    }

    /// Stop the pipeline: send STOP, wait up to 5 s for all three tasks
    /// to drain (concurrently, so the 5 s budget is a ceiling on the
    /// whole shutdown rather than per task), then forcefully abort
    /// whatever is still alive past the deadline.
    pub async fn stop(self) {
        self.send_command(Command::Stop);
        self.scheduler_stop.store(true, Ordering::SeqCst);

        let Supervisor {
            scheduler_handle,
            filler_handle,
            commands_handle,
            ..
        } = self;

        tokio::join!(
            Self::join_or_abort(scheduler_handle, "scheduler"),
            Self::join_or_abort(filler_handle, "filler"),
            Self::join_or_abort(commands_handle, "commands"),
        );
        info!("pipeline stopped");
    }

    async fn join_or_abort(handle: tokio::task::JoinHandle<()>, name: &'static str) {
        let abort_handle = handle.abort_handle();
        if timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await.is_err() {
            warn!(task = name, "task did not drain within 5s, aborting");
            abort_handle.abort();
        }
    }
}
