//! # Cadence Player
//!
//! Continuous, gapless streaming playback over an HTTP audio backend.
//!
//! **Architecture:** playlist -> Scheduler -> worker pool -> ClipProcessor
//! -> ProcessedClipsQueue -> Player filler -> RingBuffer -> audio callback
//! -> device.

use anyhow::Result;
use cadence_common::{AudioConfig, StatusDisplay, StatusEvent};
use cadence_player::audio::HttpAudioSource;
use cadence_player::playback::Song as PlaybackSong;
use cadence_player::Supervisor;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cadence-player")]
#[command(about = "Continuous, gapless streaming music player")]
#[command(version)]
struct Args {
    /// Path to the AudioConfig TOML bootstrap file.
    #[arg(short, long, default_value = "cadence.toml")]
    config: PathBuf,

    /// Path to the playlist JSON file (overrides `recent_playlist` in config).
    #[arg(short, long)]
    playlist: Option<PathBuf>,

    /// Base URL of the download backend, e.g. http://localhost:8080/audio.
    #[arg(long, default_value = "http://localhost:8080/audio")]
    backend_url: String,

    /// Output device name (default device if omitted).
    #[arg(short, long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_player=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    info!(config = %args.config.display(), "starting cadence-player");

    let config = AudioConfig::load(&args.config)?;

    let playlist_path = args
        .playlist
        .or_else(|| config.recent_playlist.clone())
        .ok_or_else(|| anyhow::anyhow!("no playlist given on the command line or in config"))?;
    let playlist = cadence_common::playlist::load(&playlist_path)?;
    let songs: Vec<PlaybackSong> = playlist
        .iter()
        .enumerate()
        .map(|(i, s)| PlaybackSong::from_playlist(s, i))
        .collect();
    info!(count = songs.len(), "loaded playlist");

    let source = HttpAudioSource::new(args.backend_url)?;
    let (supervisor, mut status_rx) = Supervisor::start(config, songs, source, args.device).await?;

    // Stands in for the out-of-scope GUI front-end: applies the status
    // display's priority/superseding rules before logging, so what gets
    // surfaced is what a real front-end would display rather than
    // every intermediate event at equal weight.
    let status_task = tokio::spawn(async move {
        let mut display = StatusDisplay::new();
        while let Some(event) = status_rx.recv().await {
            let is_error = matches!(event, StatusEvent::Error { .. });
            let is_complete = matches!(event, StatusEvent::PlaybackComplete);
            if event.is_control() {
                info!(%event);
            } else if display.offer(event.clone()) {
                if is_error {
                    tracing::error!(%event);
                } else {
                    info!(%event);
                }
            }
            if is_complete {
                break;
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, stopping");
        }
        _ = status_task => {
            info!("playback complete");
        }
    }

    supervisor.stop().await;
    Ok(())
}
