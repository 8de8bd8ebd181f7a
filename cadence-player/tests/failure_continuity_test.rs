//! Scheduler + worker pool + TailRegistry + queue, wired end to end
//! through the public API, exercising the case where every download
//! fails: the chain must still admit every song, publish a `None` tail
//! per failed song so each successor treats itself as a first clip
//! rather than stalling, and still reach the terminal sentinel once
//! the playlist (repeat off) is exhausted.

use cadence_common::{AudioConfig, StatusEvent};
use cadence_player::audio::{AudioSource, TimeRange};
use cadence_player::playback::{bounded_queue, QueueItem, Scheduler, Song, TailRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// An `AudioSource` whose every fetch fails, simulating a download
/// backend that is entirely unreachable.
struct AlwaysFailingSource;

impl AudioSource for AlwaysFailingSource {
    async fn fetch_full(&self, song_id: &str) -> cadence_player::error::Result<Vec<u8>> {
        Err(cadence_player::error::Error::Fetch(
            cadence_player::error::FetchError::RetriesExhausted {
                song_id: song_id.to_string(),
                attempts: 3,
            },
        ))
    }

    async fn fetch_range(
        &self,
        song_id: &str,
        _range: TimeRange,
    ) -> cadence_player::error::Result<Vec<u8>> {
        Err(cadence_player::error::Error::Fetch(
            cadence_player::error::FetchError::RetriesExhausted {
                song_id: song_id.to_string(),
                attempts: 3,
            },
        ))
    }
}

fn song(id: &str, index: usize) -> Song {
    Song {
        id: id.to_string(),
        title: format!("Song {id}"),
        artists: vec!["Nobody".to_string()],
        duration_seconds: 30.0,
        index,
    }
}

#[tokio::test]
async fn chain_survives_every_download_failing_and_still_terminates() {
    let songs = vec![song("a", 0), song("b", 1), song("c", 2)];
    let mut config = AudioConfig::default();
    config.worker_count = 2;
    config.buffer_seconds = 10.0;
    config.repeat = false;
    let config = Arc::new(config);

    let (clip_tx, mut clip_rx) = bounded_queue(songs.len());
    let tails = Arc::new(TailRegistry::new());
    let scheduler = Scheduler::new(songs, Arc::clone(&config));
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<StatusEvent>();

    let run = scheduler.run(Arc::new(AlwaysFailingSource), Arc::clone(&tails), clip_tx, status_tx);

    let drain_errors = async {
        let mut errors = 0;
        while let Some(event) = status_rx.recv().await {
            if matches!(event, StatusEvent::Error { .. }) {
                errors += 1;
            }
        }
        errors
    };

    let (_, errors) = timeout(Duration::from_secs(5), async { tokio::join!(run, drain_errors) })
        .await
        .expect("pipeline did not finish within 5s");

    assert_eq!(errors, 3, "every song should have reported a download error");

    // No clips were ever produced, but the sentinel must still arrive
    // so the Player's filler knows the loader is done.
    let mut saw_sentinel = false;
    while let Some(item) = clip_rx.recv_timeout().await {
        match item {
            QueueItem::Clip(_) => panic!("no clip should have been produced"),
            QueueItem::Sentinel => {
                saw_sentinel = true;
                break;
            }
        }
    }
    assert!(saw_sentinel, "terminal sentinel must still be emitted on an all-failure run");

    // Every song's tail was published as None, not left dangling.
    for id in ["a", "b", "c"] {
        assert_eq!(tails.wait_for_tail(id).await, None);
    }
}
