//! Scheduler + worker pool + TailRegistry wired end to end through the
//! public API with two real (WAV) clips, exercising the actual join
//! assembly step 6 describes: the first clip hands off its tail instead
//! of playing it, the final clip gets its own fade-out tail appended,
//! and the boundary between them is an equal-sum crossfade rather than
//! a hard cut.

use cadence_common::AudioConfig;
use cadence_player::audio::FileAudioSource;
use cadence_player::playback::{bounded_queue, QueueItem, Scheduler, Song, TailRegistry};
use hound::{WavSpec, WavWriter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

const SAMPLE_RATE: u32 = 44100;
const CHANNELS: u16 = 2;

/// Write a `duration_secs` sine-wave stereo WAV file, decodable by the
/// pipeline's symphonia-based decoder the same way a downloaded file
/// would be.
fn write_sine_wav(path: &std::path::Path, duration_secs: f64, frequency_hz: f32) {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let frame_count = (duration_secs * SAMPLE_RATE as f64).round() as usize;
    for frame in 0..frame_count {
        let t = frame as f32 / SAMPLE_RATE as f32;
        let sample = (t * frequency_hz * std::f32::consts::TAU).sin() * 0.5;
        let quantized = (sample * i16::MAX as f32) as i16;
        for _ in 0..CHANNELS {
            writer.write_sample(quantized).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn song(id: &str, index: usize, duration_seconds: f64) -> Song {
    Song {
        id: id.to_string(),
        title: format!("Song {id}"),
        artists: vec![],
        duration_seconds,
        index,
    }
}

#[tokio::test]
async fn two_clips_join_with_a_crossfade_and_the_final_one_keeps_its_tail() {
    let dir = tempfile::tempdir().unwrap();
    write_sine_wav(&dir.path().join("a.wav"), 20.0, 440.0);
    write_sine_wav(&dir.path().join("b.wav"), 20.0, 554.0);

    let mut config = AudioConfig::default();
    config.sample_rate = SAMPLE_RATE;
    config.channels = CHANNELS;
    config.clip_length = 8.0; // <= duration/2 (10.0): takes the range-fetch path.
    config.fade_duration = 2.0;
    config.worker_count = 2;
    config.buffer_seconds = 60.0;
    config.repeat = false;
    let config = Arc::new(config);

    let fade_samples = config.fade_samples_for(config.clip_length);
    let fade_len = fade_samples * CHANNELS as usize;
    let clip_total_samples = (config.clip_length * SAMPLE_RATE as f64).round() as usize * CHANNELS as usize;

    let songs = vec![song("a", 0, 20.0), song("b", 1, 20.0)];
    let (clip_tx, mut clip_rx) = bounded_queue(songs.len());
    let tails = Arc::new(TailRegistry::new());
    let scheduler = Scheduler::new(songs, Arc::clone(&config));
    let (status_tx, _status_rx) = mpsc::unbounded_channel();
    let source = Arc::new(FileAudioSource::new(dir.path().to_path_buf()));

    let run = scheduler.run(Arc::clone(&source), Arc::clone(&tails), clip_tx, status_tx);

    let collect = async {
        let mut clips = Vec::new();
        loop {
            match clip_rx.recv_timeout().await {
                Some(QueueItem::Clip(clip)) => clips.push(clip),
                Some(QueueItem::Sentinel) => break,
                None => continue,
            }
        }
        clips
    };

    // `TailRegistry::clear()` runs right after the terminal sentinel is
    // queued, once `run` resolves, so A's tail must be captured
    // concurrently with the pipeline rather than read back afterward.
    let tail_a_future = tails.wait_for_tail("a");

    let (_, clips, tail_a) = timeout(
        Duration::from_secs(20),
        async { tokio::join!(run, collect, tail_a_future) },
    )
    .await
    .expect("pipeline did not finish within 20s");

    assert_eq!(clips.len(), 2, "both songs should have produced a clip");
    let first = clips.iter().find(|c| c.song_id == "a").unwrap();
    let second = clips.iter().find(|c| c.song_id == "b").unwrap();

    // First clip has no predecessor: it hands off its tail instead of
    // playing it, so its own joined output is clip_len - F.
    assert_eq!(
        first.samples.len(),
        clip_total_samples - fade_len,
        "first clip should omit its leading crossfade tail (no predecessor)"
    );

    // Second clip is the last admitted song with repeat off: it's
    // crossfaded with A's tail *and* keeps its own trailing fade-out,
    // so its joined length is the full clip.
    assert_eq!(
        second.samples.len(),
        clip_total_samples,
        "final clip should retain its own fade-out tail"
    );

    // Boundary overlap: A's tail was published to the registry before
    // being dropped from A's own output; the crossfade invariant says
    // joined[frame 0] = tail[0] + head[0], and head's fade-in ramp is
    // exactly 0 at its first frame, so the two should agree exactly.
    let tail_a = tail_a.expect("a's tail should have been published (it's not the failed-predecessor case)");
    assert_eq!(tail_a.len(), fade_len);
    assert_eq!(&second.samples[..CHANNELS as usize], &tail_a[..CHANNELS as usize]);
}
