//! Data model for the streaming pipeline: songs as admitted into a
//! playback cycle, the work items the Scheduler hands to the worker
//! pool, and the joined PCM segments the worker pool hands to the
//! Player.

/// A song as admitted into the current playback cycle. Immutable for
/// the cycle's lifetime; `index` records admission order within the
/// cycle and is used for shuffle bookkeeping, not for wall-clock order
/// (that's enforced by `prev_song_id` chaining in `ClipJob`).
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    /// 0 if unknown; the ClipProcessor treats 0 as "use the whole song".
    pub duration_seconds: f64,
    pub index: usize,
}

impl Song {
    pub fn from_playlist(song: &cadence_common::Song, index: usize) -> Self {
        Song {
            id: song.id.clone(),
            title: song.title.clone(),
            artists: song.artists.clone(),
            duration_seconds: song.duration as f64,
            index,
        }
    }
}

/// One unit of work submitted to the worker pool by the Scheduler's
/// admission loop.
#[derive(Debug, Clone)]
pub struct ClipJob {
    pub song: Song,
    pub prev_song_id: Option<String>,
    /// True only for the last admitted song of a cycle when repeat is
    /// off — the only job whose output must retain its own fade-out
    /// tail rather than handing it to a successor.
    pub is_final: bool,
}

/// The joined PCM segment a ClipProcessor hands to the
/// ProcessedClipsQueue. `samples` already carries any crossfade join
/// with the predecessor's tail; it is ready to be written verbatim
/// into the RingBuffer.
///
/// `tag` is the song's playlist admission index rather than a hash of
/// its id — collision-free by construction, and stable across repeat
/// cycles since the same song always carries the same index.
#[derive(Debug, Clone)]
pub struct ProcessedClip {
    pub song_id: String,
    pub title: String,
    pub samples: Vec<f32>,
    pub tag: i32,
}
