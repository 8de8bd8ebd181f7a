//! Playlist file loading and schema migration.
//!
//! Playlists are arrays of song records in a versioned JSON file. The
//! current (v2) schema is `[{id, title, artists, duration}]` with
//! `duration` in integer seconds. Older (v1) records carry a `url`
//! field instead of `id`, and `duration` may be a `"H:M:S"`/`"M:S"`
//! string. `load` transparently migrates v1 records, writing a `.bak`
//! backup before overwriting the original with pretty-printed v2 JSON.
//!
//! The playlist file format itself — where it lives, who edits it —
//! belongs to an out-of-scope collaborator; this module only knows how
//! to parse and normalize what it's handed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One playlist entry in the current (v2) schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    pub duration: u32,
}

/// Raw record as read off disk, before migration. Permissive enough to
/// accept either schema version.
#[derive(Debug, Deserialize)]
struct RawSong {
    id: Option<String>,
    url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artists: Vec<String>,
    #[serde(default)]
    duration: DurationField,
}

/// `duration` may already be an integer (v2) or an `"H:M:S"`/`"M:S"`
/// string (v1). Untagged so either shape deserializes without the
/// caller pre-sniffing the file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationField {
    Seconds(u32),
    Timestamp(String),
    Missing,
}

impl Default for DurationField {
    fn default() -> Self {
        DurationField::Missing
    }
}

const DEFAULT_DURATION_SECS: u32 = 180;

/// Parse `"H:M:S"` or `"M:S"` into integer seconds. Defaults to 180 on
/// any parse failure rather than erroring, since a malformed duration
/// shouldn't drop the whole song.
fn parse_duration(raw: &DurationField) -> u32 {
    match raw {
        DurationField::Seconds(s) => *s,
        DurationField::Missing => DEFAULT_DURATION_SECS,
        DurationField::Timestamp(s) => {
            let parts: Vec<&str> = s.split(':').collect();
            let parsed: Option<u32> = match parts.as_slice() {
                [h, m, sec] => {
                    match (h.parse::<u32>(), m.parse::<u32>(), sec.parse::<u32>()) {
                        (Ok(h), Ok(m), Ok(sec)) => Some(h * 3600 + m * 60 + sec),
                        _ => None,
                    }
                }
                [m, sec] => match (m.parse::<u32>(), sec.parse::<u32>()) {
                    (Ok(m), Ok(sec)) => Some(m * 60 + sec),
                    _ => None,
                },
                _ => None,
            };
            parsed.unwrap_or(DEFAULT_DURATION_SECS)
        }
    }
}

/// Extract the `v=` query parameter from a v1 `url` field, used as the
/// v2 `id`. Falls back to the whole URL if no `v=` parameter is
/// present, so a migrated playlist never loses an entry outright.
fn extract_video_id(url: &str) -> String {
    url.split('?')
        .nth(1)
        .and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("v=").map(|v| v.to_string()))
        })
        .unwrap_or_else(|| url.to_string())
}

impl From<RawSong> for Song {
    fn from(raw: RawSong) -> Self {
        let duration = parse_duration(&raw.duration);
        let id = raw
            .id
            .or_else(|| raw.url.as_deref().map(extract_video_id))
            .unwrap_or_default();
        Song {
            id,
            title: raw.title,
            artists: raw.artists,
            duration,
        }
    }
}

/// True if any record in the raw file needed migration (had a `url`
/// field, or a non-integer `duration`).
fn raw_needed_migration(raw: &[RawSong]) -> bool {
    raw.iter()
        .any(|r| r.id.is_none() || !matches!(r.duration, DurationField::Seconds(_)))
}

/// Load a playlist file, migrating v1 records to v2 in place.
///
/// If migration was necessary, writes `<path>.bak` containing the
/// original bytes, then overwrites `path` with pretty-printed v2 JSON.
/// Loading an already-v2 file is a no-op beyond the read/parse.
pub fn load(path: &Path) -> Result<Vec<Song>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Playlist(format!("failed to read {}: {e}", path.display())))?;
    let raw: Vec<RawSong> = serde_json::from_str(&text)
        .map_err(|e| Error::Playlist(format!("failed to parse {}: {e}", path.display())))?;

    let needs_migration = raw_needed_migration(&raw);
    let songs: Vec<Song> = raw.into_iter().map(Song::from).collect();

    if needs_migration {
        let backup_path = backup_path_for(path);
        std::fs::write(&backup_path, &text).map_err(|e| {
            Error::Playlist(format!("failed to write backup {}: {e}", backup_path.display()))
        })?;
        let pretty = serde_json::to_string_pretty(&songs)
            .map_err(|e| Error::Playlist(format!("failed to serialize migrated playlist: {e}")))?;
        std::fs::write(path, pretty)
            .map_err(|e| Error::Playlist(format!("failed to write {}: {e}", path.display())))?;
    }

    Ok(songs)
}

fn backup_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v2_file_without_migration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(
            &path,
            r#"[{"id":"abc123","title":"Song A","artists":["Artist"],"duration":210}]"#,
        )
        .unwrap();
        let songs = load(&path).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, "abc123");
        assert_eq!(songs[0].duration, 210);
        assert!(!dir.path().join("list.json.bak").exists());
    }

    #[test]
    fn migrates_v1_url_and_timestamp_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(
            &path,
            r#"[{"url":"https://example.com/watch?v=xyz789","title":"Song B","duration":"3:45"}]"#,
        )
        .unwrap();
        let songs = load(&path).unwrap();
        assert_eq!(songs[0].id, "xyz789");
        assert_eq!(songs[0].duration, 225);

        let backup = dir.path().join("list.json.bak");
        assert!(backup.is_file());
        let migrated = std::fs::read_to_string(&path).unwrap();
        assert!(migrated.contains("\"id\": \"xyz789\""));
    }

    #[test]
    fn unparseable_duration_defaults_to_180() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(
            &path,
            r#"[{"url":"https://example.com/watch?v=xyz789","title":"Song B","duration":"garbage"}]"#,
        )
        .unwrap();
        let songs = load(&path).unwrap();
        assert_eq!(songs[0].duration, 180);
    }

    #[test]
    fn migration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(
            &path,
            r#"[{"url":"https://example.com/watch?v=xyz789","title":"Song B","duration":"3:45"}]"#,
        )
        .unwrap();
        let first = load(&path).unwrap();
        let second = load(&path).unwrap();
        assert_eq!(first, second);
        // second load must not have needed to migrate again.
        let backup = dir.path().join("list.json.bak");
        let backup_contents_after_first = std::fs::read_to_string(&backup).unwrap();
        load(&path).unwrap();
        let backup_contents_after_third = std::fs::read_to_string(&backup).unwrap();
        assert_eq!(backup_contents_after_first, backup_contents_after_third);
    }
}
