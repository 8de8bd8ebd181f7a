//! Fetching compressed audio bytes.
//!
//! The download backend itself is an out-of-scope collaborator (it
//! supplies compressed bytes given an id and an optional byte range);
//! this module only defines the interface the ClipProcessor consumes,
//! plus one real implementation (HTTP fetch with retry) and one test
//! implementation (local files, for pipeline tests that can't reach a
//! network).

use crate::error::{Error, FetchError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// A half-open byte range request, in seconds of audio rather than raw
/// bytes — the backend is expected to translate.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Fetches compressed audio bytes for a song, either in full or
/// restricted to a time window.
pub trait AudioSource: Send + Sync + 'static {
    /// Fetch the whole song.
    fn fetch_full(
        &self,
        song_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Fetch only the given time range, if the backend supports partial
    /// fetches. Implementations may fall back to a full fetch.
    fn fetch_range(
        &self,
        song_id: &str,
        range: TimeRange,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches audio over HTTP, given a base URL template of the form
/// `{base}/{song_id}`. Retries transient failures up to three times
/// with a fixed backoff.
pub struct HttpAudioSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAudioSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_with_retry(&self, song_id: &str, range_header: Option<String>) -> Result<Vec<u8>> {
        let url = format!("{}/{song_id}", self.base_url);
        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.client.get(&url);
            if let Some(range) = &range_header {
                request = request.header(reqwest::header::RANGE, range.clone());
            }
            match request.send().await {
                Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 206 => {
                    return resp
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(|e| FetchError::Request {
                            song_id: song_id.to_string(),
                            reason: e.to_string(),
                        }
                        .into());
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}", resp.status());
                }
                Err(e) if e.is_timeout() => {
                    return Err(FetchError::Timeout {
                        song_id: song_id.to_string(),
                        seconds: REQUEST_TIMEOUT.as_secs(),
                    }
                    .into());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            warn!(song_id, attempt, error = %last_error, "fetch attempt failed, retrying");
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        Err(FetchError::RetriesExhausted {
            song_id: song_id.to_string(),
            attempts: MAX_ATTEMPTS,
        }
        .into())
    }
}

impl AudioSource for HttpAudioSource {
    async fn fetch_full(&self, song_id: &str) -> Result<Vec<u8>> {
        self.fetch_with_retry(song_id, None).await
    }

    async fn fetch_range(&self, song_id: &str, range: TimeRange) -> Result<Vec<u8>> {
        // Byte ranges are expressed in bytes by HTTP, but this backend
        // is opaque about bitrate; requesting the full resource and
        // letting the decoder trim by time is the only backend-agnostic
        // option, so range requests degrade to full fetches here. A
        // backend that knows its own bitrate can implement a tighter
        // `AudioSource` directly.
        let _ = range;
        self.fetch_with_retry(song_id, None).await
    }
}

/// Reads pre-downloaded audio files from a local directory, keyed by
/// song id with any extension. Used by pipeline tests and by
/// `audio_dir`-based local caching.
pub struct FileAudioSource {
    dir: PathBuf,
}

impl FileAudioSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn resolve(&self, song_id: &str) -> Result<PathBuf> {
        let mut entries = std::fs::read_dir(&self.dir)?;
        entries
            .find_map(|entry| {
                let entry = entry.ok()?;
                let stem = entry.path().file_stem()?.to_str()?.to_string();
                (stem == song_id).then(|| entry.path())
            })
            .ok_or_else(|| {
                FetchError::Request {
                    song_id: song_id.to_string(),
                    reason: format!("no file for song in {}", self.dir.display()),
                }
                .into()
            })
    }
}

impl AudioSource for FileAudioSource {
    async fn fetch_full(&self, song_id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(song_id)?;
        Ok(std::fs::read(path)?)
    }

    async fn fetch_range(&self, song_id: &str, _range: TimeRange) -> Result<Vec<u8>> {
        self.fetch_full(song_id).await
    }
}

pub fn path_extension_hint(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}
