//! Error types shared across the cadence workspace.

use thiserror::Error;

/// Top-level error type for configuration and playlist handling.
#[derive(Debug, Error)]
pub enum Error {
    /// IO errors from file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Playlist parsing/migration errors
    #[error("Playlist error: {0}")]
    Playlist(String),

    /// Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using the workspace error type.
pub type Result<T> = std::result::Result<T, Error>;
