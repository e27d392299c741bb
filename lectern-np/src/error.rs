//! Error types for lectern-np
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the narration player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Synthesis request errors (network, quota, invalid voice)
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Audio payload decoding errors (bad base64, malformed PCM)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback scheduling errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<lectern_common::Error> for Error {
    fn from(err: lectern_common::Error) -> Self {
        match err {
            lectern_common::Error::Config(msg) => Error::Config(msg),
            lectern_common::Error::Io(err) => Error::Io(err),
            other => Error::Internal(other.to_string()),
        }
    }
}

/// Convenience Result type using lectern-np Error
pub type Result<T> = std::result::Result<T, Error>;
