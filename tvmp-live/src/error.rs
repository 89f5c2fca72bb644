//! Error types for tvmp-live
//!
//! Stream failures carry a retry affordance; invalid operations are no-op
//! guards that callers log and drop rather than surface.

use thiserror::Error;
use tvmp_common::events::FailureKind;

/// Main error type for tvmp-live
#[derive(Error, Debug)]
pub enum Error {
    /// Stream URL or manifest could not be fetched
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// Engine reported a playback/decode error
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// Out-of-range slot index, removal of the last slot, empty channel list
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for stream failures, where a fresh load may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StreamUnavailable(_) | Error::DecodeFailed(_))
    }

    /// Failure category for published events (stream failures only)
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::StreamUnavailable(_) => Some(FailureKind::StreamUnavailable),
            Error::DecodeFailed(_) => Some(FailureKind::DecodeFailed),
            _ => None,
        }
    }
}

impl From<tvmp_common::Error> for Error {
    fn from(err: tvmp_common::Error) -> Self {
        match err {
            tvmp_common::Error::Io(e) => Error::Io(e),
            tvmp_common::Error::Config(msg) => Error::Config(msg),
        }
    }
}

/// Convenience Result type using tvmp-live Error
pub type Result<T> = std::result::Result<T, Error>;
