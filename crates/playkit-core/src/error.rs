//! Error types for Playkit Core
//!
//! Two layers live here. [`Error`] is what fallible operations return.
//! [`PlayerError`] is the classified failure value stored in the player state
//! and carried by `error` events; it is never thrown across the event boundary.

use crate::types::{PlayerType, StreamType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Lifecycle errors
    #[error("Player already initialized")]
    AlreadyInitialized,

    #[error("Player not initialized")]
    NotInitialized,

    #[error("Player has been destroyed")]
    Destroyed,

    // Playback errors (also surfaced through state and the `error` event)
    #[error(transparent)]
    Playback(PlayerError),

    // Selection errors
    #[error("{player_type} player is not supported: {reason}")]
    PlayerTypeUnsupported {
        player_type: PlayerType,
        reason: String,
    },

    #[error("No player can play {stream_type} streams: {reason}")]
    UnsupportedStream {
        stream_type: StreamType,
        reason: String,
    },

    #[error("Failed to construct player: {0}")]
    Construction(#[from] ConstructionError),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Playback(err) => err.recoverable,
            _ => false,
        }
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::AlreadyInitialized => "ALREADY_INITIALIZED",
            Error::NotInitialized => "NOT_INITIALIZED",
            Error::Destroyed => "DESTROYED",
            Error::Playback(err) => err.code.as_str(),
            Error::PlayerTypeUnsupported { .. } => "PLAYER_UNSUPPORTED",
            Error::UnsupportedStream { .. } => "STREAM_UNSUPPORTED",
            Error::Construction(_) => "CONSTRUCTION",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

impl From<PlayerError> for Error {
    fn from(err: PlayerError) -> Self {
        Error::Playback(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

/// Failure while constructing an adapter, before any backend is bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("streaming engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("streaming engine unsupported on this platform: {0}")]
    EngineUnsupported(String),
}

/// Classification of playback failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    MediaError,
    SrcNotSupported,
    ManifestError,
    SegmentError,
    DrmError,
    Timeout,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::MediaError => "MEDIA_ERROR",
            ErrorCode::SrcNotSupported => "SRC_NOT_SUPPORTED",
            ErrorCode::ManifestError => "MANIFEST_ERROR",
            ErrorCode::SegmentError => "SEGMENT_ERROR",
            ErrorCode::DrmError => "DRM_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying failure attached to a [`PlayerError`].
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync>;

/// A classified playback failure.
///
/// `recoverable` is advisory: it tells the UI whether offering a retry makes
/// sense. The adapter itself never retries.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip)]
    pub cause: Option<ErrorCause>,
    pub timestamp: DateTime<Utc>,
}

impl PlayerError {
    pub fn new(code: ErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable,
            cause: None,
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for the generic media failure used by `load` and `initialize`.
    pub fn media(message: impl Into<String>, recoverable: bool) -> Self {
        Self::new(ErrorCode::MediaError, message, recoverable)
    }

    /// Attach the underlying failure.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach an already shared cause.
    pub fn with_shared_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }
}

// Causes are compared by identity; everything else by value.
impl PartialEq for PlayerError {
    fn eq(&self, other: &Self) -> bool {
        let same_cause = match (&self.cause, &other.cause) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.code == other.code
            && self.message == other.message
            && self.recoverable == other.recoverable
            && self.timestamp == other.timestamp
            && same_cause
    }
}

impl std::fmt::Display for PlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PlayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
