//! Error types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures reported by an audio output backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// No output device or backend thread available
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),

    /// Fetching the audio resource failed
    #[error("Network error: {0}")]
    Network(String),

    /// The resource could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The handle was already unloaded
    #[error("Handle is unloaded")]
    Unloaded,

    /// The operation did not complete in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Track has no playable URI
    #[error("Track {track_id} has no playable preview URI")]
    InvalidTrack { track_id: String },

    /// `load_queue` was given nothing to play
    #[error("Queue is empty")]
    EmptyQueue,

    /// The backend rejected the resource
    #[error("Failed to load track {track_id}: {source}")]
    LoadFailed {
        track_id: String,
        #[source]
        source: OutputError,
    },

    /// The backend reported an error mid-playback
    #[error("Playback error: {0}")]
    Playback(String),

    /// Seek was rejected by the backend
    #[error("Seek failed: {0}")]
    SeekFailed(#[source] OutputError),
}

impl PlaybackError {
    /// Taxonomy kind reported to subscribers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTrack { .. } | Self::EmptyQueue => ErrorKind::InvalidTrack,
            Self::LoadFailed { .. } => ErrorKind::LoadFailed,
            Self::Playback(_) => ErrorKind::PlaybackError,
            Self::SeekFailed(_) => ErrorKind::SeekFailed,
        }
    }
}

/// Error kinds surfaced through `PlaybackEvent::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidTrack,
    LoadFailed,
    PlaybackError,
    SeekFailed,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
