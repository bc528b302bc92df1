//! Core types for the playback engine

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Track information for queue management
///
/// Immutable value produced by the catalog. The engine only requires
/// `preview_uri`; everything else is display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Identifier, unique within a queue
    pub id: String,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist_name: String,

    /// Album title
    pub album_title: String,

    /// Cover image reference (optional)
    pub artwork_uri: Option<String>,

    /// Playable audio URI. A track without one is rejected at load time.
    pub preview_uri: Option<String>,
}

impl TrackDescriptor {
    /// Create a descriptor with a playable URI and placeholder metadata
    pub fn new(id: impl Into<String>, preview_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            artist_name: String::new(),
            album_title: String::new(),
            artwork_uri: None,
            preview_uri: Some(preview_uri.into()),
        }
    }

    /// Playable URI, if present and non-blank
    pub fn playable_uri(&self) -> Option<&str> {
        self.preview_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }
}

/// Status reported by an audio handle
///
/// Delivered both as the initial status of `create` and through the
/// periodic status callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_millis: u64,
    /// Unknown until the backend has read the stream header
    pub duration_millis: Option<u64>,
    pub did_just_finish: bool,
    pub is_looping: bool,
    pub error: Option<String>,
}

impl PlaybackStatus {
    /// Status of a handle that has loaded and is ready to report
    pub fn loaded(position_millis: u64, duration_millis: u64, is_playing: bool) -> Self {
        Self {
            is_loaded: true,
            is_playing,
            position_millis,
            duration_millis: Some(duration_millis),
            ..Self::default()
        }
    }

    /// Status of an unloaded handle carrying an error
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Read-only view of the active handle's last applied status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusProjection {
    pub position_millis: u64,
    /// 0 while unknown
    pub duration_millis: u64,
    pub is_loaded: bool,
    pub is_playing: bool,
}

impl From<&PlaybackStatus> for StatusProjection {
    fn from(status: &PlaybackStatus) -> Self {
        Self {
            position_millis: status.position_millis,
            duration_millis: status.duration_millis.unwrap_or(0),
            is_loaded: status.is_loaded,
            is_playing: status.is_playing,
        }
    }
}

/// Transport state derived from the engine flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// No track loaded
    #[default]
    Idle,

    /// Loading a track (transport controls are ignored)
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Last track of the queue finished; track and index are kept
    Ended,
}

/// Snapshot handed to subscribers and returned by `PlaybackEngine::state`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub current_track: Option<TrackDescriptor>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_loading_track: bool,
    pub is_seeking: bool,
    pub queue: Arc<[TrackDescriptor]>,
    pub status: StatusProjection,
    pub transport: TransportState,
}

impl Default for PlayerState {
    /// Idle engine with an empty queue
    fn default() -> Self {
        Self {
            current_track: None,
            current_index: None,
            is_playing: false,
            is_loading_track: false,
            is_seeking: false,
            queue: Arc::from(Vec::new()),
            status: StatusProjection::default(),
            transport: TransportState::Idle,
        }
    }
}

/// Configuration for the playback engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Start playback as soon as a track is loaded (default: true)
    pub autoplay: bool,

    /// Status callback interval requested from the backend (default: 1000)
    pub progress_update_interval_ms: u64,

    /// "Previous" restarts the current track past this position (default: 3000)
    pub restart_threshold_ms: u64,

    /// Delay before status events are accepted again after a seek (default: 50)
    pub seek_settle_ms: u64,

    /// Give up on a pending load after this long (default: none)
    pub load_timeout_ms: Option<u64>,

    /// Buffered events per `events()` receiver (default: 64)
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            progress_update_interval_ms: 1000,
            restart_threshold_ms: 3000,
            seek_settle_ms: 50,
            load_timeout_ms: None,
            event_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn progress_update_interval(&self) -> Duration {
        Duration::from_millis(self.progress_update_interval_ms)
    }

    pub fn seek_settle(&self) -> Duration {
        Duration::from_millis(self.seek_settle_ms)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}
