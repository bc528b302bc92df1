//! Platform-agnostic audio output traits
//!
//! Abstracts the OS/device media layer. The engine drives exactly one
//! live `AudioHandle` at a time; backends (simulated clock, rodio device)
//! live in `chorus-audio`.

use crate::error::OutputError;
use crate::types::PlaybackStatus;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving asynchronous status updates from a handle
///
/// May be invoked from any thread. Implementations of `AudioHandle` must
/// stop calling it once the handle is unloaded.
pub type StatusCallback = Arc<dyn Fn(PlaybackStatus) + Send + Sync>;

/// Options passed to `AudioOutput::create`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Start playing as soon as the resource is loaded
    pub autoplay: bool,

    /// Interval between periodic status callbacks
    pub progress_update_interval: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            progress_update_interval: Duration::from_secs(1),
        }
    }
}

/// Factory for audio handles
///
/// `create` must fail rather than hang when the resource cannot be loaded.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Load the resource at `uri`
    ///
    /// # Returns
    /// * `Ok((handle, status))` - Loaded handle and its initial status
    /// * `Err(_)` - Resource could not be fetched or decoded
    async fn create(
        &self,
        uri: &str,
        options: LoadOptions,
        on_status: StatusCallback,
    ) -> Result<(Box<dyn AudioHandle>, PlaybackStatus), OutputError>;
}

/// One decodable audio resource bound to a URI
#[async_trait]
pub trait AudioHandle: Send + Sync {
    /// Start or resume playback
    async fn play(&self) -> Result<(), OutputError>;

    /// Pause playback
    async fn pause(&self) -> Result<(), OutputError>;

    /// Jump to `position_millis` from the start of the resource
    async fn set_position(&self, position_millis: u64) -> Result<(), OutputError>;

    /// Stop playback and rewind; the handle stays loaded
    async fn stop(&self) -> Result<(), OutputError>;

    /// Release the resource; no status callbacks follow
    async fn unload(&self) -> Result<(), OutputError>;

    /// Read the current status
    async fn status(&self) -> Result<PlaybackStatus, OutputError>;
}
