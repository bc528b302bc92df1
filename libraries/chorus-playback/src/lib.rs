//! Chorus - Playback Engine
//!
//! Platform-agnostic playback engine for streaming track previews.
//!
//! This crate provides:
//! - A linear queue replaced wholesale by `load_queue`
//! - Transport control (play/pause, next, previous with restart threshold)
//! - Seek with a settle window that blocks stale status updates
//! - A store of `PlayerState` snapshots with listener subscriptions
//! - Discrete `PlaybackEvent`s for track changes, end of queue and errors
//!
//! # Architecture
//!
//! `chorus-playback` knows nothing about audio devices or HTTP:
//! - No dependency on rodio (device output)
//! - No dependency on the catalog client
//!
//! Audio output is provided through the `AudioOutput` and `AudioHandle`
//! traits. `chorus-audio` ships a simulated clock backend and a rodio
//! device backend.
//!
//! # Example
//!
//! ```rust,no_run
//! use chorus_playback::{AudioOutput, EngineConfig, PlaybackEngine, TrackDescriptor};
//! use std::sync::Arc;
//!
//! async fn play(output: Arc<dyn AudioOutput>) -> chorus_playback::Result<()> {
//!     let engine = PlaybackEngine::new(output, EngineConfig::default());
//!
//!     let subscription = engine.subscribe(|state| {
//!         println!("{:?} at {}ms", state.transport, state.status.position_millis);
//!     });
//!
//!     let queue = vec![
//!         TrackDescriptor::new("1", "https://cdn.example.com/previews/1.mp3"),
//!         TrackDescriptor::new("2", "https://cdn.example.com/previews/2.mp3"),
//!     ];
//!     engine.load_queue(queue, 0).await?;
//!     engine.seek(15_000).await?;
//!     engine.play_next().await?;
//!
//!     subscription.unsubscribe();
//!     engine.release().await;
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod events;
mod output;
mod queue;
pub mod types;

// Public exports
pub use engine::PlaybackEngine;
pub use error::{ErrorKind, OutputError, PlaybackError, Result};
pub use events::{PlaybackEvent, Subscription};
pub use output::{AudioHandle, AudioOutput, LoadOptions, StatusCallback};
pub use types::{
    EngineConfig, PlaybackStatus, PlayerState, StatusProjection, TrackDescriptor, TransportState,
};
