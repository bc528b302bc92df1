//! Audio output backends for the Chorus playback engine
//!
//! Implementations of `chorus_playback::AudioOutput`:
//!
//! - `SimulatedOutput`: a virtual clock on the Tokio timer. No device
//!   needed; used by tests and headless runs.
//! - `DeviceOutput` (feature `device`): downloads the preview and plays it
//!   through rodio on a dedicated audio thread.
//!
//! # Example
//!
//! ```no_run
//! use chorus_audio::SimulatedOutput;
//! use chorus_playback::{EngineConfig, PlaybackEngine, TrackDescriptor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> chorus_playback::Result<()> {
//! let output = Arc::new(SimulatedOutput::new(Duration::from_secs(30)));
//! let engine = PlaybackEngine::new(output, EngineConfig::default());
//!
//! engine
//!     .load_queue(vec![TrackDescriptor::new("1", "sim://preview/1")], 0)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

#[cfg(feature = "device")]
mod device;
mod error;
mod resource;
mod simulated;

#[cfg(feature = "device")]
pub use device::{DeviceHandle, DeviceOutput};
pub use error::{AudioError, Result};
pub use simulated::{SimulatedHandle, SimulatedOutput, DEFAULT_PREVIEW};
