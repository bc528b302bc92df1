//! Simulated audio output
//!
//! Plays nothing. Each handle runs a clock on the Tokio timer, reports
//! progress at the requested interval and signals the end of the preview
//! exactly once. Works under paused test time.

use crate::error::AudioError;
use crate::resource::Resource;
use async_trait::async_trait;
use chorus_playback::{
    AudioHandle, AudioOutput, LoadOptions, OutputError, PlaybackStatus, StatusCallback,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Default preview length, matching catalog previews
pub const DEFAULT_PREVIEW: Duration = Duration::from_secs(30);

/// Audio output driven by a virtual clock
#[derive(Debug, Clone)]
pub struct SimulatedOutput {
    preview: Duration,
    load_delay: Duration,
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW)
    }
}

impl SimulatedOutput {
    /// Create an output whose tracks last `preview`
    ///
    /// A `sim://` URI may override this with a `duration_ms` query
    /// parameter.
    pub fn new(preview: Duration) -> Self {
        Self {
            preview,
            load_delay: Duration::ZERO,
        }
    }

    /// Delay every `create` by `delay`, like a slow network
    #[must_use]
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    fn duration_for(&self, resource: &Resource) -> Duration {
        match resource {
            Resource::Simulated(url) => url
                .query_pairs()
                .find(|(key, _)| key == "duration_ms")
                .and_then(|(_, value)| value.parse().ok())
                .map_or(self.preview, Duration::from_millis),
            Resource::Remote(_) | Resource::File(_) => self.preview,
        }
    }
}

#[async_trait]
impl AudioOutput for SimulatedOutput {
    async fn create(
        &self,
        uri: &str,
        options: LoadOptions,
        on_status: StatusCallback,
    ) -> Result<(Box<dyn AudioHandle>, PlaybackStatus), OutputError> {
        let resource = Resource::parse(uri)?;
        let duration = self.duration_for(&resource);

        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        let now = Instant::now();
        let shared = Arc::new(Shared {
            duration_ms: duration.as_millis() as u64,
            on_status,
            clock: Mutex::new(Clock {
                playing: options.autoplay,
                base_ms: 0,
                resumed_at: options.autoplay.then_some(now),
                finished: false,
                finish_reported: false,
                unloaded: false,
            }),
        });

        let interval = options.progress_update_interval.max(Duration::from_millis(1));
        tokio::spawn(report_progress(Arc::downgrade(&shared), interval));

        debug!(uri, duration_ms = shared.duration_ms, "Simulated track loaded");
        let initial = shared.status(now)?;
        Ok((Box::new(SimulatedHandle { shared }), initial))
    }
}

struct Clock {
    playing: bool,
    base_ms: u64,
    resumed_at: Option<Instant>,
    finished: bool,
    finish_reported: bool,
    unloaded: bool,
}

struct Shared {
    duration_ms: u64,
    on_status: StatusCallback,
    clock: Mutex<Clock>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the clock after checking the handle is still loaded
    fn loaded(&self) -> Result<MutexGuard<'_, Clock>, AudioError> {
        let clock = self.lock();
        if clock.unloaded {
            Err(AudioError::Unloaded)
        } else {
            Ok(clock)
        }
    }

    /// Advance `clock` to `now`, freezing it at the end of the track
    fn advance(&self, clock: &mut Clock, now: Instant) -> u64 {
        let elapsed = clock
            .resumed_at
            .map_or(0, |at| now.saturating_duration_since(at).as_millis() as u64);
        let position = clock.base_ms.saturating_add(elapsed).min(self.duration_ms);

        if clock.playing && position >= self.duration_ms {
            clock.playing = false;
            clock.resumed_at = None;
            clock.base_ms = self.duration_ms;
            clock.finished = true;
        }
        position
    }

    fn status(&self, now: Instant) -> Result<PlaybackStatus, AudioError> {
        let mut clock = self.loaded()?;
        let position = self.advance(&mut clock, now);
        Ok(PlaybackStatus::loaded(position, self.duration_ms, clock.playing))
    }

    /// Status for the periodic callback; `None` once unloaded
    fn progress(&self, now: Instant) -> Option<PlaybackStatus> {
        let mut clock = self.loaded().ok()?;
        let position = self.advance(&mut clock, now);
        let mut status = PlaybackStatus::loaded(position, self.duration_ms, clock.playing);
        if clock.finished && !clock.finish_reported {
            clock.finish_reported = true;
            status.did_just_finish = true;
        }
        Some(status)
    }
}

async fn report_progress(shared: Weak<Shared>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let Some(status) = shared.progress(Instant::now()) else {
            break;
        };
        trace!(position_ms = status.position_millis, "Simulated progress");
        (shared.on_status)(status);
    }
}

/// Handle to one simulated track
pub struct SimulatedHandle {
    shared: Arc<Shared>,
}

#[async_trait]
impl AudioHandle for SimulatedHandle {
    async fn play(&self) -> Result<(), OutputError> {
        let now = Instant::now();
        let mut clock = self.shared.loaded()?;
        self.shared.advance(&mut clock, now);
        if clock.finished {
            clock.base_ms = 0;
            clock.finished = false;
            clock.finish_reported = false;
        }
        if !clock.playing {
            clock.playing = true;
            clock.resumed_at = Some(now);
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), OutputError> {
        let now = Instant::now();
        let mut clock = self.shared.loaded()?;
        clock.base_ms = self.shared.advance(&mut clock, now);
        clock.playing = false;
        clock.resumed_at = None;
        Ok(())
    }

    async fn set_position(&self, position_millis: u64) -> Result<(), OutputError> {
        let now = Instant::now();
        let mut clock = self.shared.loaded()?;
        clock.base_ms = position_millis.min(self.shared.duration_ms);
        clock.resumed_at = clock.playing.then_some(now);
        if clock.base_ms < self.shared.duration_ms {
            clock.finished = false;
            clock.finish_reported = false;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), OutputError> {
        let mut clock = self.shared.loaded()?;
        clock.playing = false;
        clock.resumed_at = None;
        clock.base_ms = 0;
        clock.finished = false;
        clock.finish_reported = false;
        Ok(())
    }

    async fn unload(&self) -> Result<(), OutputError> {
        let mut clock = self.shared.loaded()?;
        clock.unloaded = true;
        clock.playing = false;
        Ok(())
    }

    async fn status(&self) -> Result<PlaybackStatus, OutputError> {
        Ok(self.shared.status(Instant::now())?)
    }
}
