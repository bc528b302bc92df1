//! Playback engine - core orchestration
//!
//! Owns the queue, the current track, the transport flags and the single
//! live `AudioHandle`. Every track change funnels through `load_track`.
//!
//! Entry points may interleave while one of them is suspended on the
//! backend, so state is only touched under a short-lived lock that is
//! never held across an `.await`. `is_loading_track` and `is_seeking` are
//! re-entrancy guards, not locks. Each load carries a monotonically
//! increasing id: a `create` that resolves after being superseded is
//! discarded and its handle unloaded, and status events are only applied
//! when they come from the committed handle of the latest load.

use crate::{
    error::{OutputError, PlaybackError, Result},
    events::{Listeners, PlaybackEvent, Subscription},
    output::{AudioHandle, AudioOutput, LoadOptions, StatusCallback},
    queue::Queue,
    types::{
        EngineConfig, PlaybackStatus, PlayerState, StatusProjection, TrackDescriptor,
        TransportState,
    },
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

/// Central playback engine
///
/// Cheap to clone; all clones drive the same engine. Construct once per
/// session inside a Tokio runtime.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Inner>,
}

struct Inner {
    output: Arc<dyn AudioOutput>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    listeners: Arc<Mutex<Listeners>>,
    events: broadcast::Sender<PlaybackEvent>,
    status_tx: mpsc::UnboundedSender<(u64, PlaybackStatus)>,
}

#[derive(Clone)]
struct ActiveHandle {
    load_id: u64,
    handle: Arc<dyn AudioHandle>,
}

struct NowPlaying {
    index: usize,
    track: TrackDescriptor,
}

#[derive(Default)]
struct EngineState {
    queue: Queue,
    current: Option<NowPlaying>,
    active: Option<ActiveHandle>,
    status: StatusProjection,
    is_playing: bool,
    is_loading_track: bool,
    is_seeking: bool,
    ended: bool,
    latest_load: u64,
    seek_epoch: u64,
}

impl EngineState {
    fn transport(&self) -> TransportState {
        if self.is_loading_track {
            TransportState::Loading
        } else if self.current.is_none() {
            TransportState::Idle
        } else if self.ended {
            TransportState::Ended
        } else if self.is_playing {
            TransportState::Playing
        } else {
            TransportState::Paused
        }
    }

    fn snapshot(&self) -> PlayerState {
        PlayerState {
            current_track: self.current.as_ref().map(|now| now.track.clone()),
            current_index: self.current.as_ref().map(|now| now.index),
            is_playing: self.is_playing,
            is_loading_track: self.is_loading_track,
            is_seeking: self.is_seeking,
            queue: self.queue.shared(),
            status: self.status,
            transport: self.transport(),
        }
    }

    /// True if `load_id` belongs to the committed handle of the latest load
    fn is_current_load(&self, load_id: u64) -> bool {
        self.latest_load == load_id
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.load_id == load_id)
    }

    /// Drop back to `Idle`, invalidating any load still in flight
    ///
    /// Returns the released handle so the caller can unload it unlocked.
    fn reset_idle(&mut self) -> Option<Arc<dyn AudioHandle>> {
        self.latest_load += 1;
        self.current = None;
        self.status = StatusProjection::default();
        self.is_playing = false;
        self.is_loading_track = false;
        self.ended = false;
        self.active.take().map(|active| active.handle)
    }
}

/// Outcome of a load that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Loaded,
    Superseded,
}

enum Transport {
    Pause(ActiveHandle),
    Resume(ActiveHandle),
    Reload(TrackDescriptor, usize),
}

enum Step {
    Load(TrackDescriptor, usize),
    Restart,
    EndOfQueue,
}

/// What an accepted status event leads to
enum Applied {
    Progress,
    /// The handle reported an error and was dropped
    Failed(Option<Arc<dyn AudioHandle>>, String),
    /// Finished; load the next track unless another load started since
    Advance(TrackDescriptor, usize, u64),
    EndOfQueue,
}

/// Clears `is_seeking` when the seek that set it completes or is dropped
struct SeekSettle {
    inner: Weak<Inner>,
    epoch: u64,
}

impl Drop for SeekSettle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.seek_epoch == self.epoch {
                state.is_seeking = false;
            }
        }
    }
}

impl PlaybackEngine {
    /// Create a new engine driving `output`
    ///
    /// Spawns the task that applies status callbacks in delivery order.
    pub fn new(output: Arc<dyn AudioOutput>, config: EngineConfig) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let inner = Arc::new(Inner {
            output,
            config,
            state: Mutex::new(EngineState::default()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            events,
            status_tx,
        });

        tokio::spawn(dispatch_status(Arc::downgrade(&inner), status_rx));

        Self { inner }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ===== Store =====

    /// Current state snapshot
    pub fn state(&self) -> PlayerState {
        self.lock().snapshot()
    }

    /// Register a listener called with a fresh snapshot after every change
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PlayerState) + Send + Sync + 'static,
    {
        let id = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Arc::new(listener));
        Subscription::new(id, Arc::downgrade(&self.inner.listeners))
    }

    /// Receiver for discrete playback events
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    // ===== Queue =====

    /// Replace the queue and start playing `tracks[start_index]`
    ///
    /// An out-of-range `start_index` falls back to 0. An empty queue is
    /// reported as `EmptyQueue` and leaves the engine untouched.
    pub async fn load_queue(&self, tracks: Vec<TrackDescriptor>, start_index: usize) -> Result<()> {
        let queue = Queue::new(tracks);
        let Some(index) = queue.start_index(start_index) else {
            let err = PlaybackError::EmptyQueue;
            self.report(&err);
            return Err(err);
        };
        let Some(track) = queue.get(index).cloned() else {
            return Err(PlaybackError::EmptyQueue);
        };

        info!(len = queue.len(), index, "Loading queue");
        self.load_track(track, index, Some(queue), None).await.map(|_| ())
    }

    // ===== Transport =====

    /// Pause if playing, otherwise resume
    ///
    /// After the handle reported an error the track is still current but has
    /// no handle; toggling loads it again.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let action = {
            let state = self.lock();
            if state.is_loading_track {
                return Ok(());
            }
            match (&state.active, &state.current) {
                (Some(active), _) if state.is_playing => Transport::Pause(active.clone()),
                (Some(active), _) => Transport::Resume(active.clone()),
                (None, Some(now)) => Transport::Reload(now.track.clone(), now.index),
                (None, None) => return Ok(()),
            }
        };

        match action {
            Transport::Pause(active) => {
                if let Err(e) = active.handle.pause().await {
                    return Err(self.transport_failed("pause", e));
                }
                self.sync_after_transport(&active, false).await;
                Ok(())
            }
            Transport::Resume(active) => {
                if let Err(e) = active.handle.play().await {
                    return Err(self.transport_failed("play", e));
                }
                self.sync_after_transport(&active, true).await;
                Ok(())
            }
            Transport::Reload(track, index) => {
                warn!(track_id = %track.id, "Playback handle missing, reloading current track");
                self.load_track(track, index, None, None).await.map(|_| ())
            }
        }
    }

    /// Skip to the next track; on the last track, stop and stay
    pub async fn play_next(&self) -> Result<()> {
        let step = {
            let state = self.lock();
            if state.is_loading_track || state.queue.is_empty() {
                return Ok(());
            }
            let Some(now) = &state.current else {
                return Ok(());
            };
            match state.queue.next_index(now.index) {
                Some(next) => match state.queue.get(next) {
                    Some(track) => Step::Load(track.clone(), next),
                    None => Step::EndOfQueue,
                },
                None => Step::EndOfQueue,
            }
        };

        self.run_step(step).await
    }

    /// Go to the previous track
    ///
    /// Past the restart threshold (3s by default) this restarts the current
    /// track instead. On the first track it always restarts.
    pub async fn play_previous(&self) -> Result<()> {
        let step = {
            let state = self.lock();
            if state.is_loading_track || state.queue.is_empty() {
                return Ok(());
            }
            let Some(now) = &state.current else {
                return Ok(());
            };
            if state.status.position_millis > self.inner.config.restart_threshold_ms {
                Step::Restart
            } else {
                match state.queue.previous_index(now.index) {
                    Some(previous) => match state.queue.get(previous) {
                        Some(track) => Step::Load(track.clone(), previous),
                        None => Step::Restart,
                    },
                    None => Step::Restart,
                }
            }
        };

        self.run_step(step).await
    }

    // ===== Seek =====

    /// Mark the start of a seek gesture
    ///
    /// Status events are dropped until the gesture is committed with
    /// `seek` or abandoned with `cancel_seek`.
    pub fn begin_seek(&self) {
        {
            let mut state = self.lock();
            if state.is_loading_track || state.active.is_none() {
                return;
            }
            state.is_seeking = true;
            state.seek_epoch += 1;
        }
        self.notify();
    }

    /// Abandon a seek gesture without moving
    pub fn cancel_seek(&self) {
        {
            let mut state = self.lock();
            if !state.is_seeking {
                return;
            }
            state.is_seeking = false;
            state.seek_epoch += 1;
        }
        self.notify();
    }

    /// Seek the current track to `position_millis`
    ///
    /// No-op without a handle or while the duration is unknown. The target
    /// is clamped to the track duration. Status events stay blocked until a
    /// short settle delay after the authoritative post-seek read.
    pub async fn seek(&self, position_millis: u64) -> Result<()> {
        let (active, target, epoch) = {
            let mut state = self.lock();
            if state.is_loading_track {
                return Ok(());
            }
            let Some(active) = state.active.clone() else {
                return Ok(());
            };
            let duration = state.status.duration_millis;
            if duration == 0 {
                return Ok(());
            }
            state.is_seeking = true;
            state.seek_epoch += 1;
            (active, position_millis.min(duration), state.seek_epoch)
        };
        let settle = SeekSettle {
            inner: Arc::downgrade(&self.inner),
            epoch,
        };
        self.notify();

        debug!(target_ms = target, "Seeking");
        let result = async {
            active.handle.set_position(target).await?;
            active.handle.status().await
        }
        .await;

        let outcome = match result {
            Ok(status) => {
                {
                    let mut state = self.lock();
                    if state.is_current_load(active.load_id) && status.is_loaded {
                        state.status = StatusProjection::from(&status);
                        state.is_playing = status.is_playing;
                    }
                }
                self.notify();
                Ok(())
            }
            Err(e) => {
                let err = PlaybackError::SeekFailed(e);
                self.report(&err);
                Err(err)
            }
        };

        tokio::time::sleep(self.inner.config.seek_settle()).await;
        drop(settle);
        self.notify();

        outcome
    }

    // ===== Status =====

    /// Apply a status update from the active handle
    pub async fn on_status_event(&self, status: PlaybackStatus) {
        self.apply_status(None, status).await;
    }

    /// Stop and release the active handle (session teardown)
    pub async fn release(&self) {
        let released = self.lock().reset_idle();
        self.unload(released).await;
        self.notify();
    }

    // ===== Internals =====

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let snapshot = self.lock().snapshot();
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    fn report(&self, error: &PlaybackError) {
        warn!(kind = ?error.kind(), "{}", error);
        self.emit(PlaybackEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    fn transport_failed(&self, operation: &str, source: OutputError) -> PlaybackError {
        let err = PlaybackError::Playback(format!("failed to {operation}: {source}"));
        self.report(&err);
        err
    }

    fn status_callback(&self, load_id: u64) -> StatusCallback {
        let tx = self.inner.status_tx.clone();
        Arc::new(move |status| {
            // Closed once the engine is gone
            let _ = tx.send((load_id, status));
        })
    }

    async fn unload(&self, handle: Option<Arc<dyn AudioHandle>>) {
        if let Some(handle) = handle {
            if let Err(e) = handle.unload().await {
                warn!(error = %e, "Failed to unload audio handle");
            }
        }
    }

    async fn run_step(&self, step: Step) -> Result<()> {
        match step {
            Step::Load(track, index) => self.load_track(track, index, None, None).await.map(|_| ()),
            Step::Restart => self.seek(0).await,
            Step::EndOfQueue => {
                self.end_of_queue().await;
                Ok(())
            }
        }
    }

    /// Load `track` at `index`, replacing the queue first if given
    ///
    /// `planned_at` is the latest load id when a deferred load was planned;
    /// the load is dropped if another one started (or the engine was
    /// released) in between. The previous handle is unloaded only after the
    /// new one is live.
    async fn load_track(
        &self,
        track: TrackDescriptor,
        index: usize,
        queue: Option<Queue>,
        planned_at: Option<u64>,
    ) -> Result<LoadOutcome> {
        let Some(uri) = track.playable_uri().map(str::to_owned) else {
            let released = {
                let mut state = self.lock();
                if planned_at.is_some_and(|id| id != state.latest_load) {
                    return Ok(LoadOutcome::Superseded);
                }
                if let Some(queue) = queue {
                    state.queue = queue;
                }
                state.reset_idle()
            };
            self.unload(released).await;
            self.notify();

            let err = PlaybackError::InvalidTrack { track_id: track.id };
            self.report(&err);
            return Err(err);
        };

        let load_id = {
            let mut state = self.lock();
            match queue {
                Some(queue) => state.queue = queue,
                None => {
                    if planned_at.is_some_and(|id| id != state.latest_load) {
                        debug!(track_id = %track.id, index, "Newer load started, dropping advance");
                        return Ok(LoadOutcome::Superseded);
                    }
                    // The queue may have been replaced since this load was planned
                    if state.queue.get(index).map(|t| &t.id) != Some(&track.id) {
                        debug!(track_id = %track.id, index, "Queue changed, dropping stale load");
                        return Ok(LoadOutcome::Superseded);
                    }
                }
            }
            state.latest_load += 1;
            state.is_loading_track = true;
            state.is_playing = false;
            state.ended = false;
            state.current = Some(NowPlaying {
                index,
                track: track.clone(),
            });
            state.latest_load
        };
        self.notify();
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            index,
        });
        debug!(track_id = %track.id, index, load_id, "Loading track");

        let options = LoadOptions {
            autoplay: self.inner.config.autoplay,
            progress_update_interval: self.inner.config.progress_update_interval(),
        };
        let create = self
            .inner
            .output
            .create(&uri, options, self.status_callback(load_id));
        let result = match self.inner.config.load_timeout() {
            Some(limit) => match tokio::time::timeout(limit, create).await {
                Ok(result) => result,
                Err(_) => Err(OutputError::Timeout(limit)),
            },
            None => create.await,
        };

        match result {
            Ok((handle, initial)) => {
                let handle: Arc<dyn AudioHandle> = Arc::from(handle);
                let committed = {
                    let mut state = self.lock();
                    if state.latest_load == load_id {
                        let previous = state.active.replace(ActiveHandle {
                            load_id,
                            handle: Arc::clone(&handle),
                        });
                        state.status = StatusProjection::from(&initial);
                        if initial.is_loaded {
                            state.is_loading_track = false;
                            state.is_playing = initial.is_playing;
                        }
                        Some(previous.map(|active| active.handle))
                    } else {
                        None
                    }
                };

                match committed {
                    Some(previous) => {
                        info!(track_id = %track.id, index, "Track loaded");
                        self.notify();
                        self.unload(previous).await;
                        Ok(LoadOutcome::Loaded)
                    }
                    None => {
                        debug!(track_id = %track.id, load_id, "Load superseded, releasing handle");
                        self.unload(Some(handle)).await;
                        Ok(LoadOutcome::Superseded)
                    }
                }
            }
            Err(source) => {
                let released = {
                    let mut state = self.lock();
                    if state.latest_load != load_id {
                        debug!(track_id = %track.id, load_id, "Superseded load failed");
                        return Ok(LoadOutcome::Superseded);
                    }
                    state.reset_idle()
                };
                if let Some(previous) = &released {
                    if let Err(e) = previous.stop().await {
                        debug!(error = %e, "Failed to stop previous handle");
                    }
                }
                self.unload(released).await;
                self.notify();

                let err = PlaybackError::LoadFailed {
                    track_id: track.id,
                    source,
                };
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Apply a status event; `source` is the load id of the emitting handle
    async fn apply_status(&self, source: Option<u64>, status: PlaybackStatus) {
        let applied = {
            let mut state = self.lock();
            if let Some(load_id) = source {
                if !state.is_current_load(load_id) {
                    trace!(load_id, "Dropping status from inactive handle");
                    return;
                }
            }

            if !status.is_loaded {
                let Some(error) = status.error else {
                    return;
                };
                // The handle is dead; keep the track so toggle reloads it
                state.status = StatusProjection::default();
                state.is_loading_track = false;
                state.is_playing = false;
                Applied::Failed(state.active.take().map(|active| active.handle), error)
            } else if state.is_seeking {
                return;
            } else {
                state.status = StatusProjection::from(&status);
                state.is_playing = status.is_playing;
                state.is_loading_track = false;

                if status.did_just_finish && !status.is_looping {
                    let next = state
                        .current
                        .as_ref()
                        .and_then(|now| state.queue.next_index(now.index))
                        .and_then(|next| state.queue.get(next).map(|track| (track.clone(), next)));
                    match next {
                        Some((track, index)) => Applied::Advance(track, index, state.latest_load),
                        None => Applied::EndOfQueue,
                    }
                } else {
                    Applied::Progress
                }
            }
        };

        match applied {
            Applied::Progress => self.notify(),
            Applied::Failed(handle, error) => {
                self.unload(handle).await;
                self.notify();
                self.report(&PlaybackError::Playback(error));
            }
            Applied::Advance(track, index, planned_at) => {
                info!(track_id = %track.id, index, "Track finished, advancing");
                self.notify();
                // Detached so a slow create cannot hold up status dispatch
                let engine = self.clone();
                tokio::spawn(async move {
                    // Failures are reported inside
                    let _ = engine
                        .load_track(track, index, None, Some(planned_at))
                        .await;
                });
            }
            Applied::EndOfQueue => {
                info!("End of queue reached");
                self.end_of_queue().await;
            }
        }
    }

    /// Stop the active handle and keep the track and index for display
    async fn end_of_queue(&self) {
        let (handle, track_id) = {
            let mut state = self.lock();
            state.is_playing = false;
            state.ended = true;
            (
                state.active.as_ref().map(|active| Arc::clone(&active.handle)),
                state.current.as_ref().map(|now| now.track.id.clone()),
            )
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.stop().await {
                warn!(error = %e, "Failed to stop at end of queue");
            }
        }
        self.notify();
        if let Some(track_id) = track_id {
            self.emit(PlaybackEvent::QueueEnded { track_id });
        }
    }

    /// Re-read status after play/pause so `is_playing` does not wait a tick
    async fn sync_after_transport(&self, active: &ActiveHandle, playing: bool) {
        let status = active.handle.status().await;
        {
            let mut state = self.lock();
            if !state.is_current_load(active.load_id) {
                return;
            }
            match status {
                Ok(status) if status.is_loaded && !state.is_seeking => {
                    state.status = StatusProjection::from(&status);
                    state.is_playing = status.is_playing;
                }
                _ => state.is_playing = playing,
            }
            if state.is_playing {
                state.ended = false;
            }
        }
        self.notify();
    }
}

/// Apply status callbacks in delivery order until the engine is dropped
async fn dispatch_status(
    inner: Weak<Inner>,
    mut status_rx: mpsc::UnboundedReceiver<(u64, PlaybackStatus)>,
) {
    while let Some((load_id, status)) = status_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        PlaybackEngine { inner }
            .apply_status(Some(load_id), status)
            .await;
    }
}
