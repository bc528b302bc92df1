//! Scriptable in-memory audio output shared by the engine tests
//!
//! Records every `create` and `unload`, can hold a `create` until the test
//! releases it, and exposes each handle so tests can push status events
//! through the same callback the engine registered.

#![allow(dead_code)]

use async_trait::async_trait;
use chorus_playback::{
    AudioHandle, AudioOutput, EngineConfig, LoadOptions, OutputError, PlaybackEngine,
    PlaybackEvent, PlaybackStatus, PlayerState, StatusCallback, TrackDescriptor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

pub const DURATION_MS: u64 = 30_000;

pub fn track(id: &str) -> TrackDescriptor {
    TrackDescriptor::new(id, uri(id))
}

pub fn uri(id: &str) -> String {
    format!("https://cdn.example.com/previews/{id}.mp3")
}

pub fn tracks(ids: &[&str]) -> Vec<TrackDescriptor> {
    ids.iter().map(|id| track(id)).collect()
}

pub fn engine() -> (PlaybackEngine, Arc<MockOutput>) {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> (PlaybackEngine, Arc<MockOutput>) {
    let output = Arc::new(MockOutput::default());
    let engine = PlaybackEngine::new(output.clone(), config);
    (engine, output)
}

/// Let spawned tasks (status dispatch, pending loads) run to idle
///
/// Tests run with paused time, so this returns once nothing else is
/// runnable.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Releases a held `create`
pub struct Gate {
    tx: oneshot::Sender<Result<(), OutputError>>,
}

impl Gate {
    pub fn release(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, error: OutputError) {
        let _ = self.tx.send(Err(error));
    }
}

#[derive(Default)]
pub struct MockOutput {
    creates: Mutex<Vec<String>>,
    unloads: Arc<Mutex<Vec<String>>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<(), OutputError>>>>,
    failures: Mutex<HashMap<String, OutputError>>,
    handles: Mutex<Vec<Arc<MockHandle>>>,
    unloaded_initial: AtomicBool,
}

impl MockOutput {
    /// Hold the next `create` for `uri` until the gate is used
    pub fn hold(&self, uri: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(uri.to_string(), rx);
        Gate { tx }
    }

    /// Make every `create` for `uri` fail
    pub fn fail(&self, uri: &str, error: OutputError) {
        self.failures.lock().unwrap().insert(uri.to_string(), error);
    }

    /// Report `is_loaded == false` from `create`, as slow backends do
    pub fn report_unloaded_initial(&self) {
        self.unloaded_initial.store(true, Ordering::SeqCst);
    }

    pub fn creates(&self) -> Vec<String> {
        self.creates.lock().unwrap().clone()
    }

    pub fn unloads(&self) -> Vec<String> {
        self.unloads.lock().unwrap().clone()
    }

    /// Every handle ever created, in creation order
    pub fn handles(&self) -> Vec<Arc<MockHandle>> {
        self.handles.lock().unwrap().clone()
    }

    /// Most recently created handle for `uri`
    pub fn handle(&self, uri: &str) -> Arc<MockHandle> {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|h| h.uri == uri)
            .cloned()
            .unwrap_or_else(|| panic!("no handle created for {uri}"))
    }

    /// Handles that are still loaded
    pub fn live_handles(&self) -> usize {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .filter(|h| !h.is_unloaded())
            .count()
    }
}

#[async_trait]
impl AudioOutput for MockOutput {
    async fn create(
        &self,
        uri: &str,
        options: LoadOptions,
        on_status: StatusCallback,
    ) -> Result<(Box<dyn AudioHandle>, PlaybackStatus), OutputError> {
        self.creates.lock().unwrap().push(uri.to_string());

        let gate = self.gates.lock().unwrap().remove(uri);
        if let Some(gate) = gate {
            match gate.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(OutputError::Other("gate dropped".into())),
            }
        }

        if let Some(error) = self.failures.lock().unwrap().get(uri).cloned() {
            return Err(error);
        }

        let handle = Arc::new(MockHandle {
            uri: uri.to_string(),
            callback: on_status,
            playing: AtomicBool::new(options.autoplay),
            position: AtomicU64::new(0),
            unloaded: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            seek_error: Mutex::new(None),
            unloads: Arc::clone(&self.unloads),
        });
        self.handles.lock().unwrap().push(Arc::clone(&handle));

        let mut initial = handle.current();
        if self.unloaded_initial.load(Ordering::SeqCst) {
            initial = PlaybackStatus::default();
        }

        Ok((Box::new(SharedHandle(handle)), initial))
    }
}

pub struct MockHandle {
    pub uri: String,
    callback: StatusCallback,
    playing: AtomicBool,
    position: AtomicU64,
    unloaded: AtomicBool,
    stopped: AtomicBool,
    seek_error: Mutex<Option<OutputError>>,
    unloads: Arc<Mutex<Vec<String>>>,
}

impl MockHandle {
    fn current(&self) -> PlaybackStatus {
        PlaybackStatus::loaded(
            self.position.load(Ordering::SeqCst),
            DURATION_MS,
            self.playing.load(Ordering::SeqCst),
        )
    }

    /// Push a status through the engine's callback
    pub fn emit(&self, status: PlaybackStatus) {
        (self.callback)(status);
    }

    /// Emit a progress tick at `position_millis`
    pub fn tick(&self, position_millis: u64) {
        self.position.store(position_millis, Ordering::SeqCst);
        self.emit(self.current());
    }

    /// Emit the end-of-track status
    pub fn finish(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.position.store(DURATION_MS, Ordering::SeqCst);
        let mut status = self.current();
        status.did_just_finish = true;
        self.emit(status);
    }

    pub fn fail_seeks(&self, error: OutputError) {
        *self.seek_error.lock().unwrap() = Some(error);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The boxed handle given to the engine; the test keeps the `Arc`
struct SharedHandle(Arc<MockHandle>);

impl SharedHandle {
    fn check(&self) -> Result<(), OutputError> {
        if self.0.is_unloaded() {
            Err(OutputError::Unloaded)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AudioHandle for SharedHandle {
    async fn play(&self) -> Result<(), OutputError> {
        self.check()?;
        self.0.stopped.store(false, Ordering::SeqCst);
        self.0.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<(), OutputError> {
        self.check()?;
        self.0.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_position(&self, position_millis: u64) -> Result<(), OutputError> {
        self.check()?;
        if let Some(error) = self.0.seek_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.0.position.store(position_millis, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), OutputError> {
        self.check()?;
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.playing.store(false, Ordering::SeqCst);
        self.0.position.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<(), OutputError> {
        self.check()?;
        self.0.unloaded.store(true, Ordering::SeqCst);
        self.0.playing.store(false, Ordering::SeqCst);
        self.0.unloads.lock().unwrap().push(self.0.uri.clone());
        Ok(())
    }

    async fn status(&self) -> Result<PlaybackStatus, OutputError> {
        self.check()?;
        Ok(self.0.current())
    }
}

/// Collect every event buffered on `rx`
pub fn drain(rx: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Current track and index are set together and agree with the queue
pub fn assert_consistent(state: &PlayerState) {
    assert_eq!(state.current_track.is_none(), state.current_index.is_none());
    if let (Some(track), Some(index)) = (&state.current_track, state.current_index) {
        assert_eq!(state.queue[index].id, track.id);
    }
}
