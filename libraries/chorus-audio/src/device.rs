//! Speaker output through rodio
//!
//! rodio's `OutputStream` must stay on the thread that opened it, so a
//! dedicated audio thread owns the stream and every `Sink`. Handles talk
//! to it over a crossbeam channel and get replies on oneshot channels.
//! The thread also drives the periodic status callbacks.

use crate::error::{AudioError, Result};
use crate::resource::Resource;
use async_trait::async_trait;
use chorus_playback::{
    AudioHandle, AudioOutput, LoadOptions, OutputError, PlaybackStatus, StatusCallback,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// How often the audio thread checks sinks between commands
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Reply<T> = oneshot::Sender<Result<T>>;

/// Commands sent to the audio thread
enum Command {
    Open {
        id: u64,
        bytes: Vec<u8>,
        autoplay: bool,
        interval: Duration,
        on_status: StatusCallback,
        reply: Reply<PlaybackStatus>,
    },
    Play(u64, Reply<()>),
    Pause(u64, Reply<()>),
    Seek(u64, Duration, Reply<()>),
    Stop(u64, Reply<()>),
    Unload(u64, Reply<()>),
    Status(u64, Reply<PlaybackStatus>),
}

/// Audio output playing previews on the default device
pub struct DeviceOutput {
    commands: Sender<Command>,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl DeviceOutput {
    /// Start the audio thread and open the default output device
    ///
    /// # Returns
    /// * `Ok(output)` - Audio thread running
    /// * `Err(_)` - No output device could be opened
    pub fn new(http: reqwest::Client) -> Result<Self> {
        let (commands, command_rx) = unbounded();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        thread::Builder::new()
            .name("chorus-audio".into())
            .spawn(move || run_audio_thread(&command_rx, &ready_tx))
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::ThreadGone)
            .and_then(|ready| ready)?;

        Ok(Self {
            commands,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        match Resource::parse(uri)? {
            Resource::Remote(url) => {
                let response = self.http.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            Resource::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| AudioError::Fetch(format!("{}: {e}", path.display()))),
            Resource::Simulated(_) => Err(AudioError::UnsupportedUri(uri.to_string())),
        }
    }
}

#[async_trait]
impl AudioOutput for DeviceOutput {
    async fn create(
        &self,
        uri: &str,
        options: LoadOptions,
        on_status: StatusCallback,
    ) -> std::result::Result<(Box<dyn AudioHandle>, PlaybackStatus), OutputError> {
        let bytes = self.fetch(uri).await?;
        debug!(uri, bytes = bytes.len(), "Preview fetched");

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = DeviceHandle {
            id,
            commands: self.commands.clone(),
        };
        let initial = handle
            .request(|reply| Command::Open {
                id,
                bytes,
                autoplay: options.autoplay,
                interval: options.progress_update_interval,
                on_status,
                reply,
            })
            .await?;

        Ok((Box::new(handle), initial))
    }
}

/// Handle to one sink on the audio thread
pub struct DeviceHandle {
    id: u64,
    commands: Sender<Command>,
}

impl DeviceHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| AudioError::ThreadGone)?;
        response.await.map_err(|_| AudioError::ThreadGone)?
    }
}

#[async_trait]
impl AudioHandle for DeviceHandle {
    async fn play(&self) -> std::result::Result<(), OutputError> {
        Ok(self.request(|reply| Command::Play(self.id, reply)).await?)
    }

    async fn pause(&self) -> std::result::Result<(), OutputError> {
        Ok(self.request(|reply| Command::Pause(self.id, reply)).await?)
    }

    async fn set_position(&self, position_millis: u64) -> std::result::Result<(), OutputError> {
        let position = Duration::from_millis(position_millis);
        Ok(self
            .request(|reply| Command::Seek(self.id, position, reply))
            .await?)
    }

    async fn stop(&self) -> std::result::Result<(), OutputError> {
        Ok(self.request(|reply| Command::Stop(self.id, reply)).await?)
    }

    async fn unload(&self) -> std::result::Result<(), OutputError> {
        Ok(self.request(|reply| Command::Unload(self.id, reply)).await?)
    }

    async fn status(&self) -> std::result::Result<PlaybackStatus, OutputError> {
        Ok(self.request(|reply| Command::Status(self.id, reply)).await?)
    }
}

/// One decoded preview and its sink
struct Voice {
    sink: Sink,
    bytes: Vec<u8>,
    duration: Option<Duration>,
    on_status: StatusCallback,
    interval: Duration,
    last_report: Instant,
    finished: bool,
}

impl Voice {
    fn open(
        stream: &OutputStream,
        bytes: Vec<u8>,
        autoplay: bool,
        interval: Duration,
        on_status: StatusCallback,
    ) -> Result<Self> {
        let decoder = Decoder::new(Cursor::new(bytes.clone()))?;
        let duration = decoder.total_duration();

        let sink = Sink::connect_new(stream.mixer());
        sink.append(decoder);
        if !autoplay {
            sink.pause();
        }

        Ok(Self {
            sink,
            bytes,
            duration,
            on_status,
            interval,
            last_report: Instant::now(),
            finished: false,
        })
    }

    fn status(&self) -> PlaybackStatus {
        let position = if self.finished {
            self.duration.unwrap_or_else(|| self.sink.get_pos())
        } else {
            self.sink.get_pos()
        };
        PlaybackStatus {
            is_loaded: true,
            is_playing: !self.sink.is_paused() && !self.sink.empty(),
            position_millis: position.as_millis() as u64,
            duration_millis: self.duration.map(|d| d.as_millis() as u64),
            ..PlaybackStatus::default()
        }
    }

    /// Re-queue the decoded preview if it already played out
    fn refill(&mut self) -> Result<()> {
        if self.sink.empty() {
            let decoder = Decoder::new(Cursor::new(self.bytes.clone()))?;
            self.sink.append(decoder);
            self.finished = false;
        }
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.refill()?;
        let position = self.duration.map_or(position, |d| position.min(d));
        self.sink.try_seek(position)?;
        Ok(())
    }

    /// Report progress when due, and the end of the preview once
    fn poll(&mut self, now: Instant) {
        if !self.finished && self.sink.empty() {
            self.finished = true;
            self.last_report = now;
            let mut status = self.status();
            status.did_just_finish = true;
            (self.on_status)(status);
            return;
        }

        if now.duration_since(self.last_report) >= self.interval {
            self.last_report = now;
            (self.on_status)(self.status());
        }
    }
}

fn run_audio_thread(commands: &Receiver<Command>, ready: &std::sync::mpsc::Sender<Result<()>>) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "Failed to open audio output");
            let _ = ready.send(Err(AudioError::DeviceNotFound(e.to_string())));
            return;
        }
    };
    stream.log_on_drop(false);
    let _ = ready.send(Ok(()));
    info!("Audio thread started");

    let mut voices: HashMap<u64, Voice> = HashMap::new();

    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(command) => handle_command(command, &stream, &mut voices),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        for voice in voices.values_mut() {
            voice.poll(now);
        }
    }

    info!("Audio thread stopped");
}

fn handle_command(command: Command, stream: &OutputStream, voices: &mut HashMap<u64, Voice>) {
    fn with_voice<T>(
        voices: &mut HashMap<u64, Voice>,
        id: u64,
        reply: Reply<T>,
        action: impl FnOnce(&mut Voice) -> Result<T>,
    ) {
        let result = voices.get_mut(&id).ok_or(AudioError::Unloaded).and_then(action);
        if let Err(e) = &result {
            warn!(id, error = %e, "Audio command failed");
        }
        // Caller may have given up waiting
        let _ = reply.send(result);
    }

    match command {
        Command::Open {
            id,
            bytes,
            autoplay,
            interval,
            on_status,
            reply,
        } => {
            let result = Voice::open(stream, bytes, autoplay, interval, on_status).map(|voice| {
                let status = voice.status();
                voices.insert(id, voice);
                status
            });
            let _ = reply.send(result);
        }
        Command::Play(id, reply) => with_voice(voices, id, reply, |voice| {
            voice.refill()?;
            voice.sink.play();
            Ok(())
        }),
        Command::Pause(id, reply) => with_voice(voices, id, reply, |voice| {
            voice.sink.pause();
            Ok(())
        }),
        Command::Seek(id, position, reply) => {
            with_voice(voices, id, reply, |voice| voice.seek(position));
        }
        Command::Stop(id, reply) => with_voice(voices, id, reply, |voice| {
            voice.sink.pause();
            voice.seek(Duration::ZERO)
        }),
        Command::Unload(id, reply) => {
            let result = match voices.remove(&id) {
                Some(voice) => {
                    voice.sink.stop();
                    Ok(())
                }
                None => Err(AudioError::Unloaded),
            };
            let _ = reply.send(result);
        }
        Command::Status(id, reply) => with_voice(voices, id, reply, |voice| Ok(voice.status())),
    }
}
