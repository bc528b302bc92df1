//! Interactive player: status line on stdout, transport commands on stdin.

use chorus_playback::{PlaybackEngine, PlaybackEvent, PlayerState, TrackDescriptor, TransportState};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub const HELP: &str = "commands: n next | p previous | t or space toggle | s <secs> seek | q quit";

/// A line typed at the player prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Toggle,
    /// Target position in seconds
    Seek(u64),
    Quit,
    Help,
}

impl Command {
    /// Parse a prompt line. Blank lines and unknown input yield `None`,
    /// except a bare space which toggles.
    pub fn parse(line: &str) -> Option<Self> {
        if line == " " {
            return Some(Self::Toggle);
        }

        let mut words = line.split_whitespace();
        let command = match words.next()? {
            "n" | "next" => Self::Next,
            "p" | "prev" | "previous" => Self::Previous,
            "t" | "toggle" => Self::Toggle,
            "s" | "seek" => Self::Seek(words.next()?.parse().ok()?),
            "q" | "quit" | "exit" => Self::Quit,
            "h" | "help" | "?" => Self::Help,
            _ => return None,
        };
        Some(command)
    }
}

/// One-line summary of the player state
pub fn status_line(state: &PlayerState) -> String {
    let label = match state.transport {
        TransportState::Idle => "stopped",
        TransportState::Loading => "loading",
        TransportState::Playing => "playing",
        TransportState::Paused => "paused",
        TransportState::Ended => "ended",
    };

    let Some(track) = &state.current_track else {
        return format!("[{label}]");
    };

    let index = state.current_index.map_or(0, |i| i + 1);
    let mut line = format!(
        "[{label}] {index}/{} {} - {}",
        state.queue.len(),
        track.title,
        track.artist_name
    );

    if state.status.is_loaded {
        line.push_str(&format!(
            "  {} / {}",
            clock(state.status.position_millis),
            clock(state.status.duration_millis)
        ));
    }
    if state.is_seeking {
        line.push_str(" (seeking)");
    }
    line
}

fn clock(millis: u64) -> String {
    let secs = millis / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn event_line(event: &PlaybackEvent) -> Option<String> {
    match event {
        PlaybackEvent::QueueEnded { .. } => Some("end of queue".to_string()),
        PlaybackEvent::Error { kind, message } => Some(format!("error ({kind:?}): {message}")),
        PlaybackEvent::TrackChanged { .. } => None,
    }
}

/// Play `tracks` from `start_index` until the user quits or stdin closes.
pub async fn run(engine: PlaybackEngine, tracks: Vec<TrackDescriptor>, start_index: usize) -> anyhow::Result<()> {
    run_with(engine, tracks, start_index, BufReader::new(tokio::io::stdin())).await
}

/// Player loop reading commands from `input`
///
/// Engine calls run as tasks so a load that never resolves cannot keep the
/// prompt from reading `q` or Ctrl-C.
pub async fn run_with<R>(
    engine: PlaybackEngine,
    tracks: Vec<TrackDescriptor>,
    start_index: usize,
    input: R,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let last_line = Arc::new(Mutex::new(String::new()));
    let printed = Arc::clone(&last_line);
    let subscription = engine.subscribe(move |state| {
        let line = status_line(state);
        let mut last = printed.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != line {
            println!("{line}");
            *last = line;
        }
    });

    let mut events = engine.events();
    println!("{HELP}");
    info!(tracks = tracks.len(), start_index, "Starting playback");

    let mut pending = JoinSet::new();
    let starter = engine.clone();
    pending.spawn(async move {
        if let Err(e) = starter.load_queue(tracks, start_index).await {
            debug!(error = %e, "Initial load failed");
        }
    });

    let mut lines = input.lines();
    let result = loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("stdin closed");
                        break Ok(());
                    }
                    Err(e) => break Err(e.into()),
                };
                match Command::parse(&line) {
                    Some(Command::Quit) => break Ok(()),
                    Some(Command::Help) => println!("{HELP}"),
                    Some(command) => {
                        pending.spawn(execute(engine.clone(), command));
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("unknown command {:?}; {HELP}", line.trim()),
                }
            }
            Some(_) = pending.join_next(), if !pending.is_empty() => {}
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = event_line(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Player lagged behind events"),
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    // Commands still waiting on a load are abandoned; release supersedes them
    pending.abort_all();
    subscription.unsubscribe();
    engine.release().await;
    std::io::stdout().flush()?;
    result
}

async fn execute(engine: PlaybackEngine, command: Command) {
    // Failures also arrive as error events, which are what gets printed
    let result = match command {
        Command::Next => engine.play_next().await,
        Command::Previous => engine.play_previous().await,
        Command::Toggle => engine.toggle_play_pause().await,
        Command::Seek(secs) => {
            engine.begin_seek();
            engine.seek(secs.saturating_mul(1000)).await
        }
        Command::Quit | Command::Help => Ok(()),
    };
    if let Err(e) = result {
        debug!(?command, error = %e, "Command failed");
    }
}
