//! Chorus - catalog browser and preview player
mod commands;
mod config;
mod player;

use anyhow::Context;
use chorus_audio::SimulatedOutput;
use chorus_catalog::CatalogClient;
use chorus_playback::{AudioOutput, PlaybackEngine};
use clap::{Parser, Subcommand};
use crate::commands::{LikesAction, QueueSource};
use crate::config::{AppConfig, Backend, OutputSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Browse the music catalog and play song previews", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ./chorus.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the session token
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,
        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Search artists, albums and songs
    Search {
        /// Search text
        query: String,
    },
    /// Show an album's track list
    Album {
        /// Album ID
        id: u64,
    },
    /// Show an artist's most popular songs
    Top {
        /// Artist ID
        artist_id: u64,
        /// Number of songs
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// List, add or remove liked songs
    Likes {
        #[command(subcommand)]
        action: Option<LikesCommand>,
    },
    /// Play previews interactively
    Play {
        #[command(subcommand)]
        source: PlayCommand,
    },
}

#[derive(Subcommand)]
enum LikesCommand {
    /// List liked song IDs
    List,
    /// Like a song
    Add {
        /// Song ID
        id: u64,
    },
    /// Remove a like
    Remove {
        /// Song ID
        id: u64,
    },
}

#[derive(Subcommand)]
enum PlayCommand {
    /// Play an album in track order
    Album {
        /// Album ID
        id: u64,
        /// Zero-based track to start from
        #[arg(short, long, default_value_t = 0)]
        start: usize,
    },
    /// Play an artist's top songs
    Artist {
        /// Artist ID
        id: u64,
        /// Number of songs
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Play the most popular songs
    Popular,
    /// Play the songs matching a search
    Search {
        /// Search text
        query: String,
    },
}

impl From<PlayCommand> for QueueSource {
    fn from(command: PlayCommand) -> Self {
        match command {
            PlayCommand::Album { id, start } => QueueSource::Album { id, start },
            PlayCommand::Artist { id, limit } => QueueSource::Artist { id, limit },
            PlayCommand::Popular => QueueSource::Popular,
            PlayCommand::Search { query } => QueueSource::Search { query },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the player
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chorus=info,chorus_playback=info,chorus_catalog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let client = CatalogClient::new(config.catalog_config()).context("invalid catalog settings")?;
    tracing::debug!(url = %client.url(), "Catalog client ready");

    match cli.command {
        Commands::Login { email, password } => commands::login(&client, &email, &password).await?,
        Commands::Search { query } => commands::search(&client, &query).await?,
        Commands::Album { id } => commands::album(&client, id).await?,
        Commands::Top { artist_id, limit } => commands::top_songs(&client, artist_id, limit).await?,
        Commands::Likes { action } => {
            let action = match action {
                None | Some(LikesCommand::List) => LikesAction::List,
                Some(LikesCommand::Add { id }) => LikesAction::Add(id),
                Some(LikesCommand::Remove { id }) => LikesAction::Remove(id),
            };
            commands::likes(&client, action).await?;
        }
        Commands::Play { source } => {
            let (queue, start) = commands::build_queue(&client, &source.into()).await?;
            let engine = PlaybackEngine::new(output(&config.output)?, config.playback.clone());
            player::run(engine, queue, start).await?;
        }
    }

    Ok(())
}

fn output(settings: &OutputSettings) -> anyhow::Result<Arc<dyn AudioOutput>> {
    match settings.backend {
        Backend::Simulated => {
            tracing::info!(preview_secs = settings.preview_secs, "Using simulated output");
            Ok(Arc::new(SimulatedOutput::new(Duration::from_secs(
                settings.preview_secs,
            ))))
        }
        #[cfg(feature = "device")]
        Backend::Device => {
            tracing::info!(fetch_timeout_secs = settings.fetch_timeout_secs, "Using audio device output");
            // A stalled download must fail the load rather than hang it
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.fetch_timeout_secs))
                .build()
                .context("could not build the HTTP client")?;
            let device =
                chorus_audio::DeviceOutput::new(http).context("could not open the audio device")?;
            Ok(Arc::new(device))
        }
        #[cfg(not(feature = "device"))]
        Backend::Device => {
            anyhow::bail!("output.backend = \"device\" needs a build with `--features device`")
        }
    }
}
