//! Catalog subcommands: browsing, login and likes.

use anyhow::Context;
use chorus_catalog::{Album, CatalogClient, CatalogError, LikedSongs, SearchResults, Song};
use chorus_playback::TrackDescriptor;
use tracing::info;

/// Which queue `chorus play` should build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSource {
    Album { id: u64, start: usize },
    Artist { id: u64, limit: u32 },
    Popular,
    Search { query: String },
}

pub async fn login(client: &CatalogClient, email: &str, password: &str) -> anyhow::Result<()> {
    let response = client
        .login(email, password)
        .await
        .context("login failed")?;

    let name = response.user.name.as_deref().unwrap_or(&response.user.email);
    println!("Logged in as {name}");
    println!("export CHORUS_CATALOG__TOKEN={}", response.token);
    Ok(())
}

pub async fn search(client: &CatalogClient, query: &str) -> anyhow::Result<()> {
    let results = client.search(query).await.context("search failed")?;
    print!("{}", format_search(&results));
    Ok(())
}

pub async fn album(client: &CatalogClient, album_id: u64) -> anyhow::Result<()> {
    let album = client
        .get_album(album_id)
        .await
        .with_context(|| format!("could not fetch album {album_id}"))?;
    print!("{}", format_album(&album));
    Ok(())
}

pub async fn top_songs(client: &CatalogClient, artist_id: u64, limit: u32) -> anyhow::Result<()> {
    let artist = client.get_artist(artist_id).await?;
    let songs = client.get_artist_top_songs(artist_id, limit).await?;

    println!("{} - top songs", artist.name);
    for (i, song) in songs.iter().enumerate() {
        println!("{:>3}. {}", i + 1, song_line(song));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikesAction {
    List,
    Add(u64),
    Remove(u64),
}

pub async fn likes(client: &CatalogClient, action: LikesAction) -> anyhow::Result<()> {
    let liked = LikedSongs::new(client.clone());
    let result = match action {
        LikesAction::List => liked.refresh().await,
        LikesAction::Add(id) => liked.like(id).await,
        LikesAction::Remove(id) => liked.unlike(id).await,
    };

    if let Err(CatalogError::AuthRequired) = result {
        anyhow::bail!("not logged in; run `chorus login` and export CHORUS_CATALOG__TOKEN");
    }
    result?;

    match action {
        LikesAction::List => {
            let ids = liked.ids();
            if ids.is_empty() {
                println!("No liked songs");
            }
            for id in ids {
                println!("{id}");
            }
        }
        LikesAction::Add(id) => println!("Liked song {id}"),
        LikesAction::Remove(id) => println!("Unliked song {id}"),
    }
    Ok(())
}

/// Fetch the tracks to play and the index to start from
pub async fn build_queue(
    client: &CatalogClient,
    source: &QueueSource,
) -> anyhow::Result<(Vec<TrackDescriptor>, usize)> {
    let (queue, start) = match source {
        QueueSource::Album { id, start } => {
            let album = client
                .get_album(*id)
                .await
                .with_context(|| format!("could not fetch album {id}"))?;
            (album.to_queue(), *start)
        }
        QueueSource::Artist { id, limit } => {
            let artist = client.get_artist(*id).await?;
            let songs = client.get_artist_top_songs(*id, *limit).await?;
            (chorus_catalog::artist_queue(&artist, &songs), 0)
        }
        QueueSource::Popular => {
            let songs = client.get_popular_songs().await?;
            (chorus_catalog::song_queue(&songs), 0)
        }
        QueueSource::Search { query } => {
            let results = client.search(query).await?;
            (chorus_catalog::song_queue(&results.songs), 0)
        }
    };

    if queue.is_empty() {
        anyhow::bail!("nothing to play");
    }
    info!(tracks = queue.len(), ?source, "Queue built");
    Ok((queue, start))
}

fn song_line(song: &Song) -> String {
    let mut line = format!("[{}] {}", song.id, song.title);
    if let Some(artist) = &song.artist {
        line.push_str(&format!(" - {}", artist.name));
    }
    if song.preview_url.is_none() {
        line.push_str(" (no preview)");
    }
    line
}

fn format_album(album: &Album) -> String {
    let artist = album
        .artist
        .as_ref()
        .map_or(chorus_catalog::UNKNOWN_ARTIST, |a| a.name.as_str());
    let mut out = format!("{} - {}\n", album.title, artist);
    for song in &album.songs {
        let number = song
            .track_number
            .map_or_else(|| "  -".to_string(), |n| format!("{n:>3}"));
        out.push_str(&format!("{number}. {}\n", song_line(song)));
    }
    out
}

fn format_search(results: &SearchResults) -> String {
    if results.is_empty() {
        return "No results\n".to_string();
    }

    let mut out = String::new();
    if !results.artists.is_empty() {
        out.push_str("Artists:\n");
        for artist in &results.artists {
            out.push_str(&format!("  [{}] {}\n", artist.id, artist.name));
        }
    }
    if !results.albums.is_empty() {
        out.push_str("Albums:\n");
        for album in &results.albums {
            out.push_str(&format!("  [{}] {}\n", album.id, album.title));
        }
    }
    if !results.songs.is_empty() {
        out.push_str("Songs:\n");
        for song in &results.songs {
            out.push_str(&format!("  {}\n", song_line(song)));
        }
    }
    out
}
