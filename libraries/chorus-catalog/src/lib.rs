//! Chorus Catalog Client
//!
//! HTTP client for the music catalog server that feeds the playback engine.
//!
//! # Features
//!
//! - **Catalog**: Albums, artists, top and popular songs, search
//! - **Authentication**: Email/password login and signup, bearer tokens
//! - **Likes**: Raw endpoints plus an optimistic local set ([`LikedSongs`])
//! - **Queues**: Mapping catalog records to playback [`TrackDescriptor`]s
//!
//! [`TrackDescriptor`]: chorus_playback::TrackDescriptor
//!
//! # Example
//!
//! ```ignore
//! use chorus_catalog::{CatalogClient, CatalogConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CatalogClient::new(CatalogConfig::new("https://music.example.com"))?;
//!
//!     let album = client.get_album(42).await?;
//!     println!("{} ({} songs)", album.title, album.songs.len());
//!
//!     engine.load_queue(album.to_queue(), 0).await?;
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod error;
mod library;
mod likes;
mod queue;
mod response;
mod types;

pub use client::CatalogClient;
pub use error::{CatalogError, Result};
pub use likes::LikedSongs;
pub use queue::{artist_queue, song_queue, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
pub use types::{
    Album, AlbumRef, Artist, ArtistRef, AuthResponse, CatalogConfig, SearchResults, Song, User,
};

// Re-export sub-clients for direct use if needed
pub use auth::AuthClient;
pub use library::LibraryClient;
pub use likes::LikesClient;
