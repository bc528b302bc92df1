//! Catalog browsing endpoints.

use crate::error::{CatalogError, Result};
use crate::response::read_json;
use crate::types::{Album, Artist, SearchResults, Song};
use reqwest::Client;
use tracing::debug;

/// Client for albums, artists, popular songs and search.
pub struct LibraryClient<'a> {
    http: &'a Client,
    base_url: &'a str,
}

impl<'a> LibraryClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str) -> Self {
        Self { http, base_url }
    }

    /// Get an album with its artist and songs.
    ///
    /// Songs are sorted by track number; unnumbered songs go last.
    pub async fn get_album(&self, album_id: u64) -> Result<Album> {
        let url = format!("{}/api/albums/{}", self.base_url, album_id);
        debug!(url = %url, album_id, "Fetching album");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        let mut album: Album = read_json(response, &format!("album {album_id}")).await?;
        album
            .songs
            .sort_by_key(|song| song.track_number.unwrap_or(u32::MAX));

        debug!(album_id, songs = album.songs.len(), "Fetched album");
        Ok(album)
    }

    /// Get an artist.
    pub async fn get_artist(&self, artist_id: u64) -> Result<Artist> {
        let url = format!("{}/api/artists/{}", self.base_url, artist_id);
        debug!(url = %url, artist_id, "Fetching artist");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        read_json(response, &format!("artist {artist_id}")).await
    }

    /// Get an artist's top songs, each with its album embedded.
    pub async fn get_artist_top_songs(&self, artist_id: u64, limit: u32) -> Result<Vec<Song>> {
        let url = format!("{}/api/artists/{}/songs", self.base_url, artist_id);
        debug!(url = %url, artist_id, limit, "Fetching artist top songs");

        let response = self
            .http
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        read_json(response, &format!("artist {artist_id}")).await
    }

    /// Get the most popular songs, each with artist and album embedded.
    pub async fn get_popular_songs(&self) -> Result<Vec<Song>> {
        let url = format!("{}/api/songs/popular", self.base_url);
        debug!(url = %url, "Fetching popular songs");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        read_json(response, "popular songs").await
    }

    /// Search artists, albums and songs.
    ///
    /// A blank query returns empty results without contacting the server.
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }

        let url = format!("{}/api/search", self.base_url);
        debug!(url = %url, query = %query, "Searching catalog");

        let response = self
            .http
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        let results: SearchResults = read_json(response, "search results").await?;
        debug!(
            artists = results.artists.len(),
            albums = results.albums.len(),
            songs = results.songs.len(),
            "Search complete"
        );
        Ok(results)
    }
}
