//! Mapping catalog records to playback queues

use crate::types::{Album, Artist, Song};
use chorus_playback::TrackDescriptor;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

impl Song {
    /// Track descriptor using only what this song embeds
    pub fn to_track(&self) -> TrackDescriptor {
        self.describe(None, None)
    }

    /// Track descriptor, filling missing artist/album details from context
    fn describe(&self, album: Option<&Album>, artist_name: Option<&str>) -> TrackDescriptor {
        let artist_name = self
            .artist
            .as_ref()
            .map(|artist| artist.name.as_str())
            .or(artist_name)
            .or_else(|| album.and_then(|a| a.artist.as_ref()).map(|a| a.name.as_str()))
            .unwrap_or(UNKNOWN_ARTIST);

        let album_title = self
            .album
            .as_ref()
            .map(|a| a.title.as_str())
            .or_else(|| album.map(|a| a.title.as_str()))
            .unwrap_or(UNKNOWN_ALBUM);

        let artwork_uri = self
            .album
            .as_ref()
            .and_then(|a| a.cover_url.clone())
            .or_else(|| album.and_then(|a| a.cover_url.clone()));

        TrackDescriptor {
            id: self.id.to_string(),
            title: self.title.clone(),
            artist_name: artist_name.to_string(),
            album_title: album_title.to_string(),
            artwork_uri,
            preview_uri: self.preview_url.clone(),
        }
    }
}

impl Album {
    /// Queue of the album's songs in track order
    pub fn to_queue(&self) -> Vec<TrackDescriptor> {
        let mut songs: Vec<&Song> = self.songs.iter().collect();
        songs.sort_by_key(|song| song.track_number.unwrap_or(u32::MAX));
        songs
            .into_iter()
            .map(|song| song.describe(Some(self), None))
            .collect()
    }
}

/// Queue of an artist's songs; the songs only embed their album
pub fn artist_queue(artist: &Artist, songs: &[Song]) -> Vec<TrackDescriptor> {
    songs
        .iter()
        .map(|song| song.describe(None, Some(&artist.name)))
        .collect()
}

/// Queue of songs that embed their own artist and album
pub fn song_queue(songs: &[Song]) -> Vec<TrackDescriptor> {
    songs.iter().map(Song::to_track).collect()
}
