//! Liked songs.
//!
//! [`LikesClient`] is the raw endpoint wrapper. [`LikedSongs`] keeps a local
//! copy of the set so UIs can render hearts without a round trip.

use crate::client::CatalogClient;
use crate::error::{CatalogError, Result};
use crate::response::{check, read_json};
use crate::types::LikeRequest;
use reqwest::Client;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Client for the current user's likes.
pub struct LikesClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    token: &'a str,
}

impl<'a> LikesClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, token: &'a str) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// Ids of every liked song.
    pub async fn list(&self) -> Result<Vec<u64>> {
        let url = format!("{}/api/user/likes", self.base_url);
        debug!(url = %url, "Fetching liked songs");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token)
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        read_json(response, "liked songs").await
    }

    /// Like a song. Liking an already liked song succeeds.
    pub async fn add(&self, song_id: u64) -> Result<()> {
        let url = format!("{}/api/user/likes", self.base_url);
        debug!(url = %url, song_id, "Liking song");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.token)
            .json(&LikeRequest { song_id })
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        check(response, &format!("song {song_id}")).await?;
        Ok(())
    }

    /// Remove a like. Fails with `NotFound` if the song was not liked.
    pub async fn remove(&self, song_id: u64) -> Result<()> {
        let url = format!("{}/api/user/likes/{}", self.base_url, song_id);
        debug!(url = %url, song_id, "Unliking song");

        let response = self
            .http
            .delete(&url)
            .bearer_auth(self.token)
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        check(response, &format!("like for song {song_id}")).await?;
        Ok(())
    }
}

/// Optimistic local copy of the user's liked songs.
///
/// `like` and `unlike` update the set before the server answers. When the
/// server call fails, the set is reconciled with a fresh fetch (or reverted
/// if that fails too) and the original error is returned.
#[derive(Debug)]
pub struct LikedSongs {
    client: CatalogClient,
    ids: Mutex<BTreeSet<u64>>,
}

impl LikedSongs {
    pub fn new(client: CatalogClient) -> Self {
        Self {
            client,
            ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Replace the local set with the server's.
    pub async fn refresh(&self) -> Result<()> {
        let ids = self.client.liked_song_ids().await?;
        info!(count = ids.len(), "Liked songs refreshed");
        *self.lock() = ids.into_iter().collect();
        Ok(())
    }

    pub fn contains(&self, song_id: u64) -> bool {
        self.lock().contains(&song_id)
    }

    /// Snapshot of the liked ids, ascending.
    pub fn ids(&self) -> Vec<u64> {
        self.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every local like, e.g. on logout.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub async fn like(&self, song_id: u64) -> Result<()> {
        let inserted = self.lock().insert(song_id);

        match self.client.like_song(song_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(song_id, error = %e, "Like failed; reconciling");
                self.reconcile(|ids| {
                    if inserted {
                        ids.remove(&song_id);
                    }
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn unlike(&self, song_id: u64) -> Result<()> {
        let removed = self.lock().remove(&song_id);

        match self.client.unlike_song(song_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(song_id, error = %e, "Unlike failed; reconciling");
                self.reconcile(|ids| {
                    if removed {
                        ids.insert(song_id);
                    }
                })
                .await;
                Err(e)
            }
        }
    }

    /// Like or unlike depending on the local state. Returns whether the
    /// song is liked afterwards.
    pub async fn toggle(&self, song_id: u64) -> Result<bool> {
        if self.contains(song_id) {
            self.unlike(song_id).await.map(|()| false)
        } else {
            self.like(song_id).await.map(|()| true)
        }
    }

    async fn reconcile(&self, revert: impl FnOnce(&mut BTreeSet<u64>)) {
        if let Err(e) = self.refresh().await {
            debug!(error = %e, "Refetch failed; reverting optimistic update");
            revert(&mut self.lock());
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u64>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
