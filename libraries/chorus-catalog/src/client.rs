//! Main catalog client.

use crate::auth::AuthClient;
use crate::error::{CatalogError, Result};
use crate::library::LibraryClient;
use crate::likes::LikesClient;
use crate::types::{Album, Artist, AuthResponse, CatalogConfig, SearchResults, Song};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

/// Client for the catalog, authentication and likes API.
///
/// Cloning is cheap; clones share the HTTP connection pool and the
/// session token.
///
/// # Example
///
/// ```ignore
/// use chorus_catalog::{CatalogClient, CatalogConfig};
///
/// let client = CatalogClient::new(CatalogConfig::new("https://music.example.com"))?;
///
/// let album = client.get_album(42).await?;
/// engine.load_queue(album.to_queue(), 0).await;
///
/// client.login("ada@example.com", "hunter2").await?;
/// client.like_song(album.songs[0].id).await?;
/// ```
#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
}

impl CatalogClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CatalogError::InvalidUrl("URL cannot be empty".into()));
        }

        let base_url = config.url.trim().trim_end_matches('/').to_string();
        let parsed =
            Url::parse(&base_url).map_err(|e| CatalogError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(10)))
            .user_agent(format!("Chorus/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            token: Arc::new(RwLock::new(config.token)),
        })
    }

    /// Get the server URL, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Check if the client holds a session token.
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Get the current session token.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Set the token directly (e.g., from stored credentials).
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Catalog browsing endpoints. These need no session.
    pub fn library(&self) -> LibraryClient<'_> {
        LibraryClient::new(&self.http, &self.base_url)
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Login with email and password.
    ///
    /// On success, the token is stored for subsequent requests.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let response = AuthClient::new(&self.http, &self.base_url)
            .login(email, password)
            .await?;
        self.set_token(Some(response.token.clone())).await;
        Ok(response)
    }

    /// Create an account and keep its session.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let response = AuthClient::new(&self.http, &self.base_url)
            .signup(name, email, password)
            .await?;
        self.set_token(Some(response.token.clone())).await;
        Ok(response)
    }

    /// End the session.
    ///
    /// The local token is cleared even if the server cannot be told.
    pub async fn logout(&self) {
        let Some(token) = self.token.write().await.take() else {
            return;
        };

        if let Err(e) = AuthClient::new(&self.http, &self.base_url)
            .logout(&token)
            .await
        {
            warn!(error = %e, "Server logout failed; local session cleared anyway");
        }
        info!("Logged out");
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// Fetch an album with its songs in track order.
    pub async fn get_album(&self, album_id: u64) -> Result<Album> {
        self.library().get_album(album_id).await
    }

    pub async fn get_artist(&self, artist_id: u64) -> Result<Artist> {
        self.library().get_artist(artist_id).await
    }

    /// An artist's most popular songs, at most `limit`.
    pub async fn get_artist_top_songs(&self, artist_id: u64, limit: u32) -> Result<Vec<Song>> {
        self.library().get_artist_top_songs(artist_id, limit).await
    }

    pub async fn get_popular_songs(&self) -> Result<Vec<Song>> {
        self.library().get_popular_songs().await
    }

    /// Search artists, albums and songs. A blank query matches nothing.
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        self.library().search(query).await
    }

    // -------------------------------------------------------------------------
    // Likes
    // -------------------------------------------------------------------------

    /// Ids of the songs the current user likes.
    pub async fn liked_song_ids(&self) -> Result<Vec<u64>> {
        let token = self.require_token().await?;
        self.likes(&token).list().await
    }

    pub async fn like_song(&self, song_id: u64) -> Result<()> {
        let token = self.require_token().await?;
        self.likes(&token).add(song_id).await
    }

    pub async fn unlike_song(&self, song_id: u64) -> Result<()> {
        let token = self.require_token().await?;
        self.likes(&token).remove(song_id).await
    }

    fn likes<'a>(&'a self, token: &'a str) -> LikesClient<'a> {
        LikesClient::new(&self.http, &self.base_url, token)
    }

    async fn require_token(&self) -> Result<String> {
        self.token().await.ok_or(CatalogError::AuthRequired)
    }
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
