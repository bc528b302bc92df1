//! Authentication endpoints.

use crate::error::{CatalogError, Result};
use crate::response::{check, read_json};
use crate::types::{AuthResponse, LoginRequest, SignupRequest};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

/// Authentication client for the catalog server.
pub struct AuthClient<'a> {
    http: &'a Client,
    base_url: &'a str,
}

impl<'a> AuthClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str) -> Self {
        Self { http, base_url }
    }

    /// Login with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let url = format!("{}/api/auth/login", self.base_url);
        debug!(url = %url, email = %email, "Attempting login");

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        // The server answers 404 for an unknown email; treat it like a bad password
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND
        ) {
            warn!(status = %response.status(), "Login failed: invalid credentials");
            return Err(CatalogError::AuthRequired);
        }

        let login: AuthResponse = read_json(response, "login response").await?;
        info!(user_id = login.user.id, email = %login.user.email, "Login successful");
        Ok(login)
    }

    /// Create an account; the response carries a token like login.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let url = format!("{}/api/auth/signup", self.base_url);
        debug!(url = %url, email = %email, "Creating account");

        let response = self
            .http
            .post(&url)
            .json(&SignupRequest {
                name,
                email,
                password,
            })
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        let signup: AuthResponse = read_json(response, "signup response").await?;
        info!(user_id = signup.user.id, "Account created");
        Ok(signup)
    }

    /// Invalidate `token` on the server.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let url = format!("{}/api/auth/logout", self.base_url);
        debug!(url = %url, "Logging out");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(CatalogError::from_send)?;

        check(response, "session").await?;
        Ok(())
    }
}
