//! Shared response handling for catalog endpoints.

use crate::error::{CatalogError, Result};
use crate::types::ErrorBody;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Map non-success statuses onto `CatalogError`.
///
/// 401/403 become `AuthRequired` and 404 becomes `NotFound(what)`; the
/// server's `{message}` body is used for other failures when present.
pub(crate) async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CatalogError::AuthRequired),
        StatusCode::NOT_FOUND => Err(CatalogError::NotFound(what.to_string())),
        _ => {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            Err(CatalogError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Check the status, then parse the JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    check(response, what)
        .await?
        .json()
        .await
        .map_err(|e| CatalogError::ParseError(format!("Failed to parse {what}: {e}")))
}
