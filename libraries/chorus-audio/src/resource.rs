//! Audio resource addressing

use crate::error::{AudioError, Result};
use std::path::PathBuf;
use url::Url;

/// Where a preview lives, parsed from its URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resource {
    /// `http://` or `https://`
    Remote(Url),

    /// `file://`
    File(PathBuf),

    /// `sim://`, only meaningful to the simulated output
    Simulated(Url),
}

impl Resource {
    pub(crate) fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri.trim()).map_err(|e| AudioError::UnsupportedUri(format!("{uri}: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|()| AudioError::UnsupportedUri(uri.to_string())),
            "sim" => Ok(Self::Simulated(url)),
            _ => Err(AudioError::UnsupportedUri(uri.to_string())),
        }
    }
}
