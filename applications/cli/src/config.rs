//! CLI configuration
use chorus_catalog::CatalogConfig;
use chorus_playback::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "chorus.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub playback: EngineConfig,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Session token from `chorus login`
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub backend: Backend,

    /// Length of a simulated preview
    #[serde(default = "default_preview_secs")]
    pub preview_secs: u64,

    /// Give up on a preview download after this long
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Wall-clock playback without sound
    #[default]
    Simulated,
    /// Speakers (needs the `device` feature)
    Device,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `chorus.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Self::environment())
    }

    /// Variables like `CHORUS_CATALOG__URL` or `CHORUS_PLAYBACK__AUTOPLAY`
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix("CHORUS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    pub fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(environment);

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = self.catalog.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid(
                "catalog.url is required (set CHORUS_CATALOG__URL)".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "catalog.url must start with http:// or https://, got {url:?}"
            )));
        }

        for (name, value) in [
            ("catalog.timeout_secs", self.catalog.timeout_secs),
            (
                "playback.progress_update_interval_ms",
                self.playback.progress_update_interval_ms,
            ),
            ("output.preview_secs", self.output.preview_secs),
            ("output.fetch_timeout_secs", self.output.fetch_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }

        if self.playback.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "playback.event_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            url: self.catalog.url.clone(),
            token: self.catalog.token.clone(),
            timeout: Duration::from_secs(self.catalog.timeout_secs),
        }
    }
}

// Default values
fn default_catalog_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_preview_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            preview_secs: default_preview_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}
