//! Configuration management for Pagecast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, PagecastError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com/v20.0";
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Settings for talking to the publish target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base used to turn relative image paths (e.g. `/uploads/a.jpg`) into
    /// absolute URLs the platform can fetch.
    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Delete already-staged media when a multi-image publish aborts
    #[serde(default)]
    pub cleanup_staged_media: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            public_base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            cleanup_staged_media: false,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

impl PublishingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Turn an authored image reference into the absolute URL that gets stored.
    ///
    /// Absolute http(s) URLs pass through. Paths like `/uploads/a.jpg` are
    /// joined onto `public_base_url`.
    pub fn resolve_image_url(&self, image: &str) -> Result<String> {
        let image = image.trim();
        if let Ok(url) = url::Url::parse(image) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(image.to_string());
            }
            return Err(PagecastError::InvalidInput(format!(
                "Image URL must use http or https: {}",
                image
            )));
        }

        match &self.public_base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                image.trim_start_matches('/')
            )),
            None => Err(PagecastError::InvalidInput(format!(
                "Relative image path '{}' needs publishing.public_base_url to be set",
                image
            ))),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing config file is not an error: the defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            let config = Self::default_config();
            config.validate()?;
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/pagecast/posts.db".to_string(),
            },
            publishing: PublishingConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.publishing.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "publishing.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.publishing.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "publishing.request_timeout_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }
        if url::Url::parse(&self.publishing.api_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "publishing.api_base_url".to_string(),
                reason: format!("'{}' is not a valid URL", self.publishing.api_base_url),
            }
            .into());
        }
        if self.daemon.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daemon.poll_interval".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Resolve the configuration file path under the XDG base directories
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PAGECAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("pagecast").join("config.toml"))
}

/// Resolve the database path, honouring `PAGECAST_DB_PATH`
pub fn resolve_db_path(configured: Option<&str>) -> Result<String> {
    if let Ok(path) = std::env::var("PAGECAST_DB_PATH") {
        return Ok(shellexpand::tilde(&path).to_string());
    }

    match configured {
        Some(path) => Ok(shellexpand::tilde(path).to_string()),
        None => {
            let data_dir = resolve_data_path()?;
            Ok(data_dir.join("posts.db").to_string_lossy().to_string())
        }
    }
}

/// Resolve the data directory path under the XDG base directories
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("pagecast"))
}
