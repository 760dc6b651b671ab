//! Application configuration module
//!
//! Configuration is layered: defaults, then an optional TOML file, then
//! environment variables (`FITSYNC_API_URL`, `FITSYNC_API_TOKEN`,
//! `FITSYNC_DATABASE_PATH`, `FITSYNC_SYNC_INTERVAL_SECS`).
//!
//! ```toml
//! server_url = "https://api.example.com"
//! request_timeout_secs = 20
//!
//! [sync]
//! sync_interval_seconds = 15
//! max_retry_attempts = 8
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the remote API
    pub server_url: String,
    /// Bearer token attached to API requests
    pub api_token: Option<String>,
    /// Location of the local SQLite database
    pub database_path: Option<PathBuf>,
    /// Per-request timeout for remote calls
    pub request_timeout_secs: u64,
    /// Queue and background sync settings
    pub sync: SyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_token: None,
            database_path: None,
            request_timeout_secs: 30,
            sync: SyncConfig::default(),
        }
    }
}

/// Configuration for the sync queue and background service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Enable automatic background sync
    pub auto_sync: bool,
    /// Sync interval in seconds when online
    pub sync_interval_seconds: u64,
    /// Maximum operations in flight at once (always one per record)
    pub max_concurrent_ops: usize,
    /// Attempts before an operation is dead-lettered
    pub max_retry_attempts: u32,
    /// First retry delay in seconds
    pub backoff_base_seconds: u64,
    /// Upper bound for the retry delay in seconds
    pub backoff_max_seconds: u64,
    /// Jitter factor (0.0 to 1.0)
    pub backoff_jitter: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_seconds: 30,
            max_concurrent_ops: 5,
            max_retry_attempts: 5,
            backoff_base_seconds: 1,
            backoff_max_seconds: 300,
            backoff_jitter: 0.1,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Load from an optional file, then apply process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FITSYNC_API_URL") {
            self.server_url = url;
        }
        if let Some(token) = lookup("FITSYNC_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(path) = lookup("FITSYNC_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(interval) = lookup("FITSYNC_SYNC_INTERVAL_SECS") {
            self.sync.sync_interval_seconds =
                interval.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "sync.sync_interval_seconds",
                    message: format!("not an integer: {}", interval),
                })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        self.sync.validate()
    }

    /// Database path, defaulting to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
            path.push("fitsync");
            path.push("local.db");
            path
        })
    }
}

/// Longest retry delay a config may ask for (one day)
pub const MAX_BACKOFF_SECONDS: u64 = 24 * 60 * 60;

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.sync_interval_seconds",
                message: "must be positive".to_string(),
            });
        }
        if self.max_concurrent_ops == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.max_concurrent_ops",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.max_retry_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        for (field, value) in [
            ("sync.backoff_base_seconds", self.backoff_base_seconds),
            ("sync.backoff_max_seconds", self.backoff_max_seconds),
        ] {
            if value > MAX_BACKOFF_SECONDS {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: format!("{} exceeds {} seconds", value, MAX_BACKOFF_SECONDS),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(ConfigError::InvalidValue {
                field: "sync.backoff_jitter",
                message: format!("{} is outside 0.0..=1.0", self.backoff_jitter),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    api_token: Option<String>,
    database_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    sync: Option<SyncConfig>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            api_token: self.api_token,
            database_path: self.database_path,
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            sync: self.sync.unwrap_or(defaults.sync),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}
