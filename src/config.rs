//! Configuration module for the matter store.

use serde::Deserialize;
use std::path::Path;

use crate::{MatterError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/matter.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Physical storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory under which every space keeps its matter tree.
    #[serde(default = "default_matter_path")]
    pub matter_path: String,
}

fn default_matter_path() -> String {
    "data/matter".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            matter_path: default_matter_path(),
        }
    }
}

/// Share configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    /// Maximum number of matters bridged by one share.
    #[serde(default = "default_share_max_matters")]
    pub max_matters: usize,
    /// Length of the generated share code.
    #[serde(default = "default_share_code_length")]
    pub code_length: usize,
}

fn default_share_max_matters() -> usize {
    100
}

fn default_share_code_length() -> usize {
    4
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            max_matters: default_share_max_matters(),
            code_length: default_share_code_length(),
        }
    }
}

/// Listing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Page size used when a caller does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    /// Page size used by bulk page-by-page iteration.
    #[serde(default = "default_batch_page_size")]
    pub batch_page_size: i64,
}

fn default_page_size() -> i64 {
    200
}

fn default_batch_page_size() -> i64 {
    1000
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            batch_page_size: default_batch_page_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/matterstore.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Physical storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Share configuration.
    #[serde(default)]
    pub share: ShareConfig,
    /// Listing configuration.
    #[serde(default)]
    pub listing: ListingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(MatterError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| MatterError::Config(format!("parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MATTERSTORE_DATABASE_PATH`: Override the database path
    /// - `MATTERSTORE_MATTER_PATH`: Override the physical storage root
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MATTERSTORE_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(path) = std::env::var("MATTERSTORE_MATTER_PATH") {
            if !path.is_empty() {
                self.storage.matter_path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.share.max_matters == 0 {
            return Err(MatterError::Config(
                "share.max_matters must be at least 1".to_string(),
            ));
        }
        if self.share.code_length == 0 {
            return Err(MatterError::Config(
                "share.code_length must be at least 1".to_string(),
            ));
        }
        if self.listing.default_page_size <= 0 || self.listing.batch_page_size <= 0 {
            return Err(MatterError::Config(
                "listing page sizes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
