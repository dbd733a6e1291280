//! Configuration management for recipebox.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "recipebox";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "recipebox.db";

/// Default image directory name (inside the data directory).
const IMAGES_DIR_NAME: &str = "images";

/// File holding the session token of the signed-in CLI user.
const SESSION_FILE_NAME: &str = "session";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `RECIPEBOX_`)
/// 2. TOML config file at `~/.config/recipebox/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Account and session configuration.
    pub auth: AuthConfig,
    /// Community feed configuration.
    pub feed: FeedConfig,
    /// Image upload configuration.
    pub images: ImageConfig,
    /// Rating and review configuration.
    pub ratings: RatingConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/recipebox/recipebox.db`
    pub database_path: Option<PathBuf>,
    /// Directory for uploaded images.
    /// Defaults to `~/.local/share/recipebox/images`
    pub images_dir: Option<PathBuf>,
    /// Path to the CLI session file.
    /// Defaults to `~/.local/share/recipebox/session`
    pub session_file: Option<PathBuf>,
}

/// Account and session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long a session stays valid, in hours.
    pub session_ttl_hours: u32,
    /// Minimum accepted password length.
    pub min_password_length: usize,
}

/// Community feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Page size used when none is requested.
    pub default_page_size: usize,
    /// Largest page size a query may request.
    pub max_page_size: usize,
}

/// Image upload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Maximum accepted image size in bytes.
    pub max_bytes: u64,
    /// Accepted file extensions (lower-case, without the dot).
    pub allowed_extensions: Vec<String>,
}

/// Rating and review configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Maximum review length in characters.
    pub max_review_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 7,
            min_password_length: 8,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            allowed_extensions: default_image_extensions(),
        }
    }
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            max_review_length: 2_000,
        }
    }
}

/// Default accepted image extensions.
fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("RECIPEBOX_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auth.session_ttl_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "session_ttl_hours must be greater than 0".to_string(),
            });
        }

        if self.auth.min_password_length == 0 {
            return Err(Error::ConfigValidation {
                message: "min_password_length must be greater than 0".to_string(),
            });
        }

        if self.feed.max_page_size == 0 {
            return Err(Error::ConfigValidation {
                message: "max_page_size must be greater than 0".to_string(),
            });
        }

        if self.feed.default_page_size == 0 || self.feed.default_page_size > self.feed.max_page_size
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "default_page_size ({}) must be between 1 and max_page_size ({})",
                    self.feed.default_page_size, self.feed.max_page_size
                ),
            });
        }

        if self.images.max_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "images.max_bytes must be greater than 0".to_string(),
            });
        }

        for ext in &self.images.allowed_extensions {
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Error::ConfigValidation {
                    message: format!("invalid image extension: {ext:?}"),
                });
            }
        }

        if self.ratings.max_review_length == 0 {
            return Err(Error::ConfigValidation {
                message: "max_review_length must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the image directory, resolving defaults if not set.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.storage
            .images_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(IMAGES_DIR_NAME))
    }

    /// Get the session file path, resolving defaults if not set.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.storage
            .session_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SESSION_FILE_NAME))
    }

    /// Get the session lifetime as a Duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.auth.session_ttl_hours) * 60 * 60)
    }

    /// Clamp a requested page size to the configured bounds.
    #[must_use]
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.feed.default_page_size)
            .clamp(1, self.feed.max_page_size)
    }
}
