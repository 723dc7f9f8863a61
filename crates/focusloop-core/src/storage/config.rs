//! TOML-based application configuration.
//!
//! Stores bot settings including:
//! - Telegram API token and endpoint
//! - Long-poll timeout
//! - Reminder tick interval
//!
//! Configuration is stored at `~/.config/focusloop/config.toml`. The bot
//! token can also come from the FOCUSLOOP_BOT_TOKEN environment variable,
//! which takes precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result};

/// Telegram transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Empty means "use the environment variable".
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

/// Reminder loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// How often the reminder planner wakes up, in seconds.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
}

// Default functions
fn default_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout() -> u64 {
    30
}
fn default_tick() -> u64 {
    60
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            reminders: RemindersConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from an explicit path, without touching the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Resolve the bot token from the environment or the config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKey` when neither source has a token.
    pub fn bot_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var("FOCUSLOOP_BOT_TOKEN") {
            if !token.is_empty() {
                return Ok(token);
            }
        }
        if !self.telegram.token.is_empty() {
            return Ok(self.telegram.token.clone());
        }
        Err(ConfigError::MissingKey("telegram.token".to_string()).into())
    }
}
