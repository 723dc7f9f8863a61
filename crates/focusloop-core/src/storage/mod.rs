mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, RemindersConfig, TelegramConfig};
pub use database::{CheckinRecorded, Database, ProfileRecord};

use std::path::PathBuf;

use crate::error::Result;

/// Returns `~/.config/focusloop[-dev]/` based on FOCUSLOOP_ENV.
///
/// Set FOCUSLOOP_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSLOOP_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusloop-dev")
    } else {
        base_dir.join("focusloop")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
