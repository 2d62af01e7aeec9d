use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon configuration, loaded from a YAML file. Every consumer receives
/// this (or values derived from it) explicitly at construction; nothing
/// reads ambient settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub tick_interval_secs: u64,
    /// Substituted when a user's stored timezone fails to resolve.
    pub fallback_timezone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("habitd.db"),
            log_dir: PathBuf::from("logs"),
            tick_interval_secs: 300,
            fallback_timezone: "Europe/Vilnius".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the config file, falling back to defaults when it does not
    /// exist. A file that exists but fails to parse is an error; silently
    /// running with defaults would mask an operator mistake.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw)
            .map_err(|error| AppError::Internal(format!("config parse failed: {error}")))
    }
}
