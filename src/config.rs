// Configuration file handling

use crate::storage::{self, DEFAULT_KEY};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_NAME: &str = "todostore";

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "TODOSTORE_CONFIG";

/// Where and under which key the task collection is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_key")]
    pub key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            key: default_key(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

impl Config {
    /// Load from `$TODOSTORE_CONFIG` or the per-user config file
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

        storage::validate_key(&config.key).wrap_err_with(|| format!("Invalid key in {}", path.display()))?;

        debug!(path = ?path, storage_dir = ?config.storage_dir, key = %config.key, "Loaded config");
        Ok(config)
    }
}

/// Config file location: `$TODOSTORE_CONFIG`, else `<config dir>/todostore/config.yaml`
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.yaml"))
}
