//! Configuration file support for the BMI tracker.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/bmi-tracker/config.toml`.

use crate::{Error, HistoryService, RecordStore, Result, DEFAULT_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "bmi-tracker";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_store_file")]
    pub store_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_file: default_store_file(),
        }
    }
}

/// History view configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join(APP_DIR),
        None => PathBuf::from("data"),
    }
}

fn default_store_file() -> String {
    "users.json".into()
}

fn default_recent_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(config_path) if config_path.exists() => Self::load_from(&config_path),
            config_path => {
                tracing::info!("No config file found at {:?}, using defaults", config_path);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path, if the platform has a config dir
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join(APP_DIR).join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.data.store_file.trim().is_empty() {
            return Err(Error::Config("data.store_file must not be empty".into()));
        }
        if self.history.recent_limit == 0 {
            return Err(Error::Config("history.recent_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Path of the store file under `data_dir`
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.data.store_file)
    }

    /// Build the history service for `data_dir`
    pub fn history_service(&self, data_dir: &Path) -> HistoryService {
        HistoryService::new(RecordStore::new(self.store_path(data_dir)))
    }
}
