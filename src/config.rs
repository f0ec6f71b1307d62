//! Runtime configuration
//!
//! Loaded from a YAML file; every field has a default so an absent file or
//! a partial one is fine. The loaded `Config` is passed explicitly to the
//! store constructor and components. Nothing here reads the environment.

use crate::build::DEFAULT_CHUNK_SIZE;
use crate::storage::DEFAULT_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub build: BuildConfig,
    pub similarity: SimilarityConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `None` means the per-user data directory
    pub path: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Configured database path, or `<data_dir>/papergraph/papergraph.db`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_db_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub chunk_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub k: usize,
    pub backfill_limit: usize,
    pub min_corpus_size: Option<usize>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            k: 10,
            backfill_limit: 200,
            min_corpus_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter level: error, warn, info, debug or trace
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// tried, and defaults are used if nothing is there.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document is a valid, all-defaults config
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.chunk_size == 0 {
            return Err(ConfigError::Invalid("build.chunk_size must be > 0".into()));
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigError::Invalid("store.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// `<data_dir>/papergraph/papergraph.db`
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("papergraph").join("papergraph.db")
}

/// `<config_dir>/papergraph/config.yaml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("papergraph").join("config.yaml"))
}
