use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of blocks kept in each block store's cache
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for a database environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Directory holding one `<table>.db` file per relation plus the catalog
    pub data_dir: PathBuf,
    /// Blocks cached per open block store (0 disables caching)
    pub cache_blocks: usize,
}

impl EnvConfig {
    /// Config rooted at `data_dir` with default tuning
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_blocks: DEFAULT_CACHE_BLOCKS,
        }
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn with_cache_blocks(mut self, cache_blocks: usize) -> Self {
        self.cache_blocks = cache_blocks;
        self
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
