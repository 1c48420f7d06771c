use std::fs;
use std::path::Path;

use super::block_store::FileBlockStore;
use super::error::StoreResult;
use crate::config::EnvConfig;

/// Database environment: the explicit handle every relation's block store
/// is created from. Each test can build its own environment over a
/// private directory.
#[derive(Debug, Clone)]
pub struct DbEnv {
    config: EnvConfig,
}

impl DbEnv {
    /// Open an environment, creating its data directory if needed
    pub fn open(config: EnvConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    /// Open an environment over `data_dir` with default settings
    pub fn open_dir<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        Self::open(EnvConfig::new(data_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Block store handle for relation `name` (not yet opened)
    pub fn block_store(&self, name: &str) -> FileBlockStore {
        let path = self.config.data_dir.join(format!("{}.db", name));
        FileBlockStore::new(name, path, self.config.cache_blocks)
    }
}
