use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::block_cache::BlockCache;
use super::error::{StoreError, StoreResult};
use super::{BLOCK_SZ, BlockId};

/// Durable store of fixed-length (`BLOCK_SZ`) byte blocks keyed by
/// sequential 1-based block ids.
///
/// A store is bound to one name at construction; `create`/`open` acquire
/// the underlying resource and `close` releases it. Closing an already
/// closed store is a no-op.
pub trait BlockStore {
    /// Name the store was created under
    fn name(&self) -> &str;

    /// Check if the store exists (open or not)
    fn exists(&self) -> bool;

    /// Check if the store is currently open
    fn is_open(&self) -> bool;

    /// Create the store exclusively and leave it open.
    /// Fails with `AlreadyExists` if it is already there.
    fn create(&mut self) -> StoreResult<()>;

    /// Open an existing store; no-op if already open
    fn open(&mut self) -> StoreResult<()>;

    /// Release the store handle
    fn close(&mut self) -> StoreResult<()>;

    /// Close (if open) and permanently remove the store
    fn delete(&mut self) -> StoreResult<()>;

    /// Fetch the block stored under `block_id`
    fn get(&mut self, block_id: BlockId) -> StoreResult<Vec<u8>>;

    /// Write exactly `BLOCK_SZ` bytes under `block_id`, creating or overwriting
    fn put(&mut self, block_id: BlockId, data: &[u8]) -> StoreResult<()>;

    /// Highest block id ever written (0 if none)
    fn last_id(&mut self) -> StoreResult<BlockId>;
}

/// Block store backed by a single file: block `id` lives at byte offset
/// `(id - 1) * BLOCK_SZ`.
pub struct FileBlockStore {
    name: String,
    path: PathBuf,
    /// Open file, `None` while closed
    file: Option<File>,
    cache: BlockCache,
}

impl FileBlockStore {
    /// Create a store handle for `path` (nothing is opened yet)
    pub fn new<P: AsRef<Path>>(name: &str, path: P, cache_blocks: usize) -> Self {
        Self {
            name: name.to_string(),
            path: path.as_ref().to_path_buf(),
            file: None,
            cache: BlockCache::new(cache_blocks),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of blocks currently held in the cache
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    fn file_mut(&mut self) -> StoreResult<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| StoreError::NotOpen(self.name.clone()))
    }

    fn block_offset(block_id: BlockId) -> u64 {
        (block_id as u64 - 1) * BLOCK_SZ as u64
    }
}

impl BlockStore for FileBlockStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn create(&mut self) -> StoreResult<()> {
        if self.is_open() {
            return Err(StoreError::AlreadyExists(self.name.clone()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StoreError::AlreadyExists(self.name.clone()),
                _ => StoreError::Io(e),
            })?;

        debug!(store = %self.name, path = %self.path.display(), "block store created");
        self.file = Some(file);
        Ok(())
    }

    fn open(&mut self) -> StoreResult<()> {
        if self.is_open() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::NotFound(self.name.clone()),
                _ => StoreError::Io(e),
            })?;

        debug!(store = %self.name, "block store opened");
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if let Some(file) = self.file.take() {
            self.cache.clear();
            file.sync_data()?;
            debug!(store = %self.name, "block store closed");
        }
        Ok(())
    }

    fn delete(&mut self) -> StoreResult<()> {
        self.close()?;
        fs::remove_file(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(self.name.clone()),
            _ => StoreError::Io(e),
        })?;
        debug!(store = %self.name, "block store deleted");
        Ok(())
    }

    fn get(&mut self, block_id: BlockId) -> StoreResult<Vec<u8>> {
        let last = self.last_id()?;
        if block_id == 0 || block_id > last {
            return Err(StoreError::BlockNotFound(block_id));
        }

        if let Some(data) = self.cache.get(block_id) {
            return Ok(data.to_vec());
        }

        let mut buffer = vec![0u8; BLOCK_SZ];
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(Self::block_offset(block_id)))?;
        file.read_exact(&mut buffer)?;

        self.cache.insert(block_id, &buffer);
        Ok(buffer)
    }

    fn put(&mut self, block_id: BlockId, data: &[u8]) -> StoreResult<()> {
        if data.len() != BLOCK_SZ {
            return Err(StoreError::InvalidBlockSize {
                expected: BLOCK_SZ,
                actual: data.len(),
            });
        }
        if block_id == 0 {
            return Err(StoreError::BlockNotFound(block_id));
        }

        let offset = Self::block_offset(block_id);
        let required_size = offset + BLOCK_SZ as u64;
        let file = self.file_mut()?;

        // Extend file if necessary to ensure we can write at this offset
        let current_size = file.metadata()?.len();
        if current_size < required_size {
            file.set_len(required_size)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        self.cache.insert(block_id, data);
        Ok(())
    }

    fn last_id(&mut self) -> StoreResult<BlockId> {
        let file = self.file_mut()?;
        let file_size = file.metadata()?.len();
        Ok((file_size / BLOCK_SZ as u64) as BlockId)
    }
}
