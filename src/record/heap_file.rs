use std::ops::RangeInclusive;

use tracing::{debug, info, warn};

use super::error::{RecordError, RecordResult};
use super::page::SlottedPage;
use crate::file::{BlockId, BlockStore, DbEnv, StoreError};

/// A relation's storage: a sequence of slotted pages with block ids
/// `1..=last`, kept in one block store.
///
/// Blocks are only ever appended; an emptied block keeps its id.
pub struct HeapFile {
    name: String,
    store: Box<dyn BlockStore>,
    /// Highest allocated block id (0 before the first allocation)
    last: BlockId,
}

impl HeapFile {
    /// Heap file for relation `name` in the given environment (nothing is opened yet)
    pub fn new(env: &DbEnv, name: &str) -> Self {
        Self::with_store(name, Box::new(env.block_store(name)))
    }

    /// Heap file over an explicitly supplied block store
    pub fn with_store(name: &str, store: Box<dyn BlockStore>) -> Self {
        Self {
            name: name.to_string(),
            store,
            last: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Check if the underlying block store exists
    pub fn exists(&self) -> bool {
        self.store.exists()
    }

    /// Create the file with one empty block. Fails with `TableExists` if
    /// the store is already there.
    pub fn create(&mut self) -> RecordResult<()> {
        self.store.create().map_err(|e| match e {
            StoreError::AlreadyExists(_) => RecordError::TableExists(self.name.clone()),
            e => RecordError::Store(e),
        })?;
        self.last = 0;

        // Roll back the store if the first block cannot be written
        if let Err(e) = self.get_new().and_then(|page| self.put(&page)) {
            warn!(file = %self.name, error = %e, "heap file initialization failed");
            let _ = self.store.delete();
            self.last = 0;
            return Err(e);
        }

        info!(file = %self.name, "heap file created");
        Ok(())
    }

    /// Open the existing file; no-op if already open.
    /// Fails with `TableNotFound` if it doesn't exist.
    pub fn open(&mut self) -> RecordResult<()> {
        if self.is_open() {
            return Ok(());
        }

        self.store.open().map_err(|e| match e {
            StoreError::NotFound(_) => RecordError::TableNotFound(self.name.clone()),
            e => RecordError::Store(e),
        })?;

        // Release the handle again if the store can't be read
        match self.store.last_id() {
            Ok(last) => self.last = last,
            Err(e) => {
                let _ = self.store.close();
                return Err(e.into());
            }
        }

        debug!(file = %self.name, last = self.last, "heap file opened");
        Ok(())
    }

    /// Release the block store handle; no-op if already closed
    pub fn close(&mut self) -> RecordResult<()> {
        self.store.close()?;
        Ok(())
    }

    /// Close and permanently remove the file
    pub fn drop(&mut self) -> RecordResult<()> {
        self.store.delete().map_err(|e| match e {
            StoreError::NotFound(_) => RecordError::TableNotFound(self.name.clone()),
            e => RecordError::Store(e),
        })?;
        self.last = 0;

        info!(file = %self.name, "heap file dropped");
        Ok(())
    }

    /// Allocate a new empty block at the end of the file.
    ///
    /// The block is written to the store and read back, so the returned
    /// page reflects what the store holds.
    pub fn get_new(&mut self) -> RecordResult<SlottedPage> {
        let block_id = self.last + 1;
        let page = SlottedPage::new_empty(block_id);

        self.store.put(block_id, page.data())?;
        self.last = block_id;
        let block = self.store.get(block_id)?;

        debug!(file = %self.name, block_id, "block allocated");
        SlottedPage::from_bytes(block_id, block)
    }

    /// Fetch block `block_id` as a slotted page
    pub fn get(&mut self, block_id: BlockId) -> RecordResult<SlottedPage> {
        if block_id == 0 || block_id > self.last {
            return Err(RecordError::NoSuchBlock(block_id));
        }
        let block = self.store.get(block_id)?;
        SlottedPage::from_bytes(block_id, block)
    }

    /// Write a page back under its own block id, overwriting
    pub fn put(&mut self, page: &SlottedPage) -> RecordResult<()> {
        self.store.put(page.block_id(), page.data())?;
        Ok(())
    }

    /// All allocated block ids, ascending. Emptied blocks are included.
    pub fn block_ids(&self) -> RangeInclusive<BlockId> {
        1..=self.last
    }

    pub fn last_block_id(&self) -> BlockId {
        self.last
    }
}
