use lru::LruCache;
use std::num::NonZeroUsize;

use super::{BLOCK_SZ, BlockId};

/// Write-through LRU cache of block images for a single block store.
///
/// The store always writes to disk first and then refreshes the cached copy,
/// so an entry is never dirty and eviction never has to flush anything.
pub struct BlockCache {
    /// `None` when the configured capacity is zero (caching disabled)
    blocks: Option<LruCache<BlockId, Vec<u8>>>,
}

impl BlockCache {
    /// Create a cache holding at most `capacity` blocks
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Look up a block, refreshing its LRU position
    pub fn get(&mut self, block_id: BlockId) -> Option<&[u8]> {
        self.blocks
            .as_mut()
            .and_then(|blocks| blocks.get(&block_id))
            .map(|data| data.as_slice())
    }

    /// Insert or replace the cached image of a block
    pub fn insert(&mut self, block_id: BlockId, data: &[u8]) {
        debug_assert_eq!(data.len(), BLOCK_SZ);
        if let Some(blocks) = self.blocks.as_mut() {
            // Overwrite in place when the block is already cached
            match blocks.get_mut(&block_id) {
                Some(entry) => entry.copy_from_slice(data),
                None => {
                    blocks.put(block_id, data.to_vec());
                }
            }
        }
    }

    /// Drop every cached block
    pub fn clear(&mut self) {
        if let Some(blocks) = self.blocks.as_mut() {
            blocks.clear();
        }
    }

    /// Check if a block is cached (does not touch LRU order)
    pub fn contains(&self, block_id: BlockId) -> bool {
        self.blocks
            .as_ref()
            .is_some_and(|blocks| blocks.contains(&block_id))
    }

    /// Number of cached blocks
    pub fn len(&self) -> usize {
        self.blocks.as_ref().map_or(0, |blocks| blocks.len())
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(fill: u8) -> Vec<u8> {
        vec![fill; BLOCK_SZ]
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = BlockCache::new(4);
        cache.insert(1, &block(7));

        assert!(cache.contains(1));
        assert_eq!(cache.get(1).unwrap()[0], 7);
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn test_replace_existing_block() {
        let mut cache = BlockCache::new(4);
        cache.insert(1, &block(1));
        cache.insert(1, &block(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1).unwrap()[BLOCK_SZ - 1], 2);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = BlockCache::new(2);
        cache.insert(1, &block(1));
        cache.insert(2, &block(2));

        // Touch block 1 so block 2 becomes the LRU entry
        cache.get(1);
        cache.insert(3, &block(3));

        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let mut cache = BlockCache::new(0);
        cache.insert(1, &block(1));

        assert!(cache.is_empty());
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn test_clear() {
        let mut cache = BlockCache::new(4);
        cache.insert(1, &block(1));
        cache.insert(2, &block(2));
        cache.clear();

        assert!(cache.is_empty());
    }
}
