mod block_cache;
mod block_store;
mod env;
mod error;

pub use block_cache::BlockCache;
pub use block_store::{BlockStore, FileBlockStore};
pub use env::DbEnv;
pub use error::{StoreError, StoreResult};

/// Block size in bytes (4KB); every record in a block store has exactly this length
pub const BLOCK_SZ: usize = 4096;

/// Block ID type (1-based, 0 means "no block")
pub type BlockId = u32;
