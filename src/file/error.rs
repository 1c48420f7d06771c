use std::io;
use thiserror::Error;

use super::BlockId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Block store already exists: {0}")]
    AlreadyExists(String),

    #[error("Block store not found: {0}")]
    NotFound(String),

    #[error("Block store is not open: {0}")]
    NotOpen(String),

    #[error("Block not found: block_id={0}")]
    BlockNotFound(BlockId),

    #[error("Invalid block size: expected {expected}, got {actual}")]
    InvalidBlockSize { expected: usize, actual: usize },
}

pub type StoreResult<T> = Result<T, StoreError>;
