use crate::file::{BlockId, StoreError};
use thiserror::Error;

use super::row::RecordId;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No room in block: needed {needed} bytes, {available} available")]
    NoRoom { needed: usize, available: usize },

    #[error("No such record: block_id={0}, record_id={1}")]
    NoSuchRecord(BlockId, RecordId),

    #[error("No such block: block_id={0}")]
    NoSuchBlock(BlockId),

    #[error("Corrupt block {0}: {1}")]
    Corrupt(BlockId, String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Missing value for column {0}")]
    MissingColumn(String),

    #[error("Column {0} not found")]
    UnknownColumn(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Type mismatch for column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Row too large: {size} bytes, at most {max} fit in a block")]
    RowTooLarge { size: usize, max: usize },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl RecordError {
    /// The block could not accommodate an add or a growing put
    pub fn is_no_room(&self) -> bool {
        matches!(self, RecordError::NoRoom { .. })
    }

    /// Schema or usage violation at the relation level
    pub fn is_relation_error(&self) -> bool {
        matches!(
            self,
            RecordError::TableExists(_)
                | RecordError::TableNotFound(_)
                | RecordError::MissingColumn(_)
                | RecordError::UnknownColumn(_)
                | RecordError::InvalidSchema(_)
                | RecordError::TypeMismatch { .. }
                | RecordError::RowTooLarge { .. }
                | RecordError::Deserialization(_)
                | RecordError::NotImplemented(_)
        )
    }
}

pub type RecordResult<T> = Result<T, RecordError>;
