pub mod catalog;
pub mod config;
pub mod file;
pub mod record;

pub use catalog::{Catalog, CatalogError, CatalogResult, TableMetadata};
pub use config::{ConfigError, EnvConfig};
pub use file::{BLOCK_SZ, BlockId, BlockStore, DbEnv, FileBlockStore, StoreError, StoreResult};
pub use record::{
    ColumnAttribute, ColumnDef, DataType, Handle, HeapFile, HeapTable, RecordError, RecordId,
    RecordResult, Row, SlottedPage, TableSchema, Value,
};
