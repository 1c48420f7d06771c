mod error;
mod heap_file;
mod heap_table;
mod page;
mod row;
mod schema;
mod value;


pub use error::{RecordError, RecordResult};
pub use heap_file::HeapFile;
pub use heap_table::HeapTable;
pub use page::SlottedPage;
pub use row::{Handle, RecordId, Row};
pub use schema::{ColumnDef, TableSchema};
pub use value::{ColumnAttribute, DataType, Value};
