use tracing::debug;

use super::error::{RecordError, RecordResult};
use super::heap_file::HeapFile;
use super::page::SlottedPage;
use super::row::{Handle, Row};
use super::schema::TableSchema;
use super::value::{DataType, Value};
use crate::file::DbEnv;

/// Size of the length prefix in front of TEXT values
const TEXT_LEN_SIZE: usize = 2;

/// Relation with a fixed schema stored in one heap file.
///
/// Rows are marshaled column by column in schema order: INT as 4 bytes,
/// TEXT as a 2-byte byte count followed by the bytes. There is no index;
/// `select` is a full scan.
pub struct HeapTable {
    name: String,
    schema: TableSchema,
    file: HeapFile,
}

impl HeapTable {
    /// Table handle for `name` in the given environment (nothing is opened yet)
    pub fn new(env: &DbEnv, name: &str, schema: TableSchema) -> Self {
        Self::with_file(name, schema, HeapFile::new(env, name))
    }

    /// Table handle over an explicitly supplied heap file
    pub fn with_file(name: &str, schema: TableSchema, file: HeapFile) -> Self {
        Self {
            name: name.to_string(),
            schema,
            file,
        }
    }

    /// Get table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get schema
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of blocks allocated to this table
    pub fn block_count(&self) -> u32 {
        self.file.last_block_id()
    }

    /// Create the table; fails with `TableExists` if it is already there
    pub fn create(&mut self) -> RecordResult<()> {
        self.file.create()
    }

    /// Create the table, or open it if it already exists
    pub fn create_if_not_exists(&mut self) -> RecordResult<()> {
        match self.create() {
            Err(RecordError::TableExists(_)) => self.open(),
            result => result,
        }
    }

    /// Drop the table and its storage
    pub fn drop(&mut self) -> RecordResult<()> {
        self.file.drop()
    }

    /// Open the existing table; no-op if already open
    pub fn open(&mut self) -> RecordResult<()> {
        self.file.open()
    }

    /// Close the table; no-op if already closed
    pub fn close(&mut self) -> RecordResult<()> {
        self.file.close()
    }

    /// Insert a row and return its handle. Every column in the schema
    /// must be present in `row`.
    pub fn insert(&mut self, row: &Row) -> RecordResult<Handle> {
        self.open()?;
        let full_row = self.schema.validate(row)?;
        let handle = self.append(&full_row)?;
        debug!(table = %self.name, %handle, "row inserted");
        Ok(handle)
    }

    /// Not supported: always fails and leaves the table untouched
    pub fn update(&mut self, _handle: Handle, _new_values: &Row) -> RecordResult<()> {
        Err(RecordError::NotImplemented("update"))
    }

    /// Not supported: always fails and leaves the table untouched
    pub fn del(&mut self, _handle: Handle) -> RecordResult<()> {
        Err(RecordError::NotImplemented("delete"))
    }

    /// Handles of every live row, by ascending block id then record id
    pub fn select(&mut self) -> RecordResult<Vec<Handle>> {
        self.open()?;
        let mut handles = Vec::new();
        for block_id in self.file.block_ids() {
            let page = self.file.get(block_id)?;
            handles.extend(
                page.ids()
                    .into_iter()
                    .map(|record_id| Handle::new(block_id, record_id)),
            );
        }
        Ok(handles)
    }

    /// All column values of the row at `handle`
    pub fn project(&mut self, handle: Handle) -> RecordResult<Row> {
        self.open()?;
        let page = self.file.get(handle.block_id)?;
        let data = page
            .get(handle.record_id)
            .ok_or(RecordError::NoSuchRecord(handle.block_id, handle.record_id))?;
        self.unmarshal(data)
    }

    /// The named column values of the row at `handle`, in the order asked for.
    /// An empty list projects every column.
    pub fn project_columns(&mut self, handle: Handle, column_names: &[&str]) -> RecordResult<Row> {
        let row = self.project(handle)?;
        if column_names.is_empty() {
            return Ok(row);
        }

        let mut projected = Row::with_capacity(column_names.len());
        for name in column_names {
            let value = row
                .get(name)
                .ok_or_else(|| RecordError::UnknownColumn(name.to_string()))?;
            projected.insert(*name, value.clone());
        }
        Ok(projected)
    }

    /// Every live row with its handle (select + project)
    pub fn scan(&mut self) -> RecordResult<Vec<(Handle, Row)>> {
        let handles = self.select()?;
        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            let row = self.project(handle)?;
            rows.push((handle, row));
        }
        Ok(rows)
    }

    /// Encode a full row in schema order
    pub fn marshal(&self, row: &Row) -> RecordResult<Vec<u8>> {
        let mut bytes = Vec::new();

        for col in self.schema.columns() {
            let value = row
                .get(&col.name)
                .ok_or_else(|| RecordError::MissingColumn(col.name.clone()))?;

            match (col.data_type(), value) {
                (DataType::Int, Value::Int(n)) => bytes.extend_from_slice(&n.to_ne_bytes()),
                (DataType::Text, Value::Text(s)) => {
                    let text = s.as_bytes();
                    if text.len() > u16::MAX as usize {
                        return Err(RecordError::RowTooLarge {
                            size: text.len(),
                            max: SlottedPage::MAX_RECORD_SIZE,
                        });
                    }
                    bytes.extend_from_slice(&(text.len() as u16).to_ne_bytes());
                    bytes.extend_from_slice(text);
                }
                (expected, value) => {
                    return Err(RecordError::TypeMismatch {
                        column: col.name.clone(),
                        expected: expected.to_string(),
                        actual: value.data_type().to_string(),
                    });
                }
            }
        }

        if bytes.len() > SlottedPage::MAX_RECORD_SIZE {
            return Err(RecordError::RowTooLarge {
                size: bytes.len(),
                max: SlottedPage::MAX_RECORD_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Decode a record produced by `marshal`; all bytes must be consumed
    pub fn unmarshal(&self, data: &[u8]) -> RecordResult<Row> {
        let mut row = Row::with_capacity(self.schema.column_count());
        let mut offset = 0;

        for col in self.schema.columns() {
            let value = match col.data_type() {
                DataType::Int => {
                    let raw = take(data, &mut offset, 4, &col.name)?;
                    Value::Int(i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]))
                }
                DataType::Text => {
                    let raw = take(data, &mut offset, TEXT_LEN_SIZE, &col.name)?;
                    let len = u16::from_ne_bytes([raw[0], raw[1]]) as usize;
                    let text = take(data, &mut offset, len, &col.name)?;
                    let s = String::from_utf8(text.to_vec()).map_err(|e| {
                        RecordError::Deserialization(format!(
                            "Invalid UTF-8 in column {}: {}",
                            col.name, e
                        ))
                    })?;
                    Value::Text(s)
                }
            };
            row.insert(col.name.clone(), value);
        }

        if offset != data.len() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes, got {}",
                offset,
                data.len()
            )));
        }
        Ok(row)
    }

    /// Append a marshaled full row to the last block, allocating a new
    /// block when it is full
    fn append(&mut self, row: &Row) -> RecordResult<Handle> {
        let data = self.marshal(row)?;

        let mut page = match self.file.last_block_id() {
            0 => self.file.get_new()?,
            last => self.file.get(last)?,
        };
        let record_id = match page.add(&data) {
            Ok(record_id) => record_id,
            Err(e) if e.is_no_room() => {
                debug!(table = %self.name, block_id = page.block_id(), "block full");
                page = self.file.get_new()?;
                page.add(&data)?
            }
            Err(e) => return Err(e),
        };
        self.file.put(&page)?;

        Ok(Handle::new(page.block_id(), record_id))
    }
}

/// Slice `len` bytes at `offset` and advance it
fn take<'a>(
    data: &'a [u8],
    offset: &mut usize,
    len: usize,
    column: &str,
) -> RecordResult<&'a [u8]> {
    let end = *offset + len;
    if end > data.len() {
        return Err(RecordError::Deserialization(format!(
            "Record truncated in column {}: need {} bytes, have {}",
            column,
            end,
            data.len()
        )));
    }
    let slice = &data[*offset..end];
    *offset = end;
    Ok(slice)
}
