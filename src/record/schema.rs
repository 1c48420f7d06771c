use super::error::{RecordError, RecordResult};
use super::row::Row;
use super::value::{ColumnAttribute, DataType};

/// Column definition with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub attribute: ColumnAttribute,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            attribute: ColumnAttribute::new(data_type),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.attribute.data_type()
    }
}

/// Fixed, ordered list of a table's columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Create a schema; column names must be non-empty and unique
    pub fn new(columns: Vec<ColumnDef>) -> RecordResult<Self> {
        if columns.is_empty() {
            return Err(RecordError::InvalidSchema(
                "a table needs at least one column".to_string(),
            ));
        }
        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(RecordError::InvalidSchema(format!(
                    "column {} has an empty name",
                    i
                )));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(RecordError::InvalidSchema(format!(
                    "duplicate column '{}'",
                    col.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Build a schema from parallel name and attribute lists
    pub fn from_parts(names: &[&str], attributes: &[ColumnAttribute]) -> RecordResult<Self> {
        if names.len() != attributes.len() {
            return Err(RecordError::InvalidSchema(format!(
                "{} column names but {} column attributes",
                names.len(),
                attributes.len()
            )));
        }
        Self::new(
            names
                .iter()
                .zip(attributes)
                .map(|(name, attr)| ColumnDef::new(*name, attr.data_type()))
                .collect(),
        )
    }

    /// Get all columns
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Get column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in schema order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Find column index by name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Check a caller-supplied row and return the full row in schema order.
    /// Every declared column must be present; extra keys are ignored.
    pub fn validate(&self, row: &Row) -> RecordResult<Row> {
        let mut full_row = Row::with_capacity(self.columns.len());
        for col in &self.columns {
            let value = row
                .get(&col.name)
                .ok_or_else(|| RecordError::MissingColumn(col.name.clone()))?;
            full_row.insert(col.name.clone(), value.clone());
        }
        Ok(full_row)
    }
}
