use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::record::{ColumnDef, DataType, RecordError, TableSchema};

/// File name of the catalog inside the data directory
pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Unknown column type {1} for column {0}")]
    UnknownType(String, String),

    #[error("Invalid schema: {0}")]
    Schema(#[from] RecordError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String, // Store as string for JSON: "INT", "TEXT"
}

impl ColumnMetadata {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            column_type: data_type.name().to_string(),
        }
    }

    pub fn to_data_type(&self) -> CatalogResult<DataType> {
        DataType::parse(&self.column_type)
            .ok_or_else(|| CatalogError::UnknownType(self.name.clone(), self.column_type.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn from_schema(name: &str, schema: &TableSchema) -> Self {
        Self {
            name: name.to_string(),
            columns: schema
                .columns()
                .iter()
                .map(|c| ColumnMetadata::new(&c.name, c.data_type()))
                .collect(),
        }
    }

    pub fn to_schema(&self) -> CatalogResult<TableSchema> {
        let columns = self
            .columns
            .iter()
            .map(|c| -> CatalogResult<ColumnDef> {
                Ok(ColumnDef::new(c.name.clone(), c.to_data_type()?))
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        Ok(TableSchema::new(columns)?)
    }
}

/// Schemas of every table in a data directory, persisted as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: BTreeMap<String, TableMetadata>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(data_dir: &Path) -> CatalogResult<Self> {
        let catalog_path = data_dir.join(CATALOG_FILE);
        let content = fs::read_to_string(&catalog_path)?;
        let catalog = serde_json::from_str(&content)?;
        Ok(catalog)
    }

    /// Load the catalog, or start an empty one if none was saved yet
    pub fn load_or_default(data_dir: &Path) -> CatalogResult<Self> {
        if data_dir.join(CATALOG_FILE).exists() {
            Self::load(data_dir)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, data_dir: &Path) -> CatalogResult<()> {
        let catalog_path = data_dir.join(CATALOG_FILE);
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(&catalog_path, content)?;
        Ok(())
    }

    pub fn add_table(&mut self, metadata: TableMetadata) -> CatalogResult<()> {
        if self.tables.contains_key(&metadata.name) {
            return Err(CatalogError::TableExists(metadata.name));
        }
        self.tables.insert(metadata.name.clone(), metadata);
        Ok(())
    }

    pub fn remove_table(&mut self, name: &str) -> CatalogResult<TableMetadata> {
        self.tables
            .remove(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn get_table(&self, name: &str) -> CatalogResult<&TableMetadata> {
        self.tables
            .get(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Table names in sorted order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::new("id", DataType::Int),
            ColumnDef::new("name", DataType::Text),
        ])
        .unwrap()
    }

    #[test]
    fn test_schema_conversion() {
        let schema = sample_schema();
        let metadata = TableMetadata::from_schema("people", &schema);

        assert_eq!(metadata.columns[0].column_type, "INT");
        assert_eq!(metadata.columns[1].column_type, "TEXT");
        assert_eq!(metadata.to_schema().unwrap(), schema);
    }

    #[test]
    fn test_unknown_column_type() {
        let metadata = TableMetadata {
            name: "t".to_string(),
            columns: vec![ColumnMetadata {
                name: "x".to_string(),
                column_type: "BLOB".to_string(),
            }],
        };
        assert!(matches!(
            metadata.to_schema(),
            Err(CatalogError::UnknownType(..))
        ));
    }

    #[test]
    fn test_add_get_remove() {
        let mut catalog = Catalog::new();
        catalog
            .add_table(TableMetadata::from_schema("people", &sample_schema()))
            .unwrap();

        assert!(catalog.get_table("people").is_ok());
        assert!(matches!(
            catalog.add_table(TableMetadata::from_schema("people", &sample_schema())),
            Err(CatalogError::TableExists(_))
        ));

        catalog.remove_table("people").unwrap();
        assert!(matches!(
            catalog.get_table("people"),
            Err(CatalogError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::load_or_default(temp_dir.path()).unwrap();
        assert_eq!(catalog.table_names().count(), 0);

        catalog
            .add_table(TableMetadata::from_schema("b_table", &sample_schema()))
            .unwrap();
        catalog
            .add_table(TableMetadata::from_schema("a_table", &sample_schema()))
            .unwrap();
        catalog.save(temp_dir.path()).unwrap();

        let loaded = Catalog::load(temp_dir.path()).unwrap();
        assert_eq!(
            loaded.table_names().collect::<Vec<_>>(),
            vec!["a_table", "b_table"]
        );
        assert_eq!(
            loaded.get_table("a_table").unwrap().to_schema().unwrap(),
            sample_schema()
        );
    }
}
