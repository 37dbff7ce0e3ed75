use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::column::ColumnType;
use crate::traits::Validator;

/// Distance metric used by a table's vector column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

/// Declaration of a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    /// Whether the column accepts `Value::Null` / a missing field.
    #[serde(default)]
    pub optional: bool,
    /// Fixed dimension `D`, required and only meaningful for `ColumnType::Vector`.
    #[serde(default)]
    pub dimension: Option<usize>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            optional: false,
            dimension: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = Some(dim);
        self
    }
}

/// The vector-column configuration for a table, if one is declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorColumnSpec {
    pub column: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Field that feeds the embedder when a record doesn't carry a
    /// precomputed vector directly (e.g. a `text` field embedded on write).
    pub source_field: Option<String>,
}

/// Full declaration of one table: columns, primary key, secondary indexes,
/// searchable (tokenized) fields, and an optional vector column.
///
/// Serializable (minus the validator, matching the meta store's
/// invariant: "schema descriptor per table (serializable — validator
/// functions excluded)").
#[derive(Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default = "default_pk")]
    pub primary_key: String,
    #[serde(default)]
    pub secondary_indexes: Vec<String>,
    /// Explicit searchable fields; empty means "all string columns".
    #[serde(default)]
    pub searchable_fields: Vec<String>,
    #[serde(default)]
    pub vector: Option<VectorColumnSpec>,
    #[serde(skip)]
    pub validator: Option<Arc<dyn Validator>>,
}

fn default_pk() -> String {
    crate::constants::DEFAULT_PK_COLUMN.to_string()
}

impl std::fmt::Debug for TableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSchema")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("primary_key", &self.primary_key)
            .field("secondary_indexes", &self.secondary_indexes)
            .field("searchable_fields", &self.searchable_fields)
            .field("vector", &self.vector)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: default_pk(),
            secondary_indexes: Vec::new(),
            searchable_fields: Vec::new(),
            vector: None,
            validator: None,
        }
    }

    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.secondary_indexes.push(field.into());
        self
    }

    pub fn searchable(mut self, field: impl Into<String>) -> Self {
        self.searchable_fields.push(field.into());
        self
    }

    pub fn vector_column(mut self, spec: VectorColumnSpec) -> Self {
        self.vector = Some(spec);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn column_def(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.secondary_indexes.iter().any(|f| f == field)
    }

    /// Effective set of searchable fields: explicit list, or every string
    /// column when the table doesn't name any.
    pub fn effective_searchable_fields(&self) -> Vec<String> {
        if !self.searchable_fields.is_empty() {
            return self.searchable_fields.clone();
        }
        self.columns
            .iter()
            .filter(|c| c.column_type == ColumnType::String)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// The full schema: every table definition, keyed by table name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Schema {
    pub tables: BTreeMap<String, TableSchema>,
    /// Monotonically increasing schema version, bumped by `defineSchema`.
    #[serde(default)]
    pub version: u32,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}
