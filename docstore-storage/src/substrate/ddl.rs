//! Schema -> SQL. One record table per `TableSchema`, an `_ii_<table>`
//! posting-list table per searchable field set, and a `_vec_<table>` table
//! when the schema declares a vector column.

use docstore_core::column::ColumnType;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::schema::TableSchema;

/// Every statement needed to materialize one table and its auxiliary
/// structures, in execution order.
pub struct TableDdl {
    pub statements: Vec<String>,
}

/// Identifiers here come from schema authors, not request bodies, but we
/// still refuse to interpolate anything that isn't a plain identifier.
pub fn quote_ident(name: &str) -> DocstoreResult<String> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.chars().next().unwrap().is_ascii_digit()
    {
        return Err(DocstoreError::Validation {
            field: "name".into(),
            message: format!("'{name}' is not a valid identifier"),
        });
    }
    Ok(format!("\"{name}\""))
}

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::String => "TEXT",
        ColumnType::Number => "REAL",
        ColumnType::Boolean => "INTEGER",
        ColumnType::Date => "TEXT",
        ColumnType::Json => "TEXT",
        ColumnType::Vector => "BLOB",
    }
}

pub fn posting_table_name(table: &str) -> String {
    format!("_ii_{table}")
}

pub fn vector_table_name(table: &str) -> String {
    format!("_vec_{table}")
}

pub fn ivf_centroid_table_name(table: &str) -> String {
    format!("_ivf_{table}")
}

pub fn hnsw_graph_table_name(table: &str) -> String {
    format!("_hnsw_{table}")
}

pub fn hnsw_node_table_name(table: &str) -> String {
    format!("_hnsw_nodes_{table}")
}

/// Build the full set of `CREATE TABLE`/`CREATE INDEX` statements for one
/// user table.
pub fn build(schema: &TableSchema) -> DocstoreResult<TableDdl> {
    let table_ident = quote_ident(&schema.name)?;
    let pk_ident = quote_ident(&schema.primary_key)?;

    let mut cols = vec![format!("{pk_ident} INTEGER PRIMARY KEY AUTOINCREMENT")];
    for col in &schema.columns {
        if col.name == schema.primary_key || col.column_type == ColumnType::Vector {
            // Vector columns live only in `_vec_<table>`, keyed by record_id,
            // so the main row stays fixed-width regardless of embedding size.
            continue;
        }
        let ident = quote_ident(&col.name)?;
        let ty = sql_type(col.column_type);
        let nullability = if col.optional { "" } else { " NOT NULL" };
        cols.push(format!("{ident} {ty}{nullability}"));
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {table_ident} ({});",
        cols.join(", ")
    )];

    for field in &schema.secondary_indexes {
        let field_ident = quote_ident(field)?;
        let idx_name = quote_ident(&format!("idx_{}_{}", schema.name, field))?;
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {idx_name} ON {table_ident} ({field_ident});"
        ));
    }

    if !schema.effective_searchable_fields().is_empty() {
        let ii_ident = quote_ident(&posting_table_name(&schema.name))?;
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {ii_ident} (
                term TEXT NOT NULL,
                record_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                term_frequency INTEGER NOT NULL,
                PRIMARY KEY (term, record_id, field)
            );"
        ));
        let ii_term_idx = quote_ident(&format!("idx_{}_ii_term", schema.name))?;
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {ii_term_idx} ON {ii_ident} (term);"
        ));
        let ii_record_idx = quote_ident(&format!("idx_{}_ii_record", schema.name))?;
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {ii_record_idx} ON {ii_ident} (record_id);"
        ));
    }

    if let Some(vector) = &schema.vector {
        let vec_ident = quote_ident(&vector_table_name(&schema.name))?;
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {vec_ident} (
                record_id INTEGER PRIMARY KEY,
                embedding BLOB NOT NULL
            );"
        ));

        let ivf_ident = quote_ident(&ivf_centroid_table_name(&schema.name))?;
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {ivf_ident} (
                cluster_id INTEGER NOT NULL,
                centroid BLOB NOT NULL,
                record_id INTEGER NOT NULL,
                PRIMARY KEY (cluster_id, record_id)
            );"
        ));

        let hnsw_ident = quote_ident(&hnsw_graph_table_name(&schema.name))?;
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {hnsw_ident} (
                record_id INTEGER NOT NULL,
                layer INTEGER NOT NULL,
                neighbor_id INTEGER NOT NULL,
                PRIMARY KEY (record_id, layer, neighbor_id)
            );"
        ));

        let hnsw_nodes_ident = quote_ident(&hnsw_node_table_name(&schema.name))?;
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {hnsw_nodes_ident} (
                record_id INTEGER PRIMARY KEY,
                top_layer INTEGER NOT NULL
            );"
        ));
    }

    Ok(TableDdl { statements })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::schema::ColumnDef;

    #[test]
    fn rejects_identifiers_with_illegal_characters() {
        assert!(quote_ident("valid_name").is_ok());
        assert!(quote_ident("1bad").is_err());
        assert!(quote_ident("bad;drop table").is_err());
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn builds_posting_table_for_searchable_schema() {
        let schema = TableSchema::new("messages")
            .column(ColumnDef::new("body", ColumnType::String))
            .searchable("body");
        let ddl = build(&schema).unwrap();
        assert!(ddl
            .statements
            .iter()
            .any(|s| s.contains("_ii_messages")));
    }

    #[test]
    fn skips_vector_tables_when_schema_has_no_vector_column() {
        let schema = TableSchema::new("messages").column(ColumnDef::new("body", ColumnType::String));
        let ddl = build(&schema).unwrap();
        assert!(!ddl.statements.iter().any(|s| s.contains("_vec_")));
    }
}
