//! Schema-version-driven migration runner.
//!
//! `defineSchema` can be called more than once as a schema evolves.
//! Each call materializes any tables/indexes the stored schema
//! doesn't already have and bumps the version in `_meta_schema`. Existing
//! tables are never dropped or altered in place here: widening a schema
//! (new optional column, new index) is additive DDL; narrowing it is left
//! to the caller — migrations only ever move forward.

use rusqlite::{params, Connection, OptionalExtension};

use docstore_core::errors::{DocstoreError, StorageError};
use docstore_core::errors::DocstoreResult;
use docstore_core::schema::Schema;

use crate::substrate::meta::{ensure_meta_tables, SCHEMA_TABLE};
use crate::substrate::{ddl, meta};
use crate::to_storage_err;

/// Apply `schema` to `conn`, creating any missing tables/indexes and
/// recording the new schema version and descriptor. Returns the version
/// that was stored *before* this call (`None` for a fresh database), so
/// callers can tell which registered migration steps, if any, actually
/// need to run.
pub fn run(conn: &Connection, schema: &Schema) -> DocstoreResult<Option<u32>> {
    ensure_meta_tables(conn)?;

    let stored_version: Option<u32> = conn
        .query_row(
            &format!("SELECT version FROM {SCHEMA_TABLE} WHERE id = 0"),
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    if let Some(stored) = stored_version {
        if stored > schema.version {
            return Err(DocstoreError::Storage(StorageError::MigrationFailed {
                version: schema.version,
                reason: format!(
                    "stored schema version {stored} is newer than requested version {}",
                    schema.version
                ),
            }));
        }
    }

    for table in schema.tables.values() {
        let table_ddl = ddl::build(table)?;
        for statement in &table_ddl.statements {
            conn.execute_batch(statement)
                .map_err(|e| to_storage_err(format!("migration failed for table {}: {e}", table.name)))?;
        }
        conn.execute(
            &format!(
                "INSERT INTO {} (table_name, record_count, total_bytes) VALUES (?1, 0, 0)
                 ON CONFLICT(table_name) DO NOTHING",
                meta::STATS_TABLE
            ),
            params![table.name],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    }

    let descriptor = serde_json::to_string(schema)
        .map_err(|e| to_storage_err(format!("schema serialization failed: {e}")))?;

    conn.execute(
        &format!(
            "INSERT INTO {SCHEMA_TABLE} (id, version, descriptor) VALUES (0, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version, descriptor = excluded.descriptor"
        ),
        params![schema.version, descriptor],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    Ok(stored_version)
}

/// Load the last-persisted schema, if any database state exists yet.
pub fn load_schema(conn: &Connection) -> DocstoreResult<Option<Schema>> {
    ensure_meta_tables(conn)?;
    let descriptor: Option<String> = conn
        .query_row(
            &format!("SELECT descriptor FROM {SCHEMA_TABLE} WHERE id = 0"),
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    descriptor
        .map(|d| {
            serde_json::from_str(&d)
                .map_err(|e| to_storage_err(format!("stored schema is corrupt: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::column::ColumnType;
    use docstore_core::schema::{ColumnDef, TableSchema};
    use rusqlite::Connection;

    #[test]
    fn run_creates_tables_and_persists_descriptor() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = Schema::new().table(
            TableSchema::new("messages").column(ColumnDef::new("body", ColumnType::String)),
        );
        run(&conn, &schema).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='messages'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        let loaded = load_schema(&conn).unwrap().unwrap();
        assert_eq!(loaded.table_names(), vec!["messages".to_string()]);
    }

    #[test]
    fn run_rejects_stale_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        let mut schema = Schema::new().table(TableSchema::new("messages"));
        schema.version = 5;
        run(&conn, &schema).unwrap();

        let mut stale = Schema::new().table(TableSchema::new("messages"));
        stale.version = 1;
        assert!(run(&conn, &stale).is_err());
    }
}
