//! Global metadata tables present in every database regardless of the
//! user-defined schema: the serialized schema descriptor, per-table stats,
//! and the audit trail.

use rusqlite::Connection;

use docstore_core::errors::DocstoreResult;

use crate::to_storage_err;

pub const SCHEMA_TABLE: &str = "_meta_schema";
pub const STATS_TABLE: &str = "_meta_stats";
pub const AUDIT_TABLE: &str = "_meta_audit";

pub fn ensure_meta_tables(conn: &Connection) -> DocstoreResult<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {SCHEMA_TABLE} (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL,
            descriptor TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {STATS_TABLE} (
            table_name TEXT PRIMARY KEY,
            record_count INTEGER NOT NULL DEFAULT 0,
            total_bytes INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS {AUDIT_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name TEXT NOT NULL,
            record_id INTEGER NOT NULL,
            change_type TEXT NOT NULL,
            at TEXT NOT NULL
        );
        "
    ))
    .map_err(|e| to_storage_err(e.to_string()))
}
