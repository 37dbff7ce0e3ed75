//! Append-only audit trail: one row per mutating operation, independent of
//! the per-table record history. Pure observability — nothing downstream
//! of this module reads these rows back for engine behavior.

use rusqlite::{params, Connection};

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;

use crate::substrate::meta::AUDIT_TABLE;
use crate::to_storage_err;

pub fn record(
    conn: &Connection,
    table: &str,
    record_id: RecordId,
    operation: &str,
    actor: &str,
) -> DocstoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO {AUDIT_TABLE} (table_name, record_id, change_type, at) VALUES (?1, ?2, ?3, ?4)"
        ),
        params![table, record_id, format!("{operation}:{actor}"), chrono::Utc::now().to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
