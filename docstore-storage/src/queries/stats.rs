//! `_meta_stats` bookkeeping: per-table record count and approximate byte
//! size, refreshed on every mutation rather than computed on demand so
//! `getStats` stays O(1).

use rusqlite::{params, Connection, OptionalExtension};

use docstore_core::errors::DocstoreResult;

use crate::substrate::meta::STATS_TABLE;
use crate::to_storage_err;

pub fn bump(conn: &Connection, table: &str, record_delta: i64, byte_delta: i64) -> DocstoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO {STATS_TABLE} (table_name, record_count, total_bytes) VALUES (?1, ?2, ?3)
             ON CONFLICT(table_name) DO UPDATE SET
                record_count = record_count + ?2,
                total_bytes = max(total_bytes + ?3, 0)"
        ),
        params![table, record_delta, byte_delta],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn record_count(conn: &Connection, table: &str) -> DocstoreResult<usize> {
    let count: Option<i64> = conn
        .query_row(
            &format!("SELECT record_count FROM {STATS_TABLE} WHERE table_name = ?1"),
            params![table],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count.unwrap_or(0).max(0) as usize)
}

pub fn total_bytes(conn: &Connection, table: &str) -> DocstoreResult<u64> {
    let bytes: Option<i64> = conn
        .query_row(
            &format!("SELECT total_bytes FROM {STATS_TABLE} WHERE table_name = ?1"),
            params![table],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(bytes.unwrap_or(0).max(0) as u64)
}

pub fn reset(conn: &Connection, table: &str) -> DocstoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO {STATS_TABLE} (table_name, record_count, total_bytes) VALUES (?1, 0, 0)
             ON CONFLICT(table_name) DO UPDATE SET record_count = 0, total_bytes = 0"
        ),
        params![table],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
