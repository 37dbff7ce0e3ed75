//! Maintenance of the `_vec_<table>` embedding table. IVF/HNSW auxiliary
//! tables are built and consumed entirely by `docstore-vector`; this crate
//! only owns the raw embedding-per-record store.

use rusqlite::{params, Connection, OptionalExtension};

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;
use docstore_core::schema::TableSchema;

use crate::codec::{bytes_to_f32_vec, f32_vec_to_bytes};
use crate::substrate::ddl::vector_table_name;
use crate::to_storage_err;

pub fn write(conn: &Connection, schema: &TableSchema, id: RecordId, embedding: &[f32]) -> DocstoreResult<()> {
    if schema.vector.is_none() {
        return Ok(());
    }
    let table = vector_table_name(&schema.name);
    conn.execute(
        &format!(
            "INSERT INTO \"{table}\" (record_id, embedding) VALUES (?1, ?2)
             ON CONFLICT(record_id) DO UPDATE SET embedding = excluded.embedding"
        ),
        params![id, f32_vec_to_bytes(embedding)],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn read(conn: &Connection, schema: &TableSchema, id: RecordId) -> DocstoreResult<Option<Vec<f32>>> {
    if schema.vector.is_none() {
        return Ok(None);
    }
    let table = vector_table_name(&schema.name);
    let blob: Option<Vec<u8>> = conn
        .query_row(
            &format!("SELECT embedding FROM \"{table}\" WHERE record_id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(blob.map(|b| bytes_to_f32_vec(&b)))
}

pub fn remove(conn: &Connection, schema: &TableSchema, id: RecordId) -> DocstoreResult<()> {
    if schema.vector.is_none() {
        return Ok(());
    }
    let table = vector_table_name(&schema.name);
    conn.execute(
        &format!("DELETE FROM \"{table}\" WHERE record_id = ?1"),
        params![id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// All `(record_id, embedding)` pairs, the substrate an index build scans.
pub fn scan_all(conn: &Connection, schema: &TableSchema) -> DocstoreResult<Vec<(RecordId, Vec<f32>)>> {
    if schema.vector.is_none() {
        return Ok(Vec::new());
    }
    let table = vector_table_name(&schema.name);
    let mut stmt = conn
        .prepare(&format!("SELECT record_id, embedding FROM \"{table}\" ORDER BY record_id ASC"))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            let id: RecordId = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        let (id, blob) = row.map_err(|e| to_storage_err(e.to_string()))?;
        out.push((id, bytes_to_f32_vec(&blob)));
    }
    Ok(out)
}
