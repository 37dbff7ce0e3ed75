//! Persistence for IVF cluster assignments (`_ivf_<table>`). Built and
//! consumed by `docstore-vector`; this crate only owns the rows.

use rusqlite::{params, Connection};

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;
use docstore_core::schema::TableSchema;

use crate::codec::{bytes_to_f32_vec, f32_vec_to_bytes};
use crate::substrate::ddl::ivf_centroid_table_name;
use crate::to_storage_err;

pub fn clear(conn: &Connection, schema: &TableSchema) -> DocstoreResult<()> {
    let table = ivf_centroid_table_name(&schema.name);
    conn.execute(&format!("DELETE FROM \"{table}\""), [])
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn write_member(
    conn: &Connection,
    schema: &TableSchema,
    cluster_id: i64,
    centroid: &[f32],
    record_id: RecordId,
) -> DocstoreResult<()> {
    let table = ivf_centroid_table_name(&schema.name);
    conn.execute(
        &format!(
            "INSERT INTO \"{table}\" (cluster_id, centroid, record_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(cluster_id, record_id) DO UPDATE SET centroid = excluded.centroid"
        ),
        params![cluster_id, f32_vec_to_bytes(centroid), record_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Distinct `(cluster_id, centroid)` pairs.
pub fn centroids(conn: &Connection, schema: &TableSchema) -> DocstoreResult<Vec<(i64, Vec<f32>)>> {
    let table = ivf_centroid_table_name(&schema.name);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT cluster_id, centroid FROM \"{table}\" GROUP BY cluster_id"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            let cluster_id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((cluster_id, blob))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        let (cluster_id, blob) = row.map_err(|e| to_storage_err(e.to_string()))?;
        out.push((cluster_id, bytes_to_f32_vec(&blob)));
    }
    Ok(out)
}

pub fn cluster_members(conn: &Connection, schema: &TableSchema, cluster_id: i64) -> DocstoreResult<Vec<RecordId>> {
    let table = ivf_centroid_table_name(&schema.name);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT record_id FROM \"{table}\" WHERE cluster_id = ?1"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![cluster_id], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))?);
    }
    Ok(out)
}
