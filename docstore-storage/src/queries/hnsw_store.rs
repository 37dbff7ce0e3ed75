//! Persistence for the HNSW graph (`_hnsw_<table>` edges, `_hnsw_nodes_<table>`
//! per-node top layer). Built and consumed by `docstore-vector`.

use rusqlite::{params, Connection};

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;
use docstore_core::schema::TableSchema;

use crate::substrate::ddl::{hnsw_graph_table_name, hnsw_node_table_name};
use crate::to_storage_err;

pub fn clear(conn: &Connection, schema: &TableSchema) -> DocstoreResult<()> {
    let edges = hnsw_graph_table_name(&schema.name);
    let nodes = hnsw_node_table_name(&schema.name);
    conn.execute(&format!("DELETE FROM \"{edges}\""), [])
        .map_err(|e| to_storage_err(e.to_string()))?;
    conn.execute(&format!("DELETE FROM \"{nodes}\""), [])
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn write_node(conn: &Connection, schema: &TableSchema, record_id: RecordId, top_layer: i64) -> DocstoreResult<()> {
    let nodes = hnsw_node_table_name(&schema.name);
    conn.execute(
        &format!(
            "INSERT INTO \"{nodes}\" (record_id, top_layer) VALUES (?1, ?2)
             ON CONFLICT(record_id) DO UPDATE SET top_layer = excluded.top_layer"
        ),
        params![record_id, top_layer],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn write_edge(
    conn: &Connection,
    schema: &TableSchema,
    record_id: RecordId,
    layer: i64,
    neighbor_id: RecordId,
) -> DocstoreResult<()> {
    let edges = hnsw_graph_table_name(&schema.name);
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO \"{edges}\" (record_id, layer, neighbor_id) VALUES (?1, ?2, ?3)"
        ),
        params![record_id, layer, neighbor_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn clear_edges_for(conn: &Connection, schema: &TableSchema, record_id: RecordId, layer: i64) -> DocstoreResult<()> {
    let edges = hnsw_graph_table_name(&schema.name);
    conn.execute(
        &format!("DELETE FROM \"{edges}\" WHERE record_id = ?1 AND layer = ?2"),
        params![record_id, layer],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn neighbors(conn: &Connection, schema: &TableSchema, record_id: RecordId, layer: i64) -> DocstoreResult<Vec<RecordId>> {
    let edges = hnsw_graph_table_name(&schema.name);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT neighbor_id FROM \"{edges}\" WHERE record_id = ?1 AND layer = ?2"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![record_id, layer], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))?);
    }
    Ok(out)
}

pub fn entry_point(conn: &Connection, schema: &TableSchema) -> DocstoreResult<Option<(RecordId, i64)>> {
    use rusqlite::OptionalExtension;
    let nodes = hnsw_node_table_name(&schema.name);
    conn.query_row(
        &format!(
            "SELECT record_id, top_layer FROM \"{nodes}\" ORDER BY top_layer DESC, record_id ASC LIMIT 1"
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn all_node_ids(conn: &Connection, schema: &TableSchema) -> DocstoreResult<Vec<RecordId>> {
    let nodes = hnsw_node_table_name(&schema.name);
    let mut stmt = conn
        .prepare(&format!("SELECT record_id FROM \"{nodes}\" ORDER BY record_id ASC"))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_storage_err(e.to_string()))?);
    }
    Ok(out)
}
