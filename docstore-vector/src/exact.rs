//! Brute-force scan. The fallback path for small tables and the ground
//! truth `docstore-vector`'s tests check IVF/HNSW recall against.

use docstore_core::errors::DocstoreResult;
use docstore_core::record::RecordId;
use docstore_core::schema::TableSchema;
use docstore_storage::queries::vector_store;
use docstore_storage::StorageEngine;

use crate::distance;

pub fn search(
    engine: &StorageEngine,
    schema: &TableSchema,
    query: &[f32],
    k: usize,
) -> DocstoreResult<Vec<(RecordId, f64)>> {
    let metric = schema
        .vector
        .as_ref()
        .map(|v| v.metric)
        .unwrap_or_default();

    let rows = engine.with_reader(|conn| vector_store::scan_all(conn, schema))?;

    let mut scored: Vec<(RecordId, f64)> = rows
        .iter()
        .map(|(id, embedding)| (*id, distance::score(metric, query, embedding)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(k);
    Ok(scored)
}
