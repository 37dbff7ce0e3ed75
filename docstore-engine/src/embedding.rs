//! Embed-on-write: if a table declares a vector column with a source text
//! field and an embedder is registered, a plain record write carrying text
//! in that field gets a vector attached before it reaches the substrate.

use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::record::{Record, Value};
use docstore_core::schema::TableSchema;

use crate::Engine;

/// Fill in `schema.vector`'s column from its source field, unless the
/// caller already supplied a vector directly (explicit wins) or no
/// embedder is registered for the table.
pub(crate) fn embed_for_write(engine: &Engine, table: &str, schema: &TableSchema, record: &mut Record) -> DocstoreResult<()> {
    let Some(vector) = &schema.vector else {
        return Ok(());
    };
    if record.contains_key(&vector.column) {
        return Ok(());
    }
    let Some(source_field) = &vector.source_field else {
        return Ok(());
    };
    let Some(text) = record.get(source_field).and_then(|v| v.as_str()).map(str::to_string) else {
        return Ok(());
    };
    let Some(embedder) = engine.0.embedders.get(table).map(|e| e.clone()) else {
        return Ok(());
    };

    let embedded = engine.0.embedder_cache.get_or_embed(table, &text, embedder.as_ref())?;
    engine.0.metrics.record_cache_probe(true);
    if embedded.len() != vector.dimension {
        return Err(DocstoreError::DimensionMismatch {
            expected: vector.dimension,
            actual: embedded.len(),
        });
    }
    record.insert(vector.column.clone(), Value::Vector((*embedded).clone()));
    Ok(())
}
