//! Maintenance of the `_ii_<table>` posting-list table that backs lexical
//! search (the lexical crate reads it; this crate is the only writer).

use rusqlite::{params, Connection};

use docstore_core::errors::DocstoreResult;
use docstore_core::record::{Record, RecordId};
use docstore_core::schema::TableSchema;
use docstore_core::tokenize::term_frequencies;

use crate::substrate::ddl::posting_table_name;
use crate::to_storage_err;

/// Tokenize every searchable field of `record` and (re)write its postings.
/// Callers must have already removed any previous postings for `id`
/// (via [`remove`]) when this is an update, not a fresh insert.
pub fn write(
    conn: &Connection,
    schema: &TableSchema,
    id: RecordId,
    record: &Record,
) -> DocstoreResult<()> {
    let searchable = schema.effective_searchable_fields();
    if searchable.is_empty() {
        return Ok(());
    }
    let table = posting_table_name(&schema.name);
    let mut stmt = conn
        .prepare_cached(&format!(
            "INSERT INTO \"{table}\" (term, record_id, field, term_frequency)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(term, record_id, field) DO UPDATE SET term_frequency = excluded.term_frequency"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    for field in &searchable {
        let Some(text) = record.get(field).and_then(|v| v.as_str()) else {
            continue;
        };
        for (term, freq) in term_frequencies(text) {
            stmt.execute(params![term, id, field, freq])
                .map_err(|e| to_storage_err(e.to_string()))?;
        }
    }
    Ok(())
}

/// Remove every posting for `id`, across all searchable fields.
pub fn remove(conn: &Connection, schema: &TableSchema, id: RecordId) -> DocstoreResult<()> {
    if schema.effective_searchable_fields().is_empty() {
        return Ok(());
    }
    let table = posting_table_name(&schema.name);
    conn.execute(
        &format!("DELETE FROM \"{table}\" WHERE record_id = ?1"),
        params![id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
