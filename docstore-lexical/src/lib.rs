//! Lexical (TF-IDF) search over the posting lists `docstore-storage`
//! maintains on every write.
//!
//! This crate never writes: the posting table is owned and kept consistent
//! by `docstore-storage::queries::posting_list`. Search here is read-only
//! SQL plus scoring.

pub mod scoring;

use std::collections::BTreeMap;

use rusqlite::params;

use docstore_core::constants::SEARCH_FETCH_BATCH_SIZE;
use docstore_core::errors::DocstoreResult;
use docstore_core::query::SearchOptions;
use docstore_core::record::{RecordId, StoredRecord};
use docstore_core::tokenize::tokenize;
use docstore_core::traits::RecordStore;
use docstore_storage::substrate::ddl::posting_table_name;
use docstore_storage::StorageEngine;

#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: StoredRecord,
    pub score: f64,
}

/// Full-text search over every searchable field of `table`: tokenize the
/// query, sum each unique term's idf contribution per matching document,
/// rank by descending score with ascending-id tie-break, then apply
/// `equality`/`time_range` post-filters.
pub fn search(
    engine: &StorageEngine,
    table: &str,
    query_text: &str,
    opts: &SearchOptions,
) -> DocstoreResult<Vec<ScoredRecord>> {
    let schema = engine.schema_for(table)?;
    let terms: Vec<String> = {
        let mut t = tokenize(query_text);
        t.sort();
        t.dedup();
        t
    };
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let total_docs = engine.count(table)?;
    let posting_table = posting_table_name(&schema.name);

    let mut scores: BTreeMap<RecordId, f64> = BTreeMap::new();
    for term in &terms {
        // Distinct record ids only: a term contributes its idf once per
        // document no matter how many times it occurs there, so scoring is
        // a sum of per-token idf contributions, not idf * in-doc frequency.
        let ids: Vec<RecordId> = engine.with_reader(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT DISTINCT record_id FROM \"{posting_table}\" WHERE term = ?1"
                ))
                .map_err(|e| docstore_storage::to_storage_err(e.to_string()))?;
            let mapped = stmt
                .query_map(params![term], |row| row.get(0))
                .map_err(|e| docstore_storage::to_storage_err(e.to_string()))?;
            let mut out = Vec::new();
            for row in mapped {
                out.push(row.map_err(|e| docstore_storage::to_storage_err(e.to_string()))?);
            }
            Ok(out)
        })?;

        if ids.is_empty() {
            continue;
        }
        let doc_frequency = ids.len();
        let weight = scoring::idf(total_docs, doc_frequency);
        for record_id in ids {
            *scores.entry(record_id).or_insert(0.0) += weight;
        }
    }

    let mut ranked: Vec<(RecordId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut results = Vec::new();
    for chunk in ranked.chunks(SEARCH_FETCH_BATCH_SIZE) {
        for (record_id, score) in chunk {
            let Some(record) = engine.get(table, *record_id)? else {
                continue;
            };
            if !passes_filters(&record, opts) {
                continue;
            }
            results.push(ScoredRecord { record, score: *score });
            if let Some(limit) = opts.limit {
                if results.len() >= limit {
                    return Ok(results);
                }
            }
        }
    }
    Ok(results)
}

fn passes_filters(record: &StoredRecord, opts: &SearchOptions) -> bool {
    for (field, expected) in &opts.equality {
        if record.fields.get(field) != Some(expected) {
            return false;
        }
    }
    if let Some(range) = &opts.time_range {
        let Some(ts) = record.fields.get("timestamp").and_then(|v| v.as_date()) else {
            return false;
        };
        if ts < range.from || ts > range.to {
            return false;
        }
    }
    true
}
