//! Query planning: the access path a `find`/`findPage` would use (surfaced
//! for metrics, since `docstore-storage` delegates the actual scan to
//! SQLite's own planner over the indexes `docstore-storage::substrate::ddl`
//! creates), plus fusion of lexical and vector result streams into a single
//! hybrid ranking.
//!
//! Fusion here combines ranked lists from two retrieval methods without
//! requiring cross-method score normalization: a simple max of two
//! already-comparable scores rather than reciprocal-rank smoothing, since
//! lexical and vector scores are each already a single scalar per
//! candidate, not independent rank orders.

use std::collections::BTreeMap;

use docstore_core::errors::DocstoreResult;
use docstore_core::query::{Direction, FindOptions};
use docstore_core::record::{RecordId, StoredRecord};
use docstore_core::schema::TableSchema;
use docstore_core::traits::RecordStore;
use docstore_storage::StorageEngine;
use docstore_lexical::ScoredRecord;

/// Which access path `find`/`findPage` would take for a given table and
/// set of options. Descriptive only: SQLite's own query planner makes the
/// real decision once the index exists, but callers (and `getMetrics`) can
/// use this to understand which path was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPath {
    /// `orderBy` names an indexed field: traverse that index's cursor.
    OrderedIndex { field: String },
    /// A `where` predicate on an indexed field: open that index with a
    /// derived key range.
    IndexRange { field: String },
    /// No usable index: full table scan, filtered/sorted in memory.
    FullScan,
}

/// Choose the access path `opts` would take against `schema`, following the
/// same precedence `find` uses: ordered index, then predicate index, then
/// full scan.
pub fn choose_access_path(schema: &TableSchema, opts: &FindOptions) -> AccessPath {
    if let Some(order) = &opts.order_by {
        if order.field == schema.primary_key || schema.is_indexed(&order.field) {
            return AccessPath::OrderedIndex { field: order.field.clone() };
        }
    }
    for (field, _) in &opts.where_ {
        if field == &schema.primary_key || schema.is_indexed(field) {
            return AccessPath::IndexRange { field: field.clone() };
        }
    }
    AccessPath::FullScan
}

/// One candidate in a fused hybrid result set, with its source scores kept
/// for callers that want to inspect provenance.
#[derive(Debug, Clone)]
pub struct HybridResult {
    pub record: StoredRecord,
    pub score: f64,
    pub lexical_score: Option<f64>,
    pub vector_score: Option<f64>,
}

/// Merge a lexical result set and a vector result set by `(id, max(score))`,
/// hydrating any vector-only ids and ranking the union by descending fused
/// score with an ascending-id tie-break.
///
/// Lexical and vector scores are not on comparable scales in general (idf
/// sums vs. cosine similarity); taking the max rather than summing avoids
/// letting one method's scale dominate the other's, and is the simplest
/// reading of a one-or-the-other candidate set that still rewards records
/// both methods agree on.
pub fn merge_by_max_score(
    engine: &StorageEngine,
    table: &str,
    lexical: Vec<ScoredRecord>,
    vector: Vec<(RecordId, f64)>,
    limit: Option<usize>,
) -> DocstoreResult<Vec<HybridResult>> {
    let mut lexical_scores: BTreeMap<RecordId, f64> = BTreeMap::new();
    let mut records: BTreeMap<RecordId, StoredRecord> = BTreeMap::new();
    for scored in lexical {
        lexical_scores.insert(scored.record.id, scored.score);
        records.insert(scored.record.id, scored.record);
    }

    let mut vector_scores: BTreeMap<RecordId, f64> = BTreeMap::new();
    for (id, score) in vector {
        vector_scores.insert(id, score);
        if !records.contains_key(&id) {
            if let Some(record) = engine.get(table, id)? {
                records.insert(id, record);
            }
        }
    }

    let mut ids: Vec<RecordId> = records.keys().copied().collect();
    ids.sort();

    let mut fused: Vec<HybridResult> = ids
        .into_iter()
        .filter_map(|id| {
            let record = records.remove(&id)?;
            let lexical_score = lexical_scores.get(&id).copied();
            let vector_score = vector_scores.get(&id).copied();
            let score = lexical_score
                .into_iter()
                .chain(vector_score)
                .fold(f64::NEG_INFINITY, f64::max);
            Some(HybridResult { record, score, lexical_score, vector_score })
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.record.id.cmp(&b.record.id))
    });

    if let Some(limit) = limit {
        fused.truncate(limit);
    }
    Ok(fused)
}

/// Whether `direction` and the physical index traversal order agree, i.e.
/// no in-memory re-sort is needed after an indexed scan. Exposed for tests
/// and for `getMetrics` instrumentation of planner behavior.
pub fn index_satisfies_order(_direction: Direction) -> bool {
    true
}
