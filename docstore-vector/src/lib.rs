//! Vector search: exact scan, IVF, and HNSW over the embedding tables
//! `docstore-storage` maintains, plus the embedder cache and the
//! `buildOptimalVectorIndex` index-selection heuristic.

pub mod distance;
pub mod exact;
pub mod hnsw;
pub mod ivf;

use std::sync::Arc;

use docstore_core::config::{VectorIndexConfig, VectorIndexKind};
use docstore_core::errors::{DocstoreError, DocstoreResult, VectorError};
use docstore_core::record::RecordId;
use docstore_core::schema::TableSchema;
use docstore_core::traits::Embedder;
use moka::sync::Cache;
use tracing::debug;

pub use embedder_cache::EmbedderCache;

mod embedder_cache {
    use super::*;

    /// Maps `(table, text) -> vector` with LRU eviction bounded by a
    /// configurable maximum entry count. Cache hits are reported through
    /// [`EmbedderCache::hit_rate`] for the metrics layer.
    pub struct EmbedderCache {
        cache: Cache<(String, String), Arc<Vec<f32>>>,
        hits: std::sync::atomic::AtomicU64,
        misses: std::sync::atomic::AtomicU64,
    }

    impl EmbedderCache {
        pub fn new(max_entries: u64) -> Self {
            Self {
                cache: Cache::new(max_entries),
                hits: std::sync::atomic::AtomicU64::new(0),
                misses: std::sync::atomic::AtomicU64::new(0),
            }
        }

        pub fn get_or_embed(
            &self,
            table: &str,
            text: &str,
            embedder: &dyn Embedder,
        ) -> DocstoreResult<Arc<Vec<f32>>> {
            let key = (table.to_string(), text.to_string());
            if let Some(hit) = self.cache.get(&key) {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Ok(hit);
            }
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let embedded = Arc::new(embedder.embed(text)?);
            self.cache.insert(key, embedded.clone());
            Ok(embedded)
        }

        pub fn hit_rate(&self) -> f64 {
            let hits = self.hits.load(std::sync::atomic::Ordering::Relaxed) as f64;
            let misses = self.misses.load(std::sync::atomic::Ordering::Relaxed) as f64;
            if hits + misses == 0.0 {
                return 0.0;
            }
            hits / (hits + misses)
        }

        pub fn invalidate_table(&self, table: &str) {
            self.cache.invalidate_entries_if(move |(t, _), _| t == table).ok();
        }
    }
}

/// Which concrete index backs a table at query time, chosen either by
/// explicit config or by [`optimal_index_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveIndex {
    Exact,
    Ivf,
    Hnsw,
}

/// `buildOptimalVectorIndex` heuristic:
/// - count ≤ 1000 → IVF with `min(16, ceil(count/10))` centroids
/// - count ≤ 10000 → HNSW with `M ≈ ceil(log2 count)`
/// - otherwise → HNSW with larger `M` and `efConstruction ≈ 400`
pub fn optimal_index_kind(count: usize) -> ActiveIndex {
    if count == 0 {
        return ActiveIndex::Exact;
    }
    if count <= 1000 {
        ActiveIndex::Ivf
    } else {
        ActiveIndex::Hnsw
    }
}

pub fn optimal_ivf_clusters(count: usize) -> usize {
    (16usize).min(((count as f64) / 10.0).ceil().max(1.0) as usize)
}

pub fn optimal_hnsw_params(count: usize) -> (usize, usize) {
    if count <= 10_000 {
        let m = ((count as f64).log2().ceil().max(2.0)) as usize;
        (m, 200)
    } else {
        (32, 400)
    }
}

/// Build whichever index the table's config (or the optimal heuristic,
/// under [`VectorIndexKind::Auto`]) selects. Exact scan needs no build
/// step, so this is a no-op for it.
pub fn build_optimal(
    engine: &docstore_storage::StorageEngine,
    schema: &TableSchema,
    config: &VectorIndexConfig,
) -> DocstoreResult<ActiveIndex> {
    let Some(_vector) = &schema.vector else {
        return Err(DocstoreError::Vector(VectorError::EmptyIndex));
    };
    let count = count_vectors(engine, schema)?;

    let kind = match config.kind {
        VectorIndexKind::Auto => optimal_index_kind(count),
        VectorIndexKind::Exact => ActiveIndex::Exact,
        VectorIndexKind::Ivf => ActiveIndex::Ivf,
        VectorIndexKind::Hnsw => ActiveIndex::Hnsw,
    };

    match kind {
        ActiveIndex::Exact => {}
        ActiveIndex::Ivf => {
            let clusters = if config.ivf_clusters > 0 {
                config.ivf_clusters
            } else {
                optimal_ivf_clusters(count)
            };
            debug!(table = %schema.name, clusters, "building IVF index");
            ivf::build(engine, schema, clusters)?;
        }
        ActiveIndex::Hnsw => {
            let (auto_m, auto_ef) = optimal_hnsw_params(count);
            let m = if config.hnsw_m > 0 { config.hnsw_m } else { auto_m };
            let ef_construction = if config.hnsw_ef_construction > 0 {
                config.hnsw_ef_construction
            } else {
                auto_ef
            };
            debug!(table = %schema.name, m, ef_construction, "building HNSW index");
            hnsw::build(engine, schema, m, ef_construction)?;
        }
    }
    Ok(kind)
}

fn count_vectors(engine: &docstore_storage::StorageEngine, schema: &TableSchema) -> DocstoreResult<usize> {
    engine.with_reader(|conn| {
        docstore_storage::queries::vector_store::scan_all(conn, schema).map(|rows| rows.len())
    })
}

#[derive(Debug, Clone, Copy)]
struct IndexState {
    kind: ActiveIndex,
    built_at_count: usize,
}

/// Tracks, per table, which index `build_optimal` last built and at what
/// vector count. `vector_search` consults this before building anything:
/// IVF and HNSW have no incremental update (see their module docs), so a
/// rebuild is only worth its cost when the table's vector count — and
/// therefore the heuristic's choice of index or cluster/graph
/// parameters — has actually moved since the last build.
pub struct VectorIndexCache {
    state: std::sync::RwLock<std::collections::HashMap<String, IndexState>>,
}

impl Default for VectorIndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndexCache {
    pub fn new() -> Self {
        Self {
            state: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Which kind of index `build_optimal` would choose for `schema` right
    /// now, without running it.
    fn desired_kind(config: &VectorIndexConfig, count: usize) -> ActiveIndex {
        match config.kind {
            VectorIndexKind::Auto => optimal_index_kind(count),
            VectorIndexKind::Exact => ActiveIndex::Exact,
            VectorIndexKind::Ivf => ActiveIndex::Ivf,
            VectorIndexKind::Hnsw => ActiveIndex::Hnsw,
        }
    }

    /// Return the index backing `schema`'s searches, building it first if
    /// this is the first call for the table or the vector count has
    /// changed since the last build recorded here.
    pub fn ensure_built(
        &self,
        engine: &docstore_storage::StorageEngine,
        schema: &TableSchema,
        config: &VectorIndexConfig,
    ) -> DocstoreResult<ActiveIndex> {
        let count = count_vectors(engine, schema)?;
        let desired = Self::desired_kind(config, count);
        {
            let state = self.state.read().expect("vector index cache poisoned");
            if let Some(entry) = state.get(&schema.name) {
                if entry.kind == desired && entry.built_at_count == count {
                    return Ok(desired);
                }
            }
        }
        self.force_build(engine, schema, config)
    }

    /// Rebuild the index for `schema` unconditionally and record the
    /// resulting state. The `buildOptimalVectorIndex` lifecycle operation.
    pub fn force_build(
        &self,
        engine: &docstore_storage::StorageEngine,
        schema: &TableSchema,
        config: &VectorIndexConfig,
    ) -> DocstoreResult<ActiveIndex> {
        let kind = build_optimal(engine, schema, config)?;
        let count = count_vectors(engine, schema)?;
        self.state
            .write()
            .expect("vector index cache poisoned")
            .insert(schema.name.clone(), IndexState { kind, built_at_count: count });
        Ok(kind)
    }

    /// Drop any recorded build state for `table`, so the next
    /// `ensure_built` call rebuilds regardless of vector count.
    pub fn invalidate(&self, table: &str) {
        self.state.write().expect("vector index cache poisoned").remove(table);
    }
}

/// Dispatch a query vector search to whichever index `kind` names,
/// checking the dimension invariant first: a mismatch between the query
/// vector and the column's declared `D` fails fast.
pub fn search(
    engine: &docstore_storage::StorageEngine,
    schema: &TableSchema,
    query: &[f32],
    k: usize,
    kind: ActiveIndex,
    config: &VectorIndexConfig,
) -> DocstoreResult<Vec<(RecordId, f64)>> {
    let vector = schema.vector.as_ref().ok_or(DocstoreError::Vector(VectorError::EmptyIndex))?;
    if query.len() != vector.dimension {
        return Err(DocstoreError::DimensionMismatch {
            expected: vector.dimension,
            actual: query.len(),
        });
    }
    match kind {
        ActiveIndex::Exact => exact::search(engine, schema, query, k),
        ActiveIndex::Ivf => ivf::search(engine, schema, query, k, config.ivf_probes),
        ActiveIndex::Hnsw => hnsw::search(engine, schema, query, k, config.hnsw_ef_search),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_index_kind_follows_the_size_thresholds() {
        assert_eq!(optimal_index_kind(0), ActiveIndex::Exact);
        assert_eq!(optimal_index_kind(500), ActiveIndex::Ivf);
        assert_eq!(optimal_index_kind(1000), ActiveIndex::Ivf);
        assert_eq!(optimal_index_kind(1001), ActiveIndex::Hnsw);
        assert_eq!(optimal_index_kind(50_000), ActiveIndex::Hnsw);
    }

    #[test]
    fn ivf_cluster_count_is_bounded_by_sixteen() {
        assert_eq!(optimal_ivf_clusters(50), 5);
        assert_eq!(optimal_ivf_clusters(1000), 16);
        assert_eq!(optimal_ivf_clusters(1), 1);
    }

    #[test]
    fn hnsw_params_scale_with_dataset_size() {
        let (m_small, ef_small) = optimal_hnsw_params(1000);
        let (m_large, ef_large) = optimal_hnsw_params(50_000);
        assert!(m_large >= m_small);
        assert!(ef_large >= ef_small);
    }

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        fn embed(&self, text: &str) -> DocstoreResult<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }
        fn dimensions(&self) -> usize {
            1
        }
    }

    #[test]
    fn embedder_cache_reuses_prior_embeddings() {
        let cache = EmbedderCache::new(10);
        let embedder = StubEmbedder;
        let a = cache.get_or_embed("docs", "hello", &embedder).unwrap();
        let b = cache.get_or_embed("docs", "hello", &embedder).unwrap();
        assert_eq!(a, b);
        assert!(cache.hit_rate() > 0.0);
    }

    fn vector_schema() -> docstore_core::schema::Schema {
        use docstore_core::column::ColumnType;
        use docstore_core::schema::{ColumnDef, DistanceMetric, Schema, TableSchema, VectorColumnSpec};
        Schema::new().table(
            TableSchema::new("docs")
                .column(ColumnDef::new("embedding", ColumnType::Vector).with_dimension(2))
                .vector_column(VectorColumnSpec {
                    column: "embedding".into(),
                    dimension: 2,
                    metric: DistanceMetric::Cosine,
                    source_field: None,
                }),
        )
    }

    fn insert_vector(engine: &docstore_storage::StorageEngine, v: Vec<f32>) -> RecordId {
        use docstore_core::record::{Record, Value};
        use docstore_core::traits::RecordStore;
        let mut r = Record::new();
        r.insert("embedding".into(), Value::Vector(v));
        engine.insert("docs", r).unwrap()
    }

    #[test]
    fn ensure_built_skips_rebuild_when_the_vector_count_is_unchanged() {
        let engine = docstore_storage::StorageEngine::open_in_memory(vector_schema()).unwrap();
        let table = engine.schema_for("docs").unwrap();
        insert_vector(&engine, vec![1.0, 0.0]);
        insert_vector(&engine, vec![0.0, 1.0]);

        let cache = VectorIndexCache::new();
        let config = VectorIndexConfig::default();
        let first = cache.ensure_built(&engine, &table, &config).unwrap();
        assert_eq!(first, ActiveIndex::Ivf);

        // Wipe the persisted centroids behind the cache's back. If the
        // second `ensure_built` call actually rebuilds, it repopulates
        // them; if it trusts the cache (the point of this test), they
        // stay empty.
        engine
            .with_writer(|conn| docstore_storage::queries::ivf_store::clear(conn, &table))
            .unwrap();
        let second = cache.ensure_built(&engine, &table, &config).unwrap();
        assert_eq!(second, first);
        let centroids = engine
            .with_reader(|conn| docstore_storage::queries::ivf_store::centroids(conn, &table))
            .unwrap();
        assert!(centroids.is_empty(), "a cache hit must not have rebuilt and repopulated centroids");

        cache.invalidate("docs");
        cache.ensure_built(&engine, &table, &config).unwrap();
        let rebuilt_centroids = engine
            .with_reader(|conn| docstore_storage::queries::ivf_store::centroids(conn, &table))
            .unwrap();
        assert!(!rebuilt_centroids.is_empty(), "invalidating the cache must force a real rebuild");
    }
}
