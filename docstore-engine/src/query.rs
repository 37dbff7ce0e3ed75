//! Read paths beyond plain `get`/`getAll`: predicate/order queries,
//! lexical search, vector search, and the hybrid fusion of the two.

use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::query::{FindOptions, SearchOptions};
use docstore_core::record::StoredRecord;
use docstore_core::traits::{Page, RecordStore};
use docstore_query::HybridResult;

use crate::Engine;

impl Engine {
    pub fn find(&self, table: &str, opts: &FindOptions) -> DocstoreResult<Vec<StoredRecord>> {
        let rows = self.resilient("find", || self.active_storage().find(table, opts))?;
        rows.into_iter().map(|r| self.decrypt_for_read(table, r)).collect()
    }

    pub fn find_page(&self, table: &str, opts: &FindOptions) -> DocstoreResult<Page> {
        let mut page = self.resilient("find_page", || self.active_storage().find_page(table, opts))?;
        page.data = page.data.into_iter().map(|r| self.decrypt_for_read(table, r)).collect::<DocstoreResult<_>>()?;
        Ok(page)
    }

    /// TF-IDF search over a table's searchable fields.
    pub fn search(&self, table: &str, query_text: &str, opts: &SearchOptions) -> DocstoreResult<Vec<docstore_lexical::ScoredRecord>> {
        let mut results = self.resilient("search", || docstore_lexical::search(self.active_storage(), table, query_text, opts))?;
        for scored in &mut results {
            scored.record = self.decrypt_for_read(table, scored.record.clone())?;
        }
        Ok(results)
    }

    /// Nearest-neighbor search against an already-computed query vector,
    /// using whichever index (exact/IVF/HNSW) the table's config selects.
    /// Reuses the index built by a prior call (or by
    /// [`Engine::build_vector_index`]) instead of rebuilding it every
    /// query; it only rebuilds when the table's vector count has moved
    /// since that build.
    pub fn vector_search(&self, table: &str, query: &[f32], k: usize) -> DocstoreResult<Vec<(docstore_core::record::RecordId, f64)>> {
        self.resilient("vector_search", || {
            let storage = self.active_storage();
            let schema = storage.schema_for(table)?;
            let kind = self.0.vector_index_cache.ensure_built(storage, &schema, &self.0.config.vector)?;
            docstore_vector::search(storage, &schema, query, k, kind, &self.0.config.vector)
        })
    }

    /// Embed `query_text` through the table's registered embedder, then run
    /// [`Engine::vector_search`].
    pub fn vector_search_text(&self, table: &str, query_text: &str, k: usize) -> DocstoreResult<Vec<(docstore_core::record::RecordId, f64)>> {
        let embedder = self
            .0
            .embedders
            .get(table)
            .map(|e| e.clone())
            .ok_or_else(|| DocstoreError::Validation {
                field: "embedder".to_string(),
                message: format!("no embedder registered for table '{table}'"),
            })?;
        let embedded = self.0.embedder_cache.get_or_embed(table, query_text, embedder.as_ref())?;
        self.vector_search(table, &embedded, k)
    }

    /// Fuse lexical and vector results for the same query text by
    /// `(id, max(score))`, the way `search` + `vectorSearchText` combined
    /// manually would, minus the duplicate round trip to the substrate.
    pub fn hybrid_search(&self, table: &str, query_text: &str, k: usize, opts: &SearchOptions) -> DocstoreResult<Vec<HybridResult>> {
        let lexical = docstore_lexical::search(self.active_storage(), table, query_text, opts)?;
        let vector = match self.vector_search_text(table, query_text, k) {
            Ok(results) => results,
            Err(DocstoreError::Validation { .. }) => Vec::new(),
            Err(err) => return Err(err),
        };
        let mut fused = docstore_query::merge_by_max_score(self.active_storage(), table, lexical, vector, opts.limit)?;
        for result in &mut fused {
            result.record = self.decrypt_for_read(table, result.record.clone())?;
        }
        Ok(fused)
    }

    fn decrypt_for_read(&self, table: &str, mut record: StoredRecord) -> DocstoreResult<StoredRecord> {
        if let Some(key) = self.0.key.read().expect("key lock poisoned").as_ref() {
            let schema = self.active_storage().schema_for(table)?;
            crate::encryption::decrypt_record(&schema, key, &mut record.fields)?;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::column::ColumnType;
    use docstore_core::config::DocstoreConfig;
    use docstore_core::record::{Record, Value};
    use docstore_core::schema::{ColumnDef, Schema, TableSchema};

    fn engine() -> Engine {
        let schema = Schema::new().table(
            TableSchema::new("messages")
                .column(ColumnDef::new("body", ColumnType::String))
                .searchable("body"),
        );
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    fn record(body: &str) -> Record {
        let mut r = Record::new();
        r.insert("body".into(), Value::Text(body.into()));
        r
    }

    #[test]
    fn search_finds_the_inserted_document() {
        let engine = engine();
        engine.insert("messages", record("the quick brown fox")).unwrap();
        let results = engine.search("messages", "quick fox", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn find_with_no_predicates_returns_everything() {
        let engine = engine();
        engine.insert("messages", record("a")).unwrap();
        engine.insert("messages", record("b")).unwrap();
        let results = engine.find("messages", &FindOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn vector_search_text_without_an_embedder_fails_validation() {
        let engine = engine();
        let result = engine.vector_search_text("messages", "hello", 5);
        assert!(matches!(result, Err(DocstoreError::Validation { .. })));
    }

    fn vector_engine() -> Engine {
        use docstore_core::schema::{DistanceMetric, VectorColumnSpec};
        let schema = Schema::new().table(
            TableSchema::new("docs")
                .column(ColumnDef::new("embedding", ColumnType::Vector).with_dimension(2))
                .vector_column(VectorColumnSpec {
                    column: "embedding".into(),
                    dimension: 2,
                    metric: DistanceMetric::Cosine,
                    source_field: None,
                }),
        );
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    fn vector_record(v: Vec<f32>) -> Record {
        let mut r = Record::new();
        r.insert("embedding".into(), Value::Vector(v));
        r
    }

    #[test]
    fn vector_search_finds_the_nearest_neighbor_across_repeated_queries() {
        let engine = vector_engine();
        let near = engine.insert("docs", vector_record(vec![1.0, 0.0])).unwrap();
        engine.insert("docs", vector_record(vec![0.0, 1.0])).unwrap();

        for _ in 0..3 {
            let results = engine.vector_search("docs", &[0.9, 0.1], 1).unwrap();
            assert_eq!(results[0].0, near);
        }
    }

    #[test]
    fn build_vector_index_is_callable_as_a_standalone_lifecycle_operation() {
        let engine = vector_engine();
        engine.insert("docs", vector_record(vec![1.0, 0.0])).unwrap();
        engine.insert("docs", vector_record(vec![0.0, 1.0])).unwrap();

        engine.build_vector_index("docs").unwrap();
        let results = engine.vector_search("docs", &[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }
}
