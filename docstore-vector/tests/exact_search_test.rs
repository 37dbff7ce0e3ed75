//! S4 (vector exact): with D=3 and cosine, three vectors ranked by
//! similarity to a query should come back in the expected order.

use docstore_core::column::ColumnType;
use docstore_core::record::{Record, Value};
use docstore_core::schema::{ColumnDef, DistanceMetric, Schema, TableSchema, VectorColumnSpec};
use docstore_core::traits::RecordStore;
use docstore_storage::StorageEngine;

fn schema(metric: DistanceMetric) -> Schema {
    Schema::new().table(
        TableSchema::new("docs")
            .column(ColumnDef::new("embedding", ColumnType::Vector).with_dimension(3))
            .vector_column(VectorColumnSpec {
                column: "embedding".into(),
                dimension: 3,
                metric,
                source_field: None,
            }),
    )
}

fn insert_vector(engine: &StorageEngine, vector: Vec<f32>) -> docstore_core::record::RecordId {
    let mut r = Record::new();
    r.insert("embedding".into(), Value::Vector(vector));
    engine.insert("docs", r).unwrap()
}

#[test]
fn exact_scan_ranks_by_cosine_similarity_to_the_query() {
    let engine = StorageEngine::open_in_memory(schema(DistanceMetric::Cosine)).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();

    let id1 = insert_vector(&engine, vec![1.0, 0.0, 0.0]);
    let id2 = insert_vector(&engine, vec![0.0, 1.0, 0.0]);
    let id3 = insert_vector(&engine, vec![0.9, 0.1, 0.0]);

    let results = docstore_vector::exact::search(&engine, &table, &[1.0, 0.0, 0.0], 3).unwrap();
    let ids: Vec<_> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![id1, id3, id2]);
}

#[test]
fn exact_scan_truncates_to_k() {
    let engine = StorageEngine::open_in_memory(schema(DistanceMetric::Cosine)).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();
    insert_vector(&engine, vec![1.0, 0.0, 0.0]);
    insert_vector(&engine, vec![0.0, 1.0, 0.0]);
    insert_vector(&engine, vec![0.0, 0.0, 1.0]);

    let results = docstore_vector::exact::search(&engine, &table, &[1.0, 0.0, 0.0], 1).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn exact_scan_against_an_empty_table_returns_nothing() {
    let engine = StorageEngine::open_in_memory(schema(DistanceMetric::Cosine)).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();
    let results = docstore_vector::exact::search(&engine, &table, &[1.0, 0.0, 0.0], 5).unwrap();
    assert!(results.is_empty());
}

#[test]
fn euclidean_metric_prefers_the_nearer_point() {
    let engine = StorageEngine::open_in_memory(schema(DistanceMetric::Euclidean)).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();
    let near = insert_vector(&engine, vec![1.0, 0.0, 0.0]);
    insert_vector(&engine, vec![5.0, 0.0, 0.0]);

    let results = docstore_vector::exact::search(&engine, &table, &[0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(results[0].0, near);
}
