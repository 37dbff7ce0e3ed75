//! Integration test: `(count, totalBytes)` stays in sync with inserts,
//! updates, and deletes, and a failed write leaves stats untouched.

use docstore_core::column::ColumnType;
use docstore_core::record::{Record, Value};
use docstore_core::schema::{ColumnDef, DistanceMetric, Schema, TableSchema, VectorColumnSpec};
use docstore_core::traits::RecordStore;
use docstore_storage::StorageEngine;

fn engine() -> StorageEngine {
    let schema = Schema::new().table(
        TableSchema::new("docs")
            .column(ColumnDef::new("label", ColumnType::String))
            .column(ColumnDef::new("embedding", ColumnType::Vector).with_dimension(2))
            .vector_column(VectorColumnSpec {
                column: "embedding".into(),
                dimension: 2,
                metric: DistanceMetric::Cosine,
                source_field: None,
            }),
    );
    StorageEngine::open_in_memory(schema).unwrap()
}

fn doc(label: &str, vector: Vec<f32>) -> Record {
    let mut r = Record::new();
    r.insert("label".into(), Value::Text(label.into()));
    r.insert("embedding".into(), Value::Vector(vector));
    r
}

#[test]
fn count_tracks_inserts_and_deletes() {
    let engine = engine();
    assert_eq!(engine.count("docs").unwrap(), 0);

    let a = engine.insert("docs", doc("a", vec![1.0, 0.0])).unwrap();
    engine.insert("docs", doc("b", vec![0.0, 1.0])).unwrap();
    assert_eq!(engine.count("docs").unwrap(), 2);

    engine.delete("docs", a).unwrap();
    assert_eq!(engine.count("docs").unwrap(), 1);
}

#[test]
fn total_bytes_grows_on_insert_and_shrinks_on_delete() {
    let engine = engine();
    let id = engine.insert("docs", doc("a-long-label-value", vec![1.0, 0.0])).unwrap();
    let after_insert = engine.total_bytes("docs").unwrap();
    assert!(after_insert > 0);

    engine.delete("docs", id).unwrap();
    assert_eq!(engine.total_bytes("docs").unwrap(), 0);
}

#[test]
fn a_failed_insert_does_not_bump_stats() {
    let engine = engine();
    let before = engine.count("docs").unwrap();
    let _ = engine.insert("docs", doc("bad", vec![1.0])); // wrong dimension
    assert_eq!(engine.count("docs").unwrap(), before);
}

#[test]
fn bulk_insert_bumps_count_once_per_successful_record() {
    let engine = engine();
    let records = vec![doc("a", vec![1.0, 0.0]), doc("b", vec![0.0, 1.0]), doc("bad", vec![1.0])];
    let result = engine.create_bulk("docs", records);
    assert_eq!(result.success, 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(engine.count("docs").unwrap(), 2);
}
