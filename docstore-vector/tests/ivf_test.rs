//! IVF build + probe-search against a real `StorageEngine`: every vector id
//! lands in exactly one cluster, and probing the nearest clusters finds the
//! true nearest neighbor for well-separated clusters.

use docstore_core::column::ColumnType;
use docstore_core::record::{Record, Value};
use docstore_core::schema::{ColumnDef, DistanceMetric, Schema, TableSchema, VectorColumnSpec};
use docstore_core::traits::RecordStore;
use docstore_storage::queries::ivf_store;
use docstore_storage::StorageEngine;

fn schema() -> Schema {
    Schema::new().table(
        TableSchema::new("docs")
            .column(ColumnDef::new("embedding", ColumnType::Vector).with_dimension(2))
            .vector_column(VectorColumnSpec {
                column: "embedding".into(),
                dimension: 2,
                metric: DistanceMetric::Euclidean,
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
fn every_vector_id_is_assigned_to_exactly_one_cluster() {
    let engine = StorageEngine::open_in_memory(schema()).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();

    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(insert_vector(&engine, vec![i as f32, (i % 3) as f32]));
    }

    docstore_vector::ivf::build(&engine, &table, 4).unwrap();

    let centroids = engine.with_reader(|conn| ivf_store::centroids(conn, &table)).unwrap();
    let mut seen = std::collections::HashSet::new();
    for (cluster_id, _) in &centroids {
        for member in engine.with_reader(|conn| ivf_store::cluster_members(conn, &table, *cluster_id)).unwrap() {
            assert!(seen.insert(member), "record {member} assigned to more than one cluster");
        }
    }
    assert_eq!(seen, ids.into_iter().collect());
}

#[test]
fn probe_search_finds_the_nearest_point_in_well_separated_clusters() {
    let engine = StorageEngine::open_in_memory(schema()).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();

    let near = insert_vector(&engine, vec![0.0, 0.0]);
    insert_vector(&engine, vec![0.1, 0.1]);
    for i in 0..10 {
        insert_vector(&engine, vec![100.0 + i as f32, 100.0]);
    }

    docstore_vector::ivf::build(&engine, &table, 3).unwrap();
    let results = docstore_vector::ivf::search(&engine, &table, &[0.0, 0.0], 1, 3).unwrap();
    assert_eq!(results[0].0, near);
}

#[test]
fn search_against_an_unbuilt_index_falls_back_to_exact_scan() {
    let engine = StorageEngine::open_in_memory(schema()).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();
    let id = insert_vector(&engine, vec![1.0, 1.0]);

    let results = docstore_vector::ivf::search(&engine, &table, &[1.0, 1.0], 1, 3).unwrap();
    assert_eq!(results[0].0, id);
}

#[test]
fn build_against_an_empty_table_clears_any_stale_centroids() {
    let engine = StorageEngine::open_in_memory(schema()).unwrap();
    let table = engine.schema().unwrap().get("docs").unwrap().clone();
    docstore_vector::ivf::build(&engine, &table, 4).unwrap();
    let centroids = engine.with_reader(|conn| ivf_store::centroids(conn, &table)).unwrap();
    assert!(centroids.is_empty());
}
