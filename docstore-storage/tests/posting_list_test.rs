//! Integration test: index-consistency invariant for the `_ii_<table>`
//! posting-list table that backs lexical search (docstore-lexical is the
//! only reader; this crate is the only writer).

use docstore_core::column::ColumnType;
use docstore_core::record::{Record, Value};
use docstore_core::schema::{ColumnDef, Schema, TableSchema};
use docstore_core::tokenize::tokenize;
use docstore_core::traits::RecordStore;
use docstore_storage::StorageEngine;

fn engine() -> StorageEngine {
    let schema = Schema::new().table(
        TableSchema::new("messages")
            .column(ColumnDef::new("body", ColumnType::String))
            .searchable("body"),
    );
    StorageEngine::open_in_memory(schema).unwrap()
}

fn message(body: &str) -> Record {
    let mut r = Record::new();
    r.insert("body".into(), Value::Text(body.into()));
    r
}

/// Every token produced by tokenizing a record's searchable field is a hit
/// for `search`-style lookups against the posting table this crate owns;
/// exercised indirectly through the raw row count rather than
/// `docstore-lexical` (which this crate must not depend on).
fn posting_row_count(engine: &StorageEngine, term: &str) -> i64 {
    engine
        .with_reader(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM \"_ii_messages\" WHERE term = ?1",
                [term],
                |row| row.get(0),
            )
            .map_err(|e| docstore_storage::to_storage_err(e.to_string()))
        })
        .unwrap()
}

#[test]
fn insert_creates_a_posting_for_every_distinct_token() {
    let engine = engine();
    engine.insert("messages", message("Hello world")).unwrap();
    for token in tokenize("Hello world") {
        assert_eq!(posting_row_count(&engine, &token), 1, "missing posting for '{token}'");
    }
}

/// S1: two messages share the token "world"; both must be postable under it.
#[test]
fn shared_token_accumulates_postings_from_every_record() {
    let engine = engine();
    engine.insert("messages", message("Hello world")).unwrap();
    engine.insert("messages", message("world of warcraft")).unwrap();
    assert_eq!(posting_row_count(&engine, "world"), 2);
    assert_eq!(posting_row_count(&engine, "hello"), 1);
}

/// S2 (update reindex): updating a record's searchable field must drop
/// postings for tokens no longer present and add postings for new ones.
#[test]
fn update_retires_old_tokens_and_adds_new_ones() {
    let engine = engine();
    let id = engine.insert("messages", message("hello world")).unwrap();

    let mut patch = Record::new();
    patch.insert("body".into(), Value::Text("goodbye moon".into()));
    engine.update("messages", id, patch).unwrap();

    assert_eq!(posting_row_count(&engine, "hello"), 0);
    assert_eq!(posting_row_count(&engine, "world"), 0);
    assert_eq!(posting_row_count(&engine, "goodbye"), 1);
    assert_eq!(posting_row_count(&engine, "moon"), 1);
}

#[test]
fn delete_drops_every_posting_for_the_record() {
    let engine = engine();
    let id = engine.insert("messages", message("hello world")).unwrap();
    engine.delete("messages", id).unwrap();
    assert_eq!(posting_row_count(&engine, "hello"), 0);
    assert_eq!(posting_row_count(&engine, "world"), 0);
}

#[test]
fn deleting_one_of_two_sharers_leaves_the_others_posting_intact() {
    let engine = engine();
    let id1 = engine.insert("messages", message("hello world")).unwrap();
    engine.insert("messages", message("world of warcraft")).unwrap();
    engine.delete("messages", id1).unwrap();
    assert_eq!(posting_row_count(&engine, "world"), 1);
}

#[test]
fn tokenizer_lowercases_and_strips_punctuation() {
    let engine = engine();
    engine.insert("messages", message("Hello, WORLD!!")).unwrap();
    assert_eq!(posting_row_count(&engine, "hello"), 1);
    assert_eq!(posting_row_count(&engine, "world"), 1);
}
