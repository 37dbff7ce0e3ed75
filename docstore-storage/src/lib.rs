//! SQLite-backed ordered key-value substrate, value codec,
//! schema validation, and the record CRUD engine.
//!
//! A table is a SQLite table; a schema is a set of `CREATE TABLE` and
//! `CREATE INDEX` statements derived from `docstore_core::TableSchema`.
//! Everything above this crate talks to records, never to SQL.

pub mod codec;
pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod substrate;

pub use engine::StorageEngine;

use docstore_core::errors::{DocstoreError, StorageError};

/// Wrap a rusqlite/substrate failure as a `DocstoreError::Storage`.
///
/// Centralized here so every module in this crate reports storage failures
/// under the same error shape, the way the resilience layer expects.
pub fn to_storage_err(message: impl Into<String>) -> DocstoreError {
    DocstoreError::Storage(StorageError::Substrate {
        message: message.into(),
    })
}
