use chrono::{DateTime, Utc};

use crate::errors::DocstoreResult;
use crate::query::{Cursor, FindOptions};
use crate::record::{Record, RecordId, StoredRecord};

/// Per-record bulk-operation result: partial success, since bulk ops never
/// throw for per-record failures.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BulkResult {
    pub success: usize,
    pub errors: Vec<BulkError>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BulkError {
    pub index: usize,
    pub message: String,
}

/// A page of results plus an opaque continuation cursor, as returned by
/// `findPage`.
#[derive(Debug, Clone)]
pub struct Page {
    pub data: Vec<StoredRecord>,
    pub next_cursor: Option<Cursor>,
}

/// The storage/record-engine contract every table operation in the
/// engine goes through. One `RecordStore` implementation (`docstore-storage`'s
/// `StorageEngine`) backs every table in a given `Schema`, each with its own
/// arbitrary `Record` row shape.
pub trait RecordStore: Send + Sync {
    fn insert(&self, table: &str, record: Record) -> DocstoreResult<RecordId>;
    fn get(&self, table: &str, id: RecordId) -> DocstoreResult<Option<StoredRecord>>;
    fn update(&self, table: &str, id: RecordId, patch: Record) -> DocstoreResult<()>;
    fn delete(&self, table: &str, id: RecordId) -> DocstoreResult<()>;
    fn upsert(&self, table: &str, record: Record) -> DocstoreResult<RecordId>;

    fn create_bulk(&self, table: &str, records: Vec<Record>) -> BulkResult;
    fn update_bulk(&self, table: &str, patches: Vec<(RecordId, Record)>) -> BulkResult;
    fn delete_bulk(&self, table: &str, ids: Vec<RecordId>) -> BulkResult;

    fn get_all(&self, table: &str, limit: Option<usize>) -> DocstoreResult<Vec<StoredRecord>>;
    fn find(&self, table: &str, opts: &FindOptions) -> DocstoreResult<Vec<StoredRecord>>;
    fn find_page(&self, table: &str, opts: &FindOptions) -> DocstoreResult<Page>;

    fn count(&self, table: &str) -> DocstoreResult<usize>;
    fn total_bytes(&self, table: &str) -> DocstoreResult<u64>;

    /// Full, unfiltered scan in primary-key order — the fallback access path
    /// and the substrate for lexical/vector index rebuilds.
    fn scan_all(&self, table: &str) -> DocstoreResult<Vec<StoredRecord>>;

    /// Ordered scan over a secondary-indexed field within `[from, to]`
    /// (either bound may be absent for an open range).
    fn scan_index(
        &self,
        table: &str,
        field: &str,
        from: Option<&crate::record::Value>,
        to: Option<&crate::record::Value>,
        direction: crate::query::Direction,
    ) -> DocstoreResult<Vec<StoredRecord>>;

    fn clear(&self, table: &str) -> DocstoreResult<()>;
    fn vacuum(&self) -> DocstoreResult<()>;
}

/// A reversible transform applied by a user-supplied column validator:
/// forward on encode (validation + derivation), reverse on decode
/// (restoring derived fields).
pub trait Validator: Send + Sync {
    /// Validate and transform a record before it is encoded and stored.
    /// `partial` is true for `update`, where every field is optional.
    fn forward(&self, record: &Record, partial: bool) -> DocstoreResult<Record>;

    /// Restore derived fields after decoding a stored record.
    fn reverse(&self, record: &Record) -> DocstoreResult<Record> {
        Ok(record.clone())
    }
}

/// An embedding provider: text in, fixed-dimension vector out. The engine
/// only consumes this interface — no concrete provider ships in this
/// crate tree.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> DocstoreResult<Vec<f32>>;
    fn dimensions(&self) -> usize;
}

/// A subscriber callback for the change bus.
pub trait ChangeSubscriber: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

/// A change-bus event, delivered after commit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChangeEvent {
    pub table: String,
    pub change_type: ChangeType,
    pub record: StoredRecord,
    pub old_record: Option<StoredRecord>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// An authorization hook: every mutating operation must pass every
/// registered hook.
pub trait AuthHook: Send + Sync {
    fn check(&self, operation: &str, table: &str, data: Option<&Record>) -> bool;
}
