//! `StorageEngine`: the `RecordStore` implementation every table in a
//! `Schema` is served by. Owns the connection pool and the live schema,
//! and is the seam where a table's `Validator` runs on every
//! read/write.

use std::path::Path;
use std::sync::RwLock;

use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::query::{Direction, FindOptions};
use docstore_core::record::{Record, RecordId, StoredRecord, Value};
use docstore_core::schema::Schema;
use docstore_core::traits::{BulkResult, Page, RecordStore};

use crate::migrations;
use crate::pool::ConnectionPool;
use crate::queries::{record_crud, record_query, stats};
use crate::to_storage_err;

pub struct StorageEngine {
    pool: ConnectionPool,
    schema: RwLock<Schema>,
    /// The schema version that was stored before `open`/`open_in_memory`
    /// ran migrations — `None` for a freshly created database. Lets
    /// `Engine::init` run only the migration steps between this version
    /// and the schema's, instead of every registered step on every open.
    opened_at_version: Option<u32>,
}

impl StorageEngine {
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> DocstoreResult<Self> {
        let pool = ConnectionPool::open(path)?;
        let opened_at_version = pool.writer.with_conn_sync(|conn| migrations::run(conn, &schema))?;
        Ok(Self {
            pool,
            schema: RwLock::new(schema),
            opened_at_version,
        })
    }

    pub fn open_in_memory(schema: Schema) -> DocstoreResult<Self> {
        let pool = ConnectionPool::open_in_memory()?;
        let opened_at_version = pool.writer.with_conn_sync(|conn| migrations::run(conn, &schema))?;
        Ok(Self {
            pool,
            schema: RwLock::new(schema),
            opened_at_version,
        })
    }

    /// The schema version stored before this engine's `open` call ran
    /// migrations, or `None` if the database was freshly created.
    pub fn opened_at_version(&self) -> Option<u32> {
        self.opened_at_version
    }

    /// Apply a (possibly widened) schema at runtime: `defineSchema` called
    /// again after tables already exist.
    pub fn define_schema(&self, schema: Schema) -> DocstoreResult<()> {
        self.pool.writer.with_conn_sync(|conn| migrations::run(conn, &schema))?;
        *self
            .schema
            .write()
            .map_err(|e| to_storage_err(format!("schema lock poisoned: {e}")))? = schema;
        Ok(())
    }

    pub fn schema(&self) -> DocstoreResult<Schema> {
        Ok(self
            .schema
            .read()
            .map_err(|e| to_storage_err(format!("schema lock poisoned: {e}")))?
            .clone())
    }

    /// Run `f` against a pooled reader connection. The seam `docstore-lexical`
    /// and `docstore-vector` use to read the posting-list and vector tables
    /// this crate owns without reaching into `StorageEngine` internals.
    pub fn with_reader<F, T>(&self, f: F) -> DocstoreResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DocstoreResult<T>,
    {
        self.pool.readers.with_conn(f)
    }

    /// Run `f` against the writer connection. Used by index-maintenance
    /// callers (e.g. a vector index rebuild) that need a consistent,
    /// exclusive view while writing auxiliary tables.
    pub fn with_writer<F, T>(&self, f: F) -> DocstoreResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> DocstoreResult<T>,
    {
        self.pool.writer.with_conn_sync(f)
    }

    /// Look up one table's schema from the live, possibly-just-redefined
    /// schema — the same lookup every `RecordStore` method uses.
    pub fn schema_for(&self, table: &str) -> DocstoreResult<docstore_core::schema::TableSchema> {
        self.table_schema(table)
    }

    /// Append one row to the audit trail. Called by the engine layer after
    /// a mutation commits, since the actor identity is only known there.
    pub fn record_audit(&self, table: &str, record_id: RecordId, operation: &str, actor: &str) -> DocstoreResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| crate::queries::audit::record(conn, table, record_id, operation, actor))
    }

    fn table_schema(&self, table: &str) -> DocstoreResult<docstore_core::schema::TableSchema> {
        let schema = self
            .schema
            .read()
            .map_err(|e| to_storage_err(format!("schema lock poisoned: {e}")))?;
        schema
            .get(table)
            .cloned()
            .ok_or_else(|| DocstoreError::Validation {
                field: "table".into(),
                message: format!("unknown table '{table}'"),
            })
    }

    fn reverse(table: &docstore_core::schema::TableSchema, mut record: StoredRecord) -> DocstoreResult<StoredRecord> {
        if let Some(validator) = &table.validator {
            record.fields = validator.reverse(&record.fields)?;
        }
        Ok(record)
    }
}

impl RecordStore for StorageEngine {
    fn insert(&self, table: &str, record: Record) -> DocstoreResult<RecordId> {
        let schema = self.table_schema(table)?;
        let record = match &schema.validator {
            Some(v) => v.forward(&record, false)?,
            None => record,
        };
        self.pool
            .writer
            .with_conn_sync(|conn| record_crud::with_savepoint(conn, |tx| record_crud::insert(tx, &schema, &record)))
    }

    fn get(&self, table: &str, id: RecordId) -> DocstoreResult<Option<StoredRecord>> {
        let schema = self.table_schema(table)?;
        let found = self
            .pool
            .readers
            .with_conn(|conn| record_crud::get(conn, &schema, id))?;
        found.map(|r| Self::reverse(&schema, r)).transpose()
    }

    fn update(&self, table: &str, id: RecordId, patch: Record) -> DocstoreResult<()> {
        let schema = self.table_schema(table)?;
        let patch = match &schema.validator {
            Some(v) => v.forward(&patch, true)?,
            None => patch,
        };
        self.pool
            .writer
            .with_conn_sync(|conn| record_crud::with_savepoint(conn, |tx| record_crud::update(tx, &schema, id, &patch)))
    }

    fn delete(&self, table: &str, id: RecordId) -> DocstoreResult<()> {
        let schema = self.table_schema(table)?;
        self.pool
            .writer
            .with_conn_sync(|conn| record_crud::with_savepoint(conn, |tx| record_crud::delete(tx, &schema, id)))
    }

    fn upsert(&self, table: &str, record: Record) -> DocstoreResult<RecordId> {
        let schema = self.table_schema(table)?;
        let record = match &schema.validator {
            Some(v) => v.forward(&record, false)?,
            None => record,
        };
        self.pool
            .writer
            .with_conn_sync(|conn| record_crud::with_savepoint(conn, |tx| record_crud::upsert(tx, &schema, &record)))
    }

    fn create_bulk(&self, table: &str, records: Vec<Record>) -> BulkResult {
        let Ok(schema) = self.table_schema(table) else {
            return BulkResult {
                success: 0,
                errors: (0..records.len())
                    .map(|index| docstore_core::traits::BulkError {
                        index,
                        message: format!("unknown table '{table}'"),
                    })
                    .collect(),
            };
        };
        let records: Vec<Record> = records
            .into_iter()
            .map(|r| match &schema.validator {
                Some(v) => v.forward(&r, false).unwrap_or(r),
                None => r,
            })
            .collect();
        self.pool
            .writer
            .with_conn_sync(|conn| Ok(record_crud::create_bulk(conn, &schema, records)))
            .unwrap_or_default()
    }

    fn update_bulk(&self, table: &str, patches: Vec<(RecordId, Record)>) -> BulkResult {
        let Ok(schema) = self.table_schema(table) else {
            return BulkResult {
                success: 0,
                errors: (0..patches.len())
                    .map(|index| docstore_core::traits::BulkError {
                        index,
                        message: format!("unknown table '{table}'"),
                    })
                    .collect(),
            };
        };
        self.pool
            .writer
            .with_conn_sync(|conn| Ok(record_crud::update_bulk(conn, &schema, patches)))
            .unwrap_or_default()
    }

    fn delete_bulk(&self, table: &str, ids: Vec<RecordId>) -> BulkResult {
        let Ok(schema) = self.table_schema(table) else {
            return BulkResult {
                success: 0,
                errors: (0..ids.len())
                    .map(|index| docstore_core::traits::BulkError {
                        index,
                        message: format!("unknown table '{table}'"),
                    })
                    .collect(),
            };
        };
        self.pool
            .writer
            .with_conn_sync(|conn| Ok(record_crud::delete_bulk(conn, &schema, ids)))
            .unwrap_or_default()
    }

    fn get_all(&self, table: &str, limit: Option<usize>) -> DocstoreResult<Vec<StoredRecord>> {
        let schema = self.table_schema(table)?;
        let rows = self
            .pool
            .readers
            .with_conn(|conn| record_query::get_all(conn, &schema, limit))?;
        rows.into_iter().map(|r| Self::reverse(&schema, r)).collect()
    }

    fn find(&self, table: &str, opts: &FindOptions) -> DocstoreResult<Vec<StoredRecord>> {
        let schema = self.table_schema(table)?;
        let rows = self
            .pool
            .readers
            .with_conn(|conn| record_query::find(conn, &schema, opts))?;
        rows.into_iter().map(|r| Self::reverse(&schema, r)).collect()
    }

    fn find_page(&self, table: &str, opts: &FindOptions) -> DocstoreResult<Page> {
        let schema = self.table_schema(table)?;
        let page = self
            .pool
            .readers
            .with_conn(|conn| record_query::find_page(conn, &schema, opts))?;
        let data = page
            .data
            .into_iter()
            .map(|r| Self::reverse(&schema, r))
            .collect::<DocstoreResult<Vec<_>>>()?;
        Ok(Page {
            data,
            next_cursor: page.next_cursor,
        })
    }

    fn count(&self, table: &str) -> DocstoreResult<usize> {
        let schema = self.table_schema(table)?;
        self.pool
            .readers
            .with_conn(|conn| stats::record_count(conn, &schema.name))
    }

    fn total_bytes(&self, table: &str) -> DocstoreResult<u64> {
        let schema = self.table_schema(table)?;
        self.pool
            .readers
            .with_conn(|conn| stats::total_bytes(conn, &schema.name))
    }

    fn scan_all(&self, table: &str) -> DocstoreResult<Vec<StoredRecord>> {
        let schema = self.table_schema(table)?;
        let rows = self
            .pool
            .readers
            .with_conn(|conn| record_query::scan_all(conn, &schema))?;
        rows.into_iter().map(|r| Self::reverse(&schema, r)).collect()
    }

    fn scan_index(
        &self,
        table: &str,
        field: &str,
        from: Option<&Value>,
        to: Option<&Value>,
        direction: Direction,
    ) -> DocstoreResult<Vec<StoredRecord>> {
        let schema = self.table_schema(table)?;
        let rows = self.pool.readers.with_conn(|conn| {
            record_query::scan_index(conn, &schema, field, from, to, direction)
        })?;
        rows.into_iter().map(|r| Self::reverse(&schema, r)).collect()
    }

    fn clear(&self, table: &str) -> DocstoreResult<()> {
        let schema = self.table_schema(table)?;
        self.pool.writer.with_conn_sync(|conn| {
            record_crud::with_savepoint(conn, |tx| {
                let ids: Vec<RecordId> = record_query::scan_all(tx, &schema)?
                    .into_iter()
                    .map(|r| r.id)
                    .collect();
                for id in ids {
                    record_crud::delete(tx, &schema, id)?;
                }
                stats::reset(tx, &schema.name)
            })
        })
    }

    fn vacuum(&self) -> DocstoreResult<()> {
        self.pool
            .writer
            .with_conn_sync(|conn| conn.execute_batch("VACUUM;").map_err(|e| to_storage_err(e.to_string())))
    }
}
