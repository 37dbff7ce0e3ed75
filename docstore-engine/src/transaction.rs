//! `transaction(work)`: the cross-table atomicity escape hatch. Everything
//! `work` does against the handed-back [`Transaction`] runs inside one
//! savepoint on the writer connection, enlisting every table the closure
//! touches, since every table already lives in the one SQLite database a
//! `StorageEngine` owns.
//!
//! Change events raised by operations inside the block are buffered and
//! only published once the savepoint commits — never from inside a
//! transaction that might still roll back.

use std::cell::RefCell;

use chrono::Utc;
use docstore_core::errors::DocstoreResult;
use docstore_core::record::{Record, RecordId, StoredRecord};
use docstore_core::traits::{ChangeEvent, ChangeType};
use docstore_storage::queries::record_crud;
use docstore_storage::StorageEngine;

use crate::Engine;

struct PendingEvent {
    table: String,
    change_type: ChangeType,
    record: StoredRecord,
    old_record: Option<StoredRecord>,
}

/// A handle scoped to one `transaction(work)` call. Every method here runs
/// against the same savepoint, so either all of them land or none do.
///
/// Unlike `Engine::insert`/`update`/`delete`, these bypass auth hooks,
/// embedding-on-write, and field encryption — this is the raw storage-level
/// primitive; callers who need the full write pipeline inside a
/// transaction compose it themselves from `Engine`'s public methods before
/// or after the block.
pub struct Transaction<'a> {
    conn: &'a rusqlite::Connection,
    storage: &'a StorageEngine,
    pending: RefCell<Vec<PendingEvent>>,
}

impl<'a> Transaction<'a> {
    pub fn insert(&self, table: &str, record: Record) -> DocstoreResult<RecordId> {
        let schema = self.storage.schema_for(table)?;
        let id = record_crud::insert(self.conn, &schema, &record)?;
        if let Some(stored) = record_crud::get(self.conn, &schema, id)? {
            self.pending.borrow_mut().push(PendingEvent {
                table: table.to_string(),
                change_type: ChangeType::Insert,
                record: stored,
                old_record: None,
            });
        }
        Ok(id)
    }

    pub fn get(&self, table: &str, id: RecordId) -> DocstoreResult<Option<StoredRecord>> {
        let schema = self.storage.schema_for(table)?;
        record_crud::get(self.conn, &schema, id)
    }

    pub fn update(&self, table: &str, id: RecordId, patch: Record) -> DocstoreResult<()> {
        let schema = self.storage.schema_for(table)?;
        let old = record_crud::get(self.conn, &schema, id)?;
        record_crud::update(self.conn, &schema, id, &patch)?;
        if let Some(stored) = record_crud::get(self.conn, &schema, id)? {
            self.pending.borrow_mut().push(PendingEvent {
                table: table.to_string(),
                change_type: ChangeType::Update,
                record: stored,
                old_record: old,
            });
        }
        Ok(())
    }

    pub fn delete(&self, table: &str, id: RecordId) -> DocstoreResult<()> {
        let schema = self.storage.schema_for(table)?;
        let existing = record_crud::get(self.conn, &schema, id)?;
        record_crud::delete(self.conn, &schema, id)?;
        if let Some(existing) = existing {
            self.pending.borrow_mut().push(PendingEvent {
                table: table.to_string(),
                change_type: ChangeType::Delete,
                record: existing,
                old_record: None,
            });
        }
        Ok(())
    }

    pub fn upsert(&self, table: &str, record: Record) -> DocstoreResult<RecordId> {
        let schema = self.storage.schema_for(table)?;
        let existing_id = record.get(&schema.primary_key).and_then(|v| v.as_f64()).map(|n| n as RecordId);
        let old = match existing_id {
            Some(id) => record_crud::get(self.conn, &schema, id)?,
            None => None,
        };
        let id = record_crud::upsert(self.conn, &schema, &record)?;
        if let Some(stored) = record_crud::get(self.conn, &schema, id)? {
            let change_type = if old.is_some() { ChangeType::Update } else { ChangeType::Insert };
            self.pending.borrow_mut().push(PendingEvent {
                table: table.to_string(),
                change_type,
                record: stored,
                old_record: old,
            });
        }
        Ok(id)
    }
}

impl Engine {
    /// Run `work` against a single atomic transaction spanning every table
    /// it touches. On `Ok`, the savepoint commits and every buffered change
    /// event publishes; on `Err`, the savepoint rolls back and nothing is
    /// published.
    pub fn transaction<F, T>(&self, work: F) -> DocstoreResult<T>
    where
        F: FnOnce(&Transaction) -> DocstoreResult<T>,
    {
        let storage = self.active_storage().clone();
        let events = RefCell::new(Vec::new());
        let result = storage.with_writer(|conn| {
            record_crud::with_savepoint(conn, |sp| {
                let tx = Transaction {
                    conn: sp,
                    storage: &storage,
                    pending: RefCell::new(Vec::new()),
                };
                let value = work(&tx)?;
                events.replace(tx.pending.into_inner());
                Ok(value)
            })
        })?;

        for event in events.into_inner() {
            self.publish(ChangeEvent {
                table: event.table,
                change_type: event.change_type,
                record: event.record,
                old_record: event.old_record,
                at: Utc::now(),
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::column::ColumnType;
    use docstore_core::config::DocstoreConfig;
    use docstore_core::record::Value;
    use docstore_core::schema::{ColumnDef, Schema, TableSchema};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn engine() -> Engine {
        let schema = Schema::new()
            .table(TableSchema::new("accounts").column(ColumnDef::new("balance", ColumnType::Number)))
            .table(TableSchema::new("ledger").column(ColumnDef::new("note", ColumnType::String)));
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    #[test]
    fn commits_writes_across_two_tables_together() {
        let engine = engine();
        let mut acct = Record::new();
        acct.insert("balance".into(), Value::Number(100.0));

        let (acct_id, ledger_id) = engine
            .transaction(|tx| {
                let acct_id = tx.insert("accounts", acct.clone())?;
                let mut entry = Record::new();
                entry.insert("note".into(), Value::Text("opening balance".into()));
                let ledger_id = tx.insert("ledger", entry)?;
                Ok((acct_id, ledger_id))
            })
            .unwrap();

        assert!(engine.get("accounts", acct_id).unwrap().is_some());
        assert!(engine.get("ledger", ledger_id).unwrap().is_some());
    }

    #[test]
    fn failure_rolls_back_every_table_touched() {
        let engine = engine();
        let mut acct = Record::new();
        acct.insert("balance".into(), Value::Number(100.0));

        let result: DocstoreResult<()> = engine.transaction(|tx| {
            tx.insert("accounts", acct.clone())?;
            Err(docstore_core::errors::DocstoreError::NotFound {
                table: "ledger".into(),
                id: 1,
            })
        });
        assert!(result.is_err());

        let stats = engine.get_stats(Some("accounts")).unwrap();
        assert_eq!(stats.tables["accounts"].count, 0);
    }

    #[test]
    fn change_events_publish_only_after_commit() {
        let engine = engine();
        let count = Arc::new(AtomicUsize::new(0));

        struct Counter(Arc<AtomicUsize>);
        impl docstore_core::traits::ChangeSubscriber for Counter {
            fn on_change(&self, _event: &ChangeEvent) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
        engine.subscribe("accounts", Arc::new(Counter(count.clone())));

        let mut acct = Record::new();
        acct.insert("balance".into(), Value::Number(50.0));
        engine.transaction(|tx| tx.insert("accounts", acct.clone())).unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
