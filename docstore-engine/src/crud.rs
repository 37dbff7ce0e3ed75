//! Single-record and bulk CRUD: validate → embed → encrypt → encode →
//! write, each wrapped by the resilience layer, each followed by an audit
//! row and a post-commit change event.

use chrono::Utc;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::record::{Record, RecordId, StoredRecord};
use docstore_core::traits::{BulkError, BulkResult, ChangeEvent, ChangeType, RecordStore};

use crate::{auth, embedding, encryption, Engine};

impl Engine {
    fn decrypt_stored(&self, table: &str, mut record: StoredRecord) -> DocstoreResult<StoredRecord> {
        if let Some(key) = self.0.key.read().expect("key lock poisoned").as_ref() {
            let schema = self.active_storage().schema_for(table)?;
            encryption::decrypt_record(&schema, key, &mut record.fields)?;
        }
        Ok(record)
    }

    pub fn insert(&self, table: &str, record: Record) -> DocstoreResult<RecordId> {
        auth::check(self, "insert", table, Some(&record))?;

        let schema = self.active_storage().schema_for(table)?;
        let mut record = record;
        embedding::embed_for_write(self, table, &schema, &mut record)?;
        if let Some(key) = self.0.key.read().expect("key lock poisoned").as_ref() {
            encryption::encrypt_record(&schema, key, &mut record)?;
        }

        let id = self.resilient("insert", || self.active_storage().insert(table, record.clone()))?;

        self.active_storage().record_audit(table, id, "insert", "engine").ok();
        if let Some(stored) = self.active_storage().get(table, id)? {
            let stored = self.decrypt_stored(table, stored)?;
            self.publish(ChangeEvent {
                table: table.to_string(),
                change_type: ChangeType::Insert,
                record: stored,
                old_record: None,
                at: Utc::now(),
            });
        }
        Ok(id)
    }

    pub fn get(&self, table: &str, id: RecordId) -> DocstoreResult<Option<StoredRecord>> {
        let found = self.resilient("get", || self.active_storage().get(table, id))?;
        found.map(|r| self.decrypt_stored(table, r)).transpose()
    }

    pub fn update(&self, table: &str, id: RecordId, patch: Record) -> DocstoreResult<()> {
        auth::check(self, "update", table, Some(&patch))?;

        let schema = self.active_storage().schema_for(table)?;
        let old = self.active_storage().get(table, id)?;
        let old = old.map(|r| self.decrypt_stored(table, r)).transpose()?;

        let mut patch = patch;
        embedding::embed_for_write(self, table, &schema, &mut patch)?;
        if let Some(key) = self.0.key.read().expect("key lock poisoned").as_ref() {
            encryption::encrypt_record(&schema, key, &mut patch)?;
        }

        self.resilient("update", || self.active_storage().update(table, id, patch.clone()))?;

        self.active_storage().record_audit(table, id, "update", "engine").ok();
        if let Some(stored) = self.active_storage().get(table, id)? {
            let stored = self.decrypt_stored(table, stored)?;
            self.publish(ChangeEvent {
                table: table.to_string(),
                change_type: ChangeType::Update,
                record: stored,
                old_record: old,
                at: Utc::now(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, table: &str, id: RecordId) -> DocstoreResult<()> {
        auth::check(self, "delete", table, None)?;

        let existing = self.active_storage().get(table, id)?;
        let Some(existing) = existing else {
            return Err(DocstoreError::NotFound { table: table.to_string(), id });
        };
        let existing = self.decrypt_stored(table, existing)?;

        self.resilient("delete", || self.active_storage().delete(table, id))?;

        self.active_storage().record_audit(table, id, "delete", "engine").ok();
        self.publish(ChangeEvent {
            table: table.to_string(),
            change_type: ChangeType::Delete,
            record: existing,
            old_record: None,
            at: Utc::now(),
        });
        Ok(())
    }

    pub fn upsert(&self, table: &str, record: Record) -> DocstoreResult<RecordId> {
        auth::check(self, "upsert", table, Some(&record))?;

        let schema = self.active_storage().schema_for(table)?;
        let existing_id = record.get(&schema.primary_key).and_then(|v| v.as_f64()).map(|n| n as RecordId);
        let old = match existing_id {
            Some(id) => self.active_storage().get(table, id)?.map(|r| self.decrypt_stored(table, r)).transpose()?,
            None => None,
        };

        let mut record = record;
        embedding::embed_for_write(self, table, &schema, &mut record)?;
        if let Some(key) = self.0.key.read().expect("key lock poisoned").as_ref() {
            encryption::encrypt_record(&schema, key, &mut record)?;
        }

        let id = self.resilient("upsert", || self.active_storage().upsert(table, record.clone()))?;

        let change_type = if old.is_some() { ChangeType::Update } else { ChangeType::Insert };
        self.active_storage().record_audit(table, id, "upsert", "engine").ok();
        if let Some(stored) = self.active_storage().get(table, id)? {
            let stored = self.decrypt_stored(table, stored)?;
            self.publish(ChangeEvent {
                table: table.to_string(),
                change_type,
                record: stored,
                old_record: old,
                at: Utc::now(),
            });
        }
        Ok(id)
    }

    /// Each record is its own transaction; a failure on one never rolls
    /// back the others. Results accumulate per-record success/error.
    pub fn create_bulk(&self, table: &str, records: Vec<Record>) -> BulkResult {
        let mut result = BulkResult::default();
        for (index, record) in records.into_iter().enumerate() {
            match self.insert(table, record) {
                Ok(_) => result.success += 1,
                Err(err) => result.errors.push(BulkError { index, message: err.to_string() }),
            }
        }
        result
    }

    pub fn update_bulk(&self, table: &str, patches: Vec<(RecordId, Record)>) -> BulkResult {
        let mut result = BulkResult::default();
        for (index, (id, patch)) in patches.into_iter().enumerate() {
            match self.update(table, id, patch) {
                Ok(()) => result.success += 1,
                Err(err) => result.errors.push(BulkError { index, message: err.to_string() }),
            }
        }
        result
    }

    pub fn delete_bulk(&self, table: &str, ids: Vec<RecordId>) -> BulkResult {
        let mut result = BulkResult::default();
        for (index, id) in ids.into_iter().enumerate() {
            match self.delete(table, id) {
                Ok(()) => result.success += 1,
                Err(err) => result.errors.push(BulkError { index, message: err.to_string() }),
            }
        }
        result
    }

    pub fn get_all(&self, table: &str, limit: Option<usize>) -> DocstoreResult<Vec<StoredRecord>> {
        let rows = self.resilient("get_all", || self.active_storage().get_all(table, limit))?;
        rows.into_iter().map(|r| self.decrypt_stored(table, r)).collect()
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

    fn messages_engine() -> Engine {
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
    fn insert_then_get_round_trips() {
        let engine = messages_engine();
        let id = engine.insert("messages", record("hello")).unwrap();
        let stored = engine.get("messages", id).unwrap().unwrap();
        assert_eq!(stored.fields.get("body"), Some(&Value::Text("hello".into())));
    }

    #[test]
    fn update_of_missing_id_is_not_found_and_mutates_nothing() {
        let engine = messages_engine();
        let mut patch = Record::new();
        patch.insert("body".into(), Value::Text("x".into()));
        let result = engine.update("messages", 999, patch);
        assert!(matches!(result, Err(DocstoreError::NotFound { .. })));
    }

    #[test]
    fn insert_publishes_exactly_one_event() {
        let engine = messages_engine();
        let count = Arc::new(AtomicUsize::new(0));

        struct Counter(Arc<AtomicUsize>);
        impl docstore_core::traits::ChangeSubscriber for Counter {
            fn on_change(&self, _event: &ChangeEvent) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
        engine.subscribe("messages", Arc::new(Counter(count.clone())));
        engine.insert("messages", record("hello")).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn bulk_insert_reports_partial_success() {
        let engine = messages_engine();
        let records = vec![record("a"), record("b"), record("c")];
        let result = engine.create_bulk("messages", records);
        assert_eq!(result.success, 3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn delete_removes_the_record_and_emits_one_event() {
        let engine = messages_engine();
        let id = engine.insert("messages", record("hello")).unwrap();
        engine.delete("messages", id).unwrap();
        assert!(engine.get("messages", id).unwrap().is_none());
    }
}
