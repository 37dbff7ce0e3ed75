//! Field-level encryption wiring: which fields are sensitive, and how a
//! record is encrypted before it reaches the substrate and decrypted after
//! it leaves it. The cryptography itself lives in `docstore-crypto`; this
//! module only decides *which* fields of *which* records it applies to,
//! and drives key rotation across every table that has any.

use docstore_core::column::ColumnType;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::record::{Record, Value};
use docstore_core::schema::TableSchema;
use docstore_core::traits::RecordStore;
use docstore_crypto::{decrypt_field, derive_key, encrypt_field, is_sensitive, KeyHandle};
use docstore_storage::queries::record_crud;
use tracing::warn;

use crate::Engine;

fn sensitive_columns(schema: &TableSchema) -> impl Iterator<Item = &str> {
    schema
        .columns
        .iter()
        .filter(|c| c.column_type == ColumnType::String && is_sensitive(&c.name))
        .map(|c| c.name.as_str())
}

/// Encrypt every sensitive text field of `record` in place, under `key`.
/// A no-op for fields that are absent or not `Value::Text`.
pub(crate) fn encrypt_record(schema: &TableSchema, key: &KeyHandle, record: &mut Record) -> DocstoreResult<()> {
    for field in sensitive_columns(schema) {
        if let Some(Value::Text(plain)) = record.get(field) {
            let ciphertext = encrypt_field(key, field, plain)?;
            record.insert(field.to_string(), Value::Text(ciphertext));
        }
    }
    Ok(())
}

/// Decrypt every sensitive text field of `record` in place, under `key`.
/// Decryption failure is fatal for the field's read: it never falls back
/// to returning ciphertext or a prior plaintext.
pub(crate) fn decrypt_record(schema: &TableSchema, key: &KeyHandle, record: &mut Record) -> DocstoreResult<()> {
    for field in sensitive_columns(schema) {
        if let Some(Value::Text(ciphertext)) = record.get(field) {
            let plain = decrypt_field(key, field, ciphertext)?;
            record.insert(field.to_string(), Value::Text(plain));
        }
    }
    Ok(())
}

pub(crate) fn set_encryption_key(engine: &Engine, passphrase: &str, salt: Option<[u8; docstore_core::constants::SALT_LEN]>) -> DocstoreResult<()> {
    let key = derive_key(passphrase, salt)?;
    *engine.0.key.write().expect("key lock poisoned") = Some(key);
    Ok(())
}

/// Re-encrypt every sensitive field of every table under a newly derived
/// key. Validates that every sensitive field currently decrypts under the
/// old key *before* writing anything back or replacing the key handle: a
/// failure partway through the validation pass changes nothing, so a
/// subsequent read of any sensitive field still decrypts under the old
/// key, matching the "abort restores the previous key" requirement.
pub(crate) fn rotate_encryption_key(engine: &Engine, new_passphrase: &str) -> DocstoreResult<()> {
    let old_key = engine
        .0
        .key
        .read()
        .expect("key lock poisoned")
        .clone()
        .ok_or(DocstoreError::Crypto(docstore_core::errors::CryptoError::NoKeyConfigured {}))?;
    let new_key = derive_key(new_passphrase, None)?;

    let storage = engine.active_storage();
    let schema = storage.schema()?;

    let mut planned: Vec<(TableSchema, docstore_core::record::RecordId, Record)> = Vec::new();
    for table in schema.tables.values() {
        let fields: Vec<&str> = sensitive_columns(table).collect();
        if fields.is_empty() {
            continue;
        }
        for record in storage.scan_all(&table.name)? {
            let mut patch = Record::new();
            for field in &fields {
                if let Some(Value::Text(ciphertext)) = record.fields.get(*field) {
                    let plain = decrypt_field(&old_key, field, ciphertext).map_err(|_| {
                        DocstoreError::Crypto(docstore_core::errors::CryptoError::RotationAborted {
                            reason: format!("field '{field}' on {}/{} does not decrypt under the current key", table.name, record.id),
                        })
                    })?;
                    let reencrypted = encrypt_field(&new_key, field, &plain)?;
                    patch.insert((*field).to_string(), Value::Text(reencrypted));
                }
            }
            if !patch.is_empty() {
                planned.push((table.clone(), record.id, patch));
            }
        }
    }

    // Apply every re-encrypted record in one savepoint: a storage fault on
    // any single record rolls back every rewrite already made in this call,
    // so a read immediately after a failed rotation still decrypts under
    // `old_key` — the key handle below is only swapped once the whole
    // batch has committed.
    if let Err(err) = apply_planned_rotation(storage, &planned) {
        warn!(%err, "key rotation failed while applying re-encrypted records; rolled back under the current key");
        return Err(DocstoreError::Crypto(docstore_core::errors::CryptoError::RotationAborted {
            reason: err.to_string(),
        }));
    }

    *engine.0.key.write().expect("key lock poisoned") = Some(new_key);
    Ok(())
}

/// Write every `(table, id, patch)` re-encryption in `planned` inside one
/// savepoint, so a failure on any single record leaves none of them
/// applied.
fn apply_planned_rotation(
    storage: &docstore_storage::StorageEngine,
    planned: &[(TableSchema, docstore_core::record::RecordId, Record)],
) -> DocstoreResult<()> {
    if planned.is_empty() {
        return Ok(());
    }
    storage.with_writer(|conn| {
        record_crud::with_savepoint(conn, |tx| {
            for (table_schema, id, patch) in planned {
                record_crud::update(tx, table_schema, *id, patch)?;
            }
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::config::DocstoreConfig;
    use docstore_core::schema::{ColumnDef, Schema};
    use docstore_core::traits::RecordStore;

    fn users_schema() -> TableSchema {
        TableSchema::new("users").column(ColumnDef::new("password", ColumnType::String))
    }

    fn engine() -> Engine {
        let schema = Schema::new().table(users_schema());
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    #[test]
    fn rotation_requires_a_key_to_already_be_set() {
        let engine = engine();
        assert!(rotate_encryption_key(&engine, "newpassphrase").is_err());
    }

    #[test]
    fn apply_planned_rotation_rolls_back_the_whole_batch_on_a_mid_batch_failure() {
        let engine = engine();
        set_encryption_key(&engine, "hunter22", None).unwrap();
        let key = engine.0.key.read().unwrap().clone().unwrap();

        let mut record = Record::new();
        record.insert("password".into(), Value::Text("s3cr3t".into()));
        encrypt_record(&users_schema(), &key, &mut record).unwrap();
        let id = engine.active_storage().insert("users", record).unwrap();

        let before = engine.active_storage().get("users", id).unwrap().unwrap();

        let mut good_patch = Record::new();
        good_patch.insert("password".into(), Value::Text("rewritten-under-new-key".into()));
        let bogus_id: docstore_core::record::RecordId = id + 1_000_000;
        let mut bogus_patch = Record::new();
        bogus_patch.insert("password".into(), Value::Text("never-applied".into()));

        let planned = vec![(users_schema(), id, good_patch), (users_schema(), bogus_id, bogus_patch)];

        let result = apply_planned_rotation(engine.active_storage(), &planned);
        assert!(result.is_err(), "a nonexistent record id in the batch must fail the whole apply");

        let after = engine.active_storage().get("users", id).unwrap().unwrap();
        assert_eq!(
            after.fields.get("password"),
            before.fields.get("password"),
            "the earlier, otherwise-valid record must be unchanged: the savepoint rolls back the whole batch"
        );
    }

    #[test]
    fn rotation_reencrypts_stored_records_and_old_key_then_fails() {
        let engine = engine();
        set_encryption_key(&engine, "hunter22", None).unwrap();
        let key = engine.0.key.read().unwrap().clone().unwrap();

        let mut record = Record::new();
        record.insert("password".into(), Value::Text("s3cr3t".into()));
        encrypt_record(&users_schema(), &key, &mut record).unwrap();
        let id = engine.active_storage().insert("users", record).unwrap();

        rotate_encryption_key(&engine, "newpassphrase").unwrap();

        let stored = engine.active_storage().get("users", id).unwrap().unwrap();
        let old_key = key;
        let new_key = engine.0.key.read().unwrap().clone().unwrap();
        if let Some(Value::Text(ciphertext)) = stored.fields.get("password") {
            assert!(decrypt_field(&old_key, "password", ciphertext).is_err());
            assert_eq!(decrypt_field(&new_key, "password", ciphertext).unwrap(), "s3cr3t");
        } else {
            panic!("expected an encrypted password field");
        }
    }
}
