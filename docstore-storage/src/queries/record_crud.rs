//! Record mutation: insert/get/update/delete/upsert and their bulk
//! counterparts, plus the posting-list and vector-table maintenance that
//! rides along with every write.

use rusqlite::{Connection, ToSql};

use docstore_core::column::ColumnType;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::record::{Record, RecordId, StoredRecord, Value};
use docstore_core::schema::TableSchema;
use docstore_core::traits::{BulkError, BulkResult};

use crate::codec::{sql_to_value, value_to_sql};
use crate::substrate::ddl::quote_ident;
use crate::to_storage_err;

use super::{posting_list, stats, vector_store};

fn approx_size(record: &Record) -> i64 {
    serde_json::to_vec(record).map(|v| v.len()).unwrap_or(0) as i64
}

/// Non-pk, non-vector columns, in declaration order — the columns that
/// live directly on the record's SQL row.
fn row_columns(schema: &TableSchema) -> impl Iterator<Item = &docstore_core::schema::ColumnDef> {
    schema
        .columns
        .iter()
        .filter(move |c| c.name != schema.primary_key && c.column_type != ColumnType::Vector)
}

fn params_ref(values: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    values.iter().map(|b| b.as_ref()).collect()
}

pub fn insert(conn: &Connection, schema: &TableSchema, record: &Record) -> DocstoreResult<RecordId> {
    let table_ident = quote_ident(&schema.name)?;

    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    for col in row_columns(schema) {
        let value = record.get(&col.name).cloned().unwrap_or(Value::Null);
        if value.is_null() && !col.optional {
            return Err(DocstoreError::Validation {
                field: col.name.clone(),
                message: "required field missing".into(),
            });
        }
        names.push(quote_ident(&col.name)?);
        placeholders.push(format!("?{}", values.len() + 1));
        values.push(value_to_sql(col.column_type, &value)?);
    }

    let sql = if names.is_empty() {
        format!("INSERT INTO {table_ident} DEFAULT VALUES")
    } else {
        format!(
            "INSERT INTO {table_ident} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        )
    };
    conn.execute(&sql, params_ref(&values).as_slice())
        .map_err(|e| to_storage_err(e.to_string()))?;
    let id = conn.last_insert_rowid();

    posting_list::write(conn, schema, id, record)?;
    if let Some(vector) = &schema.vector {
        if let Some(Value::Vector(v)) = record.get(&vector.column) {
            if v.len() != vector.dimension {
                return Err(DocstoreError::DimensionMismatch {
                    expected: vector.dimension,
                    actual: v.len(),
                });
            }
            vector_store::write(conn, schema, id, v)?;
        }
    }
    stats::bump(conn, &schema.name, 1, approx_size(record))?;
    Ok(id)
}

pub fn get(conn: &Connection, schema: &TableSchema, id: RecordId) -> DocstoreResult<Option<StoredRecord>> {
    let table_ident = quote_ident(&schema.name)?;
    let pk_ident = quote_ident(&schema.primary_key)?;
    let cols: Vec<_> = row_columns(schema).collect();
    let select_list: Vec<String> = cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<DocstoreResult<_>>()?;

    let sql = if select_list.is_empty() {
        format!("SELECT {pk_ident} FROM {table_ident} WHERE {pk_ident} = ?1")
    } else {
        format!(
            "SELECT {pk_ident}, {} FROM {table_ident} WHERE {pk_ident} = ?1",
            select_list.join(", ")
        )
    };

    let mut stmt = conn.prepare(&sql).map_err(|e| to_storage_err(e.to_string()))?;
    let mut rows = stmt
        .query(rusqlite::params![id])
        .map_err(|e| to_storage_err(e.to_string()))?;

    let Some(row) = rows.next().map_err(|e| to_storage_err(e.to_string()))? else {
        return Ok(None);
    };

    let mut fields = Record::new();
    for (i, col) in cols.iter().enumerate() {
        let raw = row
            .get_ref(i + 1)
            .map_err(|e| to_storage_err(e.to_string()))?;
        fields.insert(col.name.clone(), sql_to_value(col.column_type, raw)?);
    }
    if let Some(vector) = &schema.vector {
        if let Some(embedding) = vector_store::read(conn, schema, id)? {
            fields.insert(vector.column.clone(), Value::Vector(embedding));
        }
    }

    Ok(Some(StoredRecord { id, fields }))
}

pub fn update(conn: &Connection, schema: &TableSchema, id: RecordId, patch: &Record) -> DocstoreResult<()> {
    let existing = get(conn, schema, id)?.ok_or_else(|| DocstoreError::NotFound {
        table: schema.name.clone(),
        id,
    })?;

    let mut merged = existing.fields.clone();
    for (k, v) in patch {
        merged.insert(k.clone(), v.clone());
    }

    let table_ident = quote_ident(&schema.name)?;
    let pk_ident = quote_ident(&schema.primary_key)?;

    let mut sets = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    for (key, value) in patch {
        if key == &schema.primary_key {
            continue;
        }
        let Some(col) = schema.column_def(key) else {
            continue;
        };
        if col.column_type == ColumnType::Vector {
            continue;
        }
        sets.push(format!("{} = ?{}", quote_ident(key)?, values.len() + 1));
        values.push(value_to_sql(col.column_type, value)?);
    }

    if !sets.is_empty() {
        let sql = format!(
            "UPDATE {table_ident} SET {} WHERE {pk_ident} = ?{}",
            sets.join(", "),
            values.len() + 1
        );
        values.push(Box::new(id));
        conn.execute(&sql, params_ref(&values).as_slice())
            .map_err(|e| to_storage_err(e.to_string()))?;
    }

    if let Some(vector) = &schema.vector {
        if let Some(Value::Vector(v)) = patch.get(&vector.column) {
            if v.len() != vector.dimension {
                return Err(DocstoreError::DimensionMismatch {
                    expected: vector.dimension,
                    actual: v.len(),
                });
            }
            vector_store::write(conn, schema, id, v)?;
        }
    }

    posting_list::remove(conn, schema, id)?;
    posting_list::write(conn, schema, id, &merged)?;

    let delta = approx_size(&merged) - approx_size(&existing.fields);
    stats::bump(conn, &schema.name, 0, delta)?;
    Ok(())
}

pub fn delete(conn: &Connection, schema: &TableSchema, id: RecordId) -> DocstoreResult<()> {
    let existing = get(conn, schema, id)?.ok_or_else(|| DocstoreError::NotFound {
        table: schema.name.clone(),
        id,
    })?;

    let table_ident = quote_ident(&schema.name)?;
    let pk_ident = quote_ident(&schema.primary_key)?;
    conn.execute(
        &format!("DELETE FROM {table_ident} WHERE {pk_ident} = ?1"),
        rusqlite::params![id],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;

    posting_list::remove(conn, schema, id)?;
    vector_store::remove(conn, schema, id)?;
    stats::bump(conn, &schema.name, -1, -approx_size(&existing.fields))?;
    Ok(())
}

pub fn upsert(conn: &Connection, schema: &TableSchema, record: &Record) -> DocstoreResult<RecordId> {
    if let Some(id) = record.get(&schema.primary_key).and_then(|v| v.as_f64()) {
        let id = id as RecordId;
        if get(conn, schema, id)?.is_some() {
            let mut patch = record.clone();
            patch.remove(&schema.primary_key);
            update(conn, schema, id, &patch)?;
            return Ok(id);
        }
    }
    let mut without_pk = record.clone();
    without_pk.remove(&schema.primary_key);
    insert(conn, schema, &without_pk)
}

/// Run a single-record write (`insert`/`update`/`delete`/`upsert`) inside
/// its own savepoint: the row write and its posting-list/vector-store/stats
/// side effects commit or roll back together, so e.g. a dimension mismatch
/// discovered while writing the vector entry leaves no partial row behind.
pub fn with_savepoint<T>(conn: &mut Connection, op: impl FnOnce(&Connection) -> DocstoreResult<T>) -> DocstoreResult<T> {
    let savepoint = conn.savepoint().map_err(|e| to_storage_err(e.to_string()))?;
    match op(&savepoint) {
        Ok(value) => {
            savepoint.commit().map_err(|e| to_storage_err(e.to_string()))?;
            Ok(value)
        }
        Err(err) => {
            let _ = savepoint.rollback();
            Err(err)
        }
    }
}

/// Run `op` for each item under its own savepoint, so one bad record
/// doesn't roll back the rest of the batch.
fn run_bulk<T>(conn: &mut Connection, items: Vec<T>, mut op: impl FnMut(&Connection, T) -> DocstoreResult<()>) -> BulkResult {
    let mut result = BulkResult::default();
    for (index, item) in items.into_iter().enumerate() {
        let savepoint = match conn.savepoint() {
            Ok(sp) => sp,
            Err(e) => {
                result.errors.push(BulkError {
                    index,
                    message: e.to_string(),
                });
                continue;
            }
        };
        match op(&savepoint, item) {
            Ok(()) => match savepoint.commit() {
                Ok(()) => result.success += 1,
                Err(e) => result.errors.push(BulkError {
                    index,
                    message: e.to_string(),
                }),
            },
            Err(e) => {
                let _ = savepoint.rollback();
                result.errors.push(BulkError {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }
    result
}

pub fn create_bulk(conn: &mut Connection, schema: &TableSchema, records: Vec<Record>) -> BulkResult {
    run_bulk(conn, records, |c, record| insert(c, schema, &record).map(|_| ()))
}

pub fn update_bulk(conn: &mut Connection, schema: &TableSchema, patches: Vec<(RecordId, Record)>) -> BulkResult {
    run_bulk(conn, patches, |c, (id, patch)| update(c, schema, id, &patch))
}

pub fn delete_bulk(conn: &mut Connection, schema: &TableSchema, ids: Vec<RecordId>) -> BulkResult {
    run_bulk(conn, ids, |c, id| delete(c, schema, id))
}
