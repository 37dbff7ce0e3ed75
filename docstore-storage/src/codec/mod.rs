//! Value <-> SQLite scalar codec.
//!
//! Every `Value` variant maps to exactly one SQLite storage class: strings
//! and JSON and dates as `TEXT`, numbers as `REAL`, booleans as `INTEGER`
//! 0/1, and vectors as a little-endian `f32` `BLOB`.

mod vector_bytes;

pub use vector_bytes::{bytes_to_f32_vec, f32_vec_to_bytes};

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::ToSql;

use docstore_core::column::ColumnType;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::record::Value;

/// A boxed `ToSql` for a single field, ready to bind into a prepared
/// statement.
pub fn value_to_sql(column_type: ColumnType, value: &Value) -> DocstoreResult<Box<dyn ToSql>> {
    match (column_type, value) {
        (_, Value::Null) => Ok(Box::new(Option::<i64>::None)),
        (ColumnType::String, Value::Text(s)) => Ok(Box::new(s.clone())),
        (ColumnType::Number, Value::Number(n)) => Ok(Box::new(*n)),
        (ColumnType::Boolean, Value::Bool(b)) => Ok(Box::new(*b as i64)),
        (ColumnType::Date, Value::Date(d)) => Ok(Box::new(d.to_rfc3339())),
        (ColumnType::Json, Value::Json(j)) => Ok(Box::new(
            serde_json::to_string(j).map_err(|e| DocstoreError::Validation {
                field: "json".into(),
                message: format!("could not serialize JSON value: {e}"),
            })?,
        )),
        (ColumnType::Vector, Value::Vector(v)) => Ok(Box::new(f32_vec_to_bytes(v))),
        (expected, actual) => Err(DocstoreError::Validation {
            field: "value".into(),
            message: format!(
                "column type {expected} does not accept value {actual:?}"
            ),
        }),
    }
}

/// Read a SQLite value back into its typed `Value` representation.
pub fn sql_to_value(column_type: ColumnType, raw: ValueRef<'_>) -> DocstoreResult<Value> {
    if matches!(raw, ValueRef::Null) {
        return Ok(Value::Null);
    }
    match column_type {
        ColumnType::String => match raw {
            ValueRef::Text(t) => Ok(Value::Text(
                String::from_utf8_lossy(t).into_owned(),
            )),
            other => type_err(column_type, other),
        },
        ColumnType::Number => match raw {
            ValueRef::Real(r) => Ok(Value::Number(r)),
            ValueRef::Integer(i) => Ok(Value::Number(i as f64)),
            other => type_err(column_type, other),
        },
        ColumnType::Boolean => match raw {
            ValueRef::Integer(i) => Ok(Value::Bool(i != 0)),
            other => type_err(column_type, other),
        },
        ColumnType::Date => match raw {
            ValueRef::Text(t) => {
                let s = String::from_utf8_lossy(t);
                let parsed = DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| DocstoreError::Validation {
                        field: "date".into(),
                        message: format!("stored date '{s}' is not RFC3339: {e}"),
                    })?
                    .with_timezone(&Utc);
                Ok(Value::Date(parsed))
            }
            other => type_err(column_type, other),
        },
        ColumnType::Json => match raw {
            ValueRef::Text(t) => {
                let s = String::from_utf8_lossy(t);
                let parsed: serde_json::Value =
                    serde_json::from_str(&s).map_err(|e| DocstoreError::Validation {
                        field: "json".into(),
                        message: format!("stored JSON is corrupt: {e}"),
                    })?;
                Ok(Value::Json(parsed))
            }
            other => type_err(column_type, other),
        },
        ColumnType::Vector => match raw {
            ValueRef::Blob(b) => Ok(Value::Vector(bytes_to_f32_vec(b))),
            other => type_err(column_type, other),
        },
    }
}

fn type_err(expected: ColumnType, actual: ValueRef<'_>) -> DocstoreResult<Value> {
    Err(DocstoreError::Validation {
        field: "value".into(),
        message: format!("column type {expected} does not match stored SQLite type {actual:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_roundtrips_through_real() {
        use rusqlite::types::{ToSqlOutput, Value as SqlValue};

        let sql = value_to_sql(ColumnType::Number, &Value::Number(3.5)).unwrap();
        let out = sql.to_sql().unwrap();
        match out {
            ToSqlOutput::Borrowed(ValueRef::Real(r)) => assert_eq!(r, 3.5),
            ToSqlOutput::Owned(SqlValue::Real(r)) => assert_eq!(r, 3.5),
            other => panic!("expected real, got {other:?}"),
        }
    }

    #[test]
    fn vector_roundtrips_through_bytes() {
        let original = vec![1.0_f32, -2.5, 0.0, 128.125];
        let bytes = f32_vec_to_bytes(&original);
        let restored = bytes_to_f32_vec(&bytes);
        assert_eq!(original, restored);
    }

    #[test]
    fn mismatched_column_type_is_rejected() {
        let err = value_to_sql(ColumnType::Number, &Value::Text("nope".into()));
        assert!(err.is_err());
    }
}
