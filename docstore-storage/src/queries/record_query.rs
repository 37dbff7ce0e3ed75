//! Read access paths: full scan, indexed scan, predicate `find`, and
//! keyset-paginated `findPage` — the predicate-only access path; hybrid
//! lexical/vector fusion lives in `docstore-query`.

use rusqlite::{Connection, ToSql};

use docstore_core::column::ColumnType;
use docstore_core::errors::DocstoreResult;
use docstore_core::query::{Cursor, Direction, FindOptions, Predicate};
use docstore_core::record::{Record, RecordId, StoredRecord, Value};
use docstore_core::schema::TableSchema;
use docstore_core::traits::Page;

use crate::codec::{sql_to_value, value_to_sql};
use crate::substrate::ddl::quote_ident;
use crate::to_storage_err;

use super::vector_store;

const DEFAULT_PAGE_SIZE: usize = docstore_core::constants::SEARCH_FETCH_BATCH_SIZE;

fn row_columns(schema: &TableSchema) -> impl Iterator<Item = &docstore_core::schema::ColumnDef> {
    schema
        .columns
        .iter()
        .filter(move |c| c.name != schema.primary_key && c.column_type != ColumnType::Vector)
}

fn column_type_of(schema: &TableSchema, field: &str) -> Option<ColumnType> {
    if field == schema.primary_key {
        return Some(ColumnType::Number);
    }
    schema.column_def(field).map(|c| c.column_type)
}

fn hydrate(conn: &Connection, schema: &TableSchema, row: &rusqlite::Row<'_>, cols: &[&docstore_core::schema::ColumnDef]) -> DocstoreResult<StoredRecord> {
    let id: RecordId = row.get(0).map_err(|e| to_storage_err(e.to_string()))?;
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
    Ok(StoredRecord { id, fields })
}

fn select_prefix(schema: &TableSchema, cols: &[&docstore_core::schema::ColumnDef]) -> DocstoreResult<(String, String)> {
    let table_ident = quote_ident(&schema.name)?;
    let pk_ident = quote_ident(&schema.primary_key)?;
    let select_list: Vec<String> = cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<DocstoreResult<_>>()?;
    let sql = if select_list.is_empty() {
        format!("SELECT {pk_ident} FROM {table_ident}")
    } else {
        format!("SELECT {pk_ident}, {} FROM {table_ident}", select_list.join(", "))
    };
    Ok((sql, pk_ident))
}

pub fn get_all(conn: &Connection, schema: &TableSchema, limit: Option<usize>) -> DocstoreResult<Vec<StoredRecord>> {
    let cols: Vec<_> = row_columns(schema).collect();
    let (select, pk_ident) = select_prefix(schema, &cols)?;
    let mut sql = format!("{select} ORDER BY {pk_ident} ASC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    run_select(conn, schema, &sql, &cols, &[])
}

pub fn scan_all(conn: &Connection, schema: &TableSchema) -> DocstoreResult<Vec<StoredRecord>> {
    get_all(conn, schema, None)
}

pub fn scan_index(
    conn: &Connection,
    schema: &TableSchema,
    field: &str,
    from: Option<&Value>,
    to: Option<&Value>,
    direction: Direction,
) -> DocstoreResult<Vec<StoredRecord>> {
    let column_type = column_type_of(schema, field).ok_or_else(|| docstore_core::errors::DocstoreError::Validation {
        field: field.into(),
        message: "unknown column".into(),
    })?;
    let cols: Vec<_> = row_columns(schema).collect();
    let (select, _) = select_prefix(schema, &cols)?;
    let field_ident = quote_ident(field)?;

    let mut clauses = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(from) = from {
        clauses.push(format!("{field_ident} >= ?{}", values.len() + 1));
        values.push(value_to_sql(column_type, from)?);
    }
    if let Some(to) = to {
        clauses.push(format!("{field_ident} <= ?{}", values.len() + 1));
        values.push(value_to_sql(column_type, to)?);
    }

    let dir = match direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    let mut sql = select;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {field_ident} {dir}"));

    run_select(conn, schema, &sql, &cols, &values)
}

pub fn find(conn: &Connection, schema: &TableSchema, opts: &FindOptions) -> DocstoreResult<Vec<StoredRecord>> {
    let cols: Vec<_> = row_columns(schema).collect();
    let (select, pk_ident) = select_prefix(schema, &cols)?;

    let mut clauses = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    for (field, predicate) in &opts.where_ {
        let column_type = column_type_of(schema, field).ok_or_else(|| docstore_core::errors::DocstoreError::Validation {
            field: field.clone(),
            message: "unknown column".into(),
        })?;
        let field_ident = quote_ident(field)?;
        let clause = match predicate {
            Predicate::Eq(v) => {
                values.push(value_to_sql(column_type, v)?);
                format!("{field_ident} = ?{}", values.len())
            }
            Predicate::Gt(v) => {
                values.push(value_to_sql(column_type, v)?);
                format!("{field_ident} > ?{}", values.len())
            }
            Predicate::Gte(v) => {
                values.push(value_to_sql(column_type, v)?);
                format!("{field_ident} >= ?{}", values.len())
            }
            Predicate::Lt(v) => {
                values.push(value_to_sql(column_type, v)?);
                format!("{field_ident} < ?{}", values.len())
            }
            Predicate::Lte(v) => {
                values.push(value_to_sql(column_type, v)?);
                format!("{field_ident} <= ?{}", values.len())
            }
            Predicate::In(vs) => {
                let mut placeholders = Vec::with_capacity(vs.len());
                for v in vs {
                    values.push(value_to_sql(column_type, v)?);
                    placeholders.push(format!("?{}", values.len()));
                }
                format!("{field_ident} IN ({})", placeholders.join(", "))
            }
        };
        clauses.push(clause);
    }

    let mut sql = select;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    match &opts.order_by {
        Some(order) => {
            let field_ident = if order.field == schema.primary_key {
                pk_ident.clone()
            } else {
                quote_ident(&order.field)?
            };
            let dir = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {field_ident} {dir}"));
        }
        None => sql.push_str(&format!(" ORDER BY {pk_ident} ASC")),
    }

    if let Some(limit) = opts.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = opts.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    run_select(conn, schema, &sql, &cols, &values)
}

/// Keyset-paginated `find`: ignores `offset` (keyset and offset pagination
/// don't mix) and always orders by primary key so the cursor stays valid.
pub fn find_page(conn: &Connection, schema: &TableSchema, opts: &FindOptions) -> DocstoreResult<Page> {
    let mut effective = opts.clone();
    effective.offset = None;
    effective.order_by = Some(docstore_core::query::OrderBy {
        field: schema.primary_key.clone(),
        direction: Direction::Asc,
    });

    if let Some(token) = &opts.cursor {
        let cursor = Cursor::decode(token).ok_or_else(|| docstore_core::errors::DocstoreError::Validation {
            field: "cursor".into(),
            message: "malformed pagination cursor".into(),
        })?;
        effective
            .where_
            .push((schema.primary_key.clone(), Predicate::Gt(Value::Number(cursor.last_id as f64))));
    }

    let page_size = opts.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    effective.limit = Some(page_size + 1);

    let mut data = find(conn, schema, &effective)?;
    let next_cursor = if data.len() > page_size {
        data.truncate(page_size);
        data.last().map(|r| Cursor { last_id: r.id })
    } else {
        None
    };

    Ok(Page { data, next_cursor })
}

fn run_select(
    conn: &Connection,
    schema: &TableSchema,
    sql: &str,
    cols: &[&docstore_core::schema::ColumnDef],
    values: &[Box<dyn ToSql>],
) -> DocstoreResult<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(sql).map_err(|e| to_storage_err(e.to_string()))?;
    let params: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let mut rows = stmt
        .query(params.as_slice())
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(|e| to_storage_err(e.to_string()))? {
        out.push(hydrate(conn, schema, row, cols)?);
    }
    Ok(out)
}
