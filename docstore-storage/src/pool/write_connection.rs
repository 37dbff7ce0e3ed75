//! The single writer connection. SQLite allows exactly one writer at a
//! time; serializing through a `Mutex` here is cheaper and more predictable
//! than fighting SQLITE_BUSY under WAL with multiple writer handles.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use docstore_core::errors::DocstoreResult;

use super::pragmas::apply_pragmas;
use crate::to_storage_err;

pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path) -> DocstoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> DocstoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        // WAL/auto_vacuum pragmas don't apply meaningfully to `:memory:`;
        // apply only what's valid there.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a closure with exclusive, mutable access to the writer
    /// connection (mutable so bulk operations can open savepoints).
    pub fn with_conn_sync<F, T>(&self, f: F) -> DocstoreResult<T>
    where
        F: FnOnce(&mut Connection) -> DocstoreResult<T>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| to_storage_err(format!("writer lock poisoned: {e}")))?;
        f(&mut guard)
    }
}
