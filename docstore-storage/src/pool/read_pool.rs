//! A fixed-size round-robin pool of read-only connections.
//!
//! WAL mode lets readers run concurrently with the single writer without
//! blocking, so a handful of long-lived connections is enough to absorb
//! concurrent read traffic without reopening the database per query.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use docstore_core::errors::DocstoreResult;

use super::pragmas::apply_read_pragmas;
use crate::to_storage_err;

const DEFAULT_POOL_SIZE: usize = 4;

pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn default_size() -> usize {
        DEFAULT_POOL_SIZE
    }

    pub fn open(path: &Path, size: usize) -> DocstoreResult<Self> {
        let mut conns = Vec::with_capacity(size.max(1));
        for _ in 0..size.max(1) {
            let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
            apply_read_pragmas(&conn)?;
            conns.push(Mutex::new(conn));
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    /// `:memory:` connections can't be shared across handles, so the pool
    /// degrades to a single connection shared by every "reader".
    pub fn open_in_memory_sharing(conn: &Connection) -> DocstoreResult<Self> {
        let shared = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        // Copy schema+data from the writer so the single reader sees it.
        let backup = rusqlite::backup::Backup::new(conn, &shared)
            .map_err(|e| to_storage_err(e.to_string()))?;
        backup
            .run_to_completion(5, std::time::Duration::from_millis(0), None)
            .map_err(|e| to_storage_err(e.to_string()))?;
        Ok(Self {
            conns: vec![Mutex::new(shared)],
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.conns.len()
    }

    /// Borrow the next connection in round-robin order.
    pub fn with_conn<F, T>(&self, f: F) -> DocstoreResult<T>
    where
        F: FnOnce(&Connection) -> DocstoreResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let guard = self.conns[idx]
            .lock()
            .map_err(|e| to_storage_err(format!("reader lock poisoned: {e}")))?;
        f(&guard)
    }
}
