//! Single-writer, pooled-reader connection management.

mod pragmas;
mod read_pool;
mod write_connection;

pub use pragmas::{apply_pragmas, apply_read_pragmas, verify_wal_mode};
pub use read_pool::ReadPool;
pub use write_connection::WriteConnection;

use std::path::{Path, PathBuf};

use docstore_core::errors::DocstoreResult;

/// A database handle: one writer, a pool of readers.
///
/// `:memory:` substrates keep everything on the writer connection and back
/// a single-reader pool onto a copy of it, since in-memory SQLite databases
/// are private to the connection that created them.
pub struct ConnectionPool {
    pub writer: WriteConnection,
    pub readers: ReadPool,
    db_path: PathBuf,
    in_memory: bool,
}

impl ConnectionPool {
    pub fn open(path: impl AsRef<Path>) -> DocstoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        let writer = WriteConnection::open(&db_path)?;
        let readers = ReadPool::open(&db_path, ReadPool::default_size())?;
        Ok(Self {
            writer,
            readers,
            db_path,
            in_memory: false,
        })
    }

    pub fn open_in_memory() -> DocstoreResult<Self> {
        let writer = WriteConnection::open_in_memory()?;
        let readers = writer.with_conn_sync(|conn| ReadPool::open_in_memory_sharing(conn))?;
        Ok(Self {
            writer,
            readers,
            db_path: PathBuf::from(":memory:"),
            in_memory: true,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }
}
