/// Storage-substrate errors: quota exhaustion, a corrupt store, or an IO
/// fault.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("substrate error: {message}")]
    Substrate { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("database corruption detected: {details}")]
    CorruptionDetected { details: String },

    #[error("connection pool exhausted: {active_connections} active connections")]
    ConnectionPoolExhausted { active_connections: usize },

    #[error("unknown table: {table}")]
    UnknownTable { table: String },

    #[error("quota exhausted")]
    QuotaExhausted,
}
