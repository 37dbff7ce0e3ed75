mod crypto_error;
mod storage_error;
mod vector_error;

pub use crypto_error::CryptoError;
pub use storage_error::StorageError;
pub use vector_error::VectorError;

/// Top-level error taxonomy. Every fallible engine operation returns
/// `DocstoreResult<T>`.
#[derive(Debug, thiserror::Error)]
pub enum DocstoreError {
    #[error("validation failed at {field}: {message}")]
    Validation { field: String, message: String },

    #[error("record not found: table={table} id={id}")]
    NotFound { table: String, id: i64 },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("vector index error: {0}")]
    Vector(#[from] VectorError),

    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("authentication rejected operation {operation} on {table}")]
    Authentication { operation: String, table: String },

    #[error("rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("transient error: {reason}")]
    Transient { reason: String },

    #[error("permanent error: {reason}")]
    Permanent { reason: String },

    #[error("circuit open for operation {operation}")]
    CircuitOpen { operation: String },

    #[error("{0}")]
    Other(String),
}

/// Error classification used by the resilience layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
    Authentication,
    Validation,
    Storage,
    Network,
}

impl DocstoreError {
    /// A stable code string for callers that want to match without
    /// depending on variant shape.
    pub fn code(&self) -> &'static str {
        match self {
            DocstoreError::Validation { .. } => "VALIDATION_ERROR",
            DocstoreError::NotFound { .. } => "NOT_FOUND",
            DocstoreError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            DocstoreError::Storage(_) => "STORAGE_ERROR",
            DocstoreError::Vector(_) => "VECTOR_ERROR",
            DocstoreError::Crypto(_) => "CRYPTO_ERROR",
            DocstoreError::Network { .. } => "NETWORK_ERROR",
            DocstoreError::Authentication { .. } => "AUTHENTICATION_ERROR",
            DocstoreError::RateLimited { .. } => "RATE_LIMITED",
            DocstoreError::Transient { .. } => "TRANSIENT_ERROR",
            DocstoreError::Permanent { .. } => "PERMANENT_ERROR",
            DocstoreError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            DocstoreError::Other(_) => "ENGINE_ERROR",
        }
    }

    /// Classify for the resilience layer: only `Transient`, `Network`, and
    /// `Storage` are retried.
    pub fn classify(&self) -> ErrorClass {
        match self {
            DocstoreError::Validation { .. } => ErrorClass::Validation,
            DocstoreError::NotFound { .. } => ErrorClass::Permanent,
            DocstoreError::DimensionMismatch { .. } => ErrorClass::Validation,
            DocstoreError::Storage(_) => ErrorClass::Storage,
            DocstoreError::Vector(_) => ErrorClass::Storage,
            DocstoreError::Crypto(_) => ErrorClass::Permanent,
            DocstoreError::Network { .. } => ErrorClass::Network,
            DocstoreError::Authentication { .. } => ErrorClass::Authentication,
            DocstoreError::RateLimited { .. } => ErrorClass::Authentication,
            DocstoreError::Transient { .. } => ErrorClass::Transient,
            DocstoreError::Permanent { .. } => ErrorClass::Permanent,
            DocstoreError::CircuitOpen { .. } => ErrorClass::Permanent,
            DocstoreError::Other(_) => ErrorClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classify(),
            ErrorClass::Transient | ErrorClass::Network | ErrorClass::Storage
        )
    }
}

pub type DocstoreResult<T> = Result<T, DocstoreError>;
