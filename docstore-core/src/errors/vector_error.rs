/// Vector-index errors.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index build failed: {reason}")]
    BuildFailed { reason: String },

    #[error("unsupported distance metric for this index kind")]
    UnsupportedMetric,

    #[error("index is empty")]
    EmptyIndex,
}
