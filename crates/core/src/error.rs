//! Error types for ragdex.
//!
//! One enum covers every failure the index lifecycle can surface. Per-file
//! problems (`ExtractionFailure`) are recoverable inside a batch, readiness and
//! contention problems are retryable, and the rest are fatal to the operation.

use thiserror::Error;

/// Unified error type for ragdex.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single document could not be turned into text
    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    /// No index or embedding model is loaded yet
    #[error("Index not ready: {0}")]
    EmbeddingUnavailable(String),

    /// A vector does not have the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persisted snapshot could not be read back
    #[error("Snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Another write to the index is running
    #[error("Ingestion already in progress")]
    IngestionInProgress,

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the caller may simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingUnavailable(_) | AppError::IngestionInProgress
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::IngestionInProgress.is_retryable());
        assert!(AppError::EmbeddingUnavailable("loading".to_string()).is_retryable());
        assert!(!AppError::DimensionMismatch {
            expected: 384,
            actual: 3
        }
        .is_retryable());
        assert!(!AppError::SnapshotCorrupt("bad magic".to_string()).is_retryable());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 768");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
