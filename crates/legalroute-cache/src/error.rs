//! Error types for the semantic response cache.

/// Errors returned by [`crate::SemanticCache`] operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The backing store has not established a connection.
    #[error("cache store is not connected")]
    StoreUnavailable,

    /// A stored embedding's dimension did not match the index dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
