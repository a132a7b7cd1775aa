//! Error types for the retrieval index.

/// Errors returned by [`crate::RetrievalIndex`] operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    /// No index exists for the given document id.
    #[error("document '{document_id}' is not indexed")]
    DocumentNotFound { document_id: String },

    /// `index_document` was called with text that produced no chunks.
    #[error("document text produced no chunks")]
    EmptyDocument,

    /// A query embedding did not match the index's configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
