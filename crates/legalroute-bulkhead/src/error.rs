//! Error types for the admission gate.

/// Errors that can occur when acquiring an admission permit.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum BulkheadError {
    /// No permit became available within the non-blocking deadline.
    #[error("admission gate is full: max concurrent calls ({max_concurrent_calls}) reached")]
    BulkheadFull {
        /// Maximum concurrent calls allowed.
        max_concurrent_calls: usize,
    },
}

/// Result type for admission-gate operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;
