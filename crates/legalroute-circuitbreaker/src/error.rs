use thiserror::Error;

/// Errors surfaced by [`crate::CircuitBreaker`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerError {
    /// The circuit is open; the caller must not dispatch to the backend.
    #[error("circuit is open; call not permitted")]
    Open,
}
