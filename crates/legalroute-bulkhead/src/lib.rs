//! Admission gate: bounded-concurrency permit pool for the GPU backend.
//!
//! The gate wraps a [`tokio::sync::Semaphore`] with a non-blocking
//! `try_acquire` that gives up after a short deadline rather than queueing —
//! excess load is expected to spill to the CPU fallback path, not wait in
//! line. The CPU backend does not use a gate at all; it is the overflow
//! lane and has no explicit limit.
//!
//! # Example
//!
//! ```rust
//! use legalroute_bulkhead::{AdmissionGate, BulkheadConfig};
//!
//! # async fn example() {
//! let gate = AdmissionGate::new(BulkheadConfig::builder().max_concurrent_calls(2).build());
//!
//! let permit = gate.try_acquire().await;
//! assert!(permit.is_ok());
//! // permit released on drop
//! # }
//! ```

pub mod config;
pub mod error;

pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::{BulkheadError, Result};

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded-concurrency admission gate for one backend.
#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    config: Arc<BulkheadConfig>,
}

impl AdmissionGate {
    /// Creates a new gate sized at `config.max_concurrent_calls()`.
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_calls())),
            config: Arc::new(config),
        }
    }

    /// Attempts to acquire a permit without blocking beyond
    /// `config.acquire_deadline()`. On success, the returned permit
    /// releases the slot when dropped — on every exit path, including a
    /// panicking request task.
    pub async fn try_acquire(&self) -> Result<OwnedSemaphorePermit> {
        let semaphore = Arc::clone(&self.semaphore);
        let deadline = self.config.acquire_deadline();
        let outcome = tokio::time::timeout(deadline, semaphore.acquire_owned()).await;

        match outcome {
            Ok(Ok(permit)) => {
                #[cfg(feature = "metrics")]
                self.record_permitted();
                Ok(permit)
            }
            _ => {
                #[cfg(feature = "metrics")]
                self.record_rejected();
                #[cfg(feature = "tracing")]
                tracing::debug!(gate = %self.config.name, "admission gate full, rejecting");
                Err(BulkheadError::BulkheadFull {
                    max_concurrent_calls: self.config.max_concurrent_calls(),
                })
            }
        }
    }

    /// Number of permits currently available (not in-flight).
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of requests currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent_calls() - self.available_permits()
    }

    #[cfg(feature = "metrics")]
    fn record_permitted(&self) {
        metrics::counter!("admission_gate_calls_permitted_total", "gate" => self.config.name.clone()).increment(1);
        metrics::gauge!("admission_gate_in_flight", "gate" => self.config.name.clone())
            .set(self.in_flight() as f64);
    }

    #[cfg(feature = "metrics")]
    fn record_rejected(&self) {
        metrics::counter!("admission_gate_calls_rejected_total", "gate" => self.config.name.clone()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn admits_up_to_capacity() {
        let gate = AdmissionGate::new(BulkheadConfig::builder().max_concurrent_calls(2).build());
        let p1 = gate.try_acquire().await.unwrap();
        let p2 = gate.try_acquire().await.unwrap();
        assert_eq!(gate.available_permits(), 0);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn rejects_beyond_capacity_without_blocking() {
        let gate = AdmissionGate::new(
            BulkheadConfig::builder()
                .max_concurrent_calls(1)
                .acquire_deadline(Duration::from_millis(1))
                .build(),
        );
        let _permit = gate.try_acquire().await.unwrap();

        let start = std::time::Instant::now();
        let result = gate.try_acquire().await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn permit_releases_on_drop() {
        let gate = AdmissionGate::new(BulkheadConfig::builder().max_concurrent_calls(1).build());
        {
            let _permit = gate.try_acquire().await.unwrap();
            assert_eq!(gate.available_permits(), 0);
        }
        assert_eq!(gate.available_permits(), 1);
    }

    #[tokio::test]
    async fn concurrent_acquisitions_never_exceed_capacity() {
        let gate = AdmissionGate::new(BulkheadConfig::builder().max_concurrent_calls(3).build());
        let mut permits = Vec::new();
        for _ in 0..3 {
            permits.push(gate.try_acquire().await.unwrap());
        }
        assert!(gate.try_acquire().await.is_err());
        assert_eq!(gate.in_flight(), 3);
    }
}
