//! Configuration for the admission gate.

use std::time::Duration;

/// Configuration for an [`crate::AdmissionGate`].
#[derive(Clone)]
pub struct BulkheadConfig {
    pub(crate) max_concurrent_calls: usize,
    pub(crate) acquire_deadline: Duration,
    pub(crate) name: String,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Maximum number of in-flight calls the gate admits.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// How long a `try_acquire` call waits before giving up.
    pub fn acquire_deadline(&self) -> Duration {
        self.acquire_deadline
    }
}

/// Builder for [`BulkheadConfig`].
pub struct BulkheadConfigBuilder {
    max_concurrent_calls: usize,
    acquire_deadline: Duration,
    name: String,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent_calls: 20,
            acquire_deadline: Duration::from_millis(1),
            name: "admission-gate".to_string(),
        }
    }

    /// Sets the maximum number of concurrent calls.
    ///
    /// Default: 20 (matches `gpu_max_inflight` in the router's config)
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Sets how long `try_acquire` is willing to wait for a free permit.
    ///
    /// Default: 1 millisecond. This is not a queueing mechanism, just enough
    /// slack to absorb a permit being released mid-poll.
    pub fn acquire_deadline(mut self, deadline: Duration) -> Self {
        self.acquire_deadline = deadline;
        self
    }

    /// Sets the name of this gate instance, used in metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BulkheadConfig {
        BulkheadConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            acquire_deadline: self.acquire_deadline,
            name: self.name,
        }
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BulkheadConfig::builder().build();
        assert_eq!(config.max_concurrent_calls(), 20);
        assert_eq!(config.acquire_deadline(), Duration::from_millis(1));
    }
}
