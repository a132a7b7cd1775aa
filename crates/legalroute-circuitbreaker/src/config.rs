//! Configuration for the count-based circuit breaker.

use std::time::Duration;

/// Configuration for a single-backend circuit breaker.
///
/// Unlike a sliding-window/failure-rate breaker, this pattern counts raw
/// consecutive failures: the counter resets on any success and the circuit
/// opens the moment it reaches `failure_threshold`.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) cooldown: Duration,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// The consecutive-failure count that trips the breaker.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// How long the breaker stays open before admitting a half-open trial.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "circuit-breaker".to_string(),
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    inner: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self {
            inner: CircuitBreakerConfig::default(),
        }
    }
}

impl CircuitBreakerConfigBuilder {
    /// Sets the breaker's name, used in events and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Sets the number of consecutive failures that trips the breaker.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.inner.failure_threshold = threshold;
        self
    }

    /// Sets the time the breaker waits in the open state before allowing a
    /// half-open trial.
    ///
    /// Default: 30 seconds
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.inner.cooldown = cooldown;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CircuitBreakerConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold(), 5);
        assert_eq!(config.cooldown(), Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = CircuitBreakerConfig::builder()
            .name("gpu")
            .failure_threshold(3)
            .cooldown(Duration::from_secs(10))
            .build();
        assert_eq!(config.failure_threshold(), 3);
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert_eq!(config.name, "gpu");
    }
}
