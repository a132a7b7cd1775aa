//! Configuration for background backend health probing.

use std::time::Duration;

/// Configuration for a [`crate::HealthMonitor`].
#[derive(Clone)]
pub struct HealthCheckConfig {
    /// Interval between probes.
    pub(crate) interval: Duration,

    /// Initial delay before the first probe.
    pub(crate) initial_delay: Duration,

    /// Deadline a single probe is given to complete.
    pub(crate) timeout: Duration,

    /// Number of consecutive successes required to flip healthy.
    pub(crate) success_threshold: u32,

    /// Number of consecutive failures required to flip unhealthy.
    pub(crate) failure_threshold: u32,

    /// Name of the backend being probed, used in logs and metric labels.
    pub(crate) name: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            initial_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
            success_threshold: 1,
            failure_threshold: 3,
            name: "backend".to_string(),
        }
    }
}

impl HealthCheckConfig {
    /// Create a new builder.
    pub fn builder() -> HealthCheckConfigBuilder {
        HealthCheckConfigBuilder::default()
    }

    /// Get the probe interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Get the initial delay before the first probe.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Get the per-probe deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the success threshold.
    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// Get the failure threshold.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Get the backend name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`HealthCheckConfig`].
#[derive(Default)]
pub struct HealthCheckConfigBuilder {
    interval: Option<Duration>,
    initial_delay: Option<Duration>,
    timeout: Option<Duration>,
    success_threshold: Option<u32>,
    failure_threshold: Option<u32>,
    name: Option<String>,
}

impl HealthCheckConfigBuilder {
    /// Sets the interval between probes.
    ///
    /// Default: 10 seconds
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets the delay before the first probe runs.
    ///
    /// Default: 500 milliseconds
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Sets the deadline a single probe is given to complete.
    ///
    /// Default: 5 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of consecutive successes required to flip healthy.
    ///
    /// Default: 1
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = Some(threshold);
        self
    }

    /// Sets the number of consecutive failures required to flip unhealthy.
    ///
    /// Default: 3
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Sets the backend name used in logs and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> HealthCheckConfig {
        let default = HealthCheckConfig::default();
        HealthCheckConfig {
            interval: self.interval.unwrap_or(default.interval),
            initial_delay: self.initial_delay.unwrap_or(default.initial_delay),
            timeout: self.timeout.unwrap_or(default.timeout),
            success_threshold: self.success_threshold.unwrap_or(default.success_threshold),
            failure_threshold: self.failure_threshold.unwrap_or(default.failure_threshold),
            name: self.name.unwrap_or(default.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HealthCheckConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.initial_delay(), Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.success_threshold(), 1);
        assert_eq!(config.failure_threshold(), 3);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = HealthCheckConfig::builder()
            .interval(Duration::from_secs(30))
            .initial_delay(Duration::from_secs(1))
            .timeout(Duration::from_secs(2))
            .success_threshold(2)
            .failure_threshold(5)
            .name("gpu-a")
            .build();

        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.initial_delay(), Duration::from_secs(1));
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.success_threshold(), 2);
        assert_eq!(config.failure_threshold(), 5);
        assert_eq!(config.name(), "gpu-a");
    }
}
