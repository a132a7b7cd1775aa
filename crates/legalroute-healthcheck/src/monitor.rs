//! Background health monitor for a single backend.

use crate::checker::HealthChecker;
use crate::config::HealthCheckConfig;
use crate::HealthStatus;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Proactively probes one backend on a timer and exposes a lock-free
/// snapshot of its current health.
///
/// The routing engine reads [`HealthMonitor::status`] on the hot path; it
/// never triggers a probe itself and never blocks waiting for one. All
/// probing happens on the background task spawned by [`HealthMonitor::spawn`].
pub struct HealthMonitor {
    status: Arc<AtomicU8>,
    config: HealthCheckConfig,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawns the background probe loop and returns a handle to it.
    ///
    /// `resource` is handed to `checker` on every tick; it is typically a
    /// cheap cloneable client bound to one backend.
    pub fn spawn<T, C>(config: HealthCheckConfig, resource: T, checker: C) -> Self
    where
        T: Send + Sync + 'static,
        C: HealthChecker<T> + Send + Sync + 'static,
    {
        let status = Arc::new(AtomicU8::new(HealthStatus::Unknown.into()));
        let loop_status = Arc::clone(&status);
        let loop_config = config.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(loop_config.initial_delay()).await;

            let mut consecutive_successes: u32 = 0;
            let mut consecutive_failures: u32 = 0;
            let mut interval = tokio::time::interval(loop_config.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let outcome = tokio::time::timeout(
                    loop_config.timeout(),
                    checker.check(&resource),
                )
                .await;

                let probe_healthy = matches!(outcome, Ok(HealthStatus::Healthy));

                if probe_healthy {
                    consecutive_successes += 1;
                    consecutive_failures = 0;
                } else {
                    consecutive_failures += 1;
                    consecutive_successes = 0;
                }

                let current: HealthStatus = loop_status.load(Ordering::Acquire).into();

                let next = if current != HealthStatus::Healthy
                    && consecutive_successes >= loop_config.success_threshold()
                {
                    Some(HealthStatus::Healthy)
                } else if current == HealthStatus::Healthy
                    && consecutive_failures >= loop_config.failure_threshold()
                {
                    Some(HealthStatus::Unhealthy)
                } else {
                    None
                };

                if let Some(new_status) = next {
                    loop_status.store(new_status.into(), Ordering::Release);

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        backend = %loop_config.name(),
                        from = ?current,
                        to = ?new_status,
                        "backend health changed"
                    );

                    #[cfg(feature = "metrics")]
                    metrics::gauge!("backend_health", "backend" => loop_config.name().to_string())
                        .set(if new_status == HealthStatus::Healthy { 1.0 } else { 0.0 });
                }
            }
        });

        Self {
            status,
            config,
            handle,
        }
    }

    /// Lock-free snapshot of the current health status.
    ///
    /// Before the first probe completes this reads [`HealthStatus::Unknown`],
    /// which is treated as unusable by callers checking [`HealthStatus::is_usable`].
    pub fn status(&self) -> HealthStatus {
        self.status.load(Ordering::Acquire).into()
    }

    /// True if the backend is currently usable (healthy or degraded).
    pub fn is_usable(&self) -> bool {
        self.status().is_usable()
    }

    /// Name of the monitored backend.
    pub fn name(&self) -> &str {
        self.config.name()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[tokio::test]
    async fn flips_healthy_after_success_threshold() {
        let config = HealthCheckConfig::builder()
            .interval(Duration::from_millis(5))
            .initial_delay(Duration::from_millis(0))
            .success_threshold(2)
            .build();

        let monitor = HealthMonitor::spawn(config, (), |_: &()| async { HealthStatus::Healthy });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(monitor.status(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn flips_unhealthy_after_failure_threshold() {
        let config = HealthCheckConfig::builder()
            .interval(Duration::from_millis(5))
            .initial_delay(Duration::from_millis(0))
            .success_threshold(1)
            .failure_threshold(3)
            .build();

        let healthy = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&healthy);
        let monitor = HealthMonitor::spawn(config, (), move |_: &()| {
            let flag = Arc::clone(&flag);
            async move {
                if flag.load(Ordering::Acquire) {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(monitor.status(), HealthStatus::Healthy);

        healthy.store(false, Ordering::Release);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(monitor.status(), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn probe_timeout_counts_as_failure() {
        let config = HealthCheckConfig::builder()
            .interval(Duration::from_millis(5))
            .initial_delay(Duration::from_millis(0))
            .timeout(Duration::from_millis(1))
            .success_threshold(1)
            .failure_threshold(1)
            .build();

        let monitor = HealthMonitor::spawn(config, (), |_: &()| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            HealthStatus::Healthy
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(monitor.status(), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn unknown_is_not_usable_before_first_probe() {
        let config = HealthCheckConfig::builder()
            .interval(Duration::from_secs(60))
            .initial_delay(Duration::from_secs(60))
            .build();

        let monitor = HealthMonitor::spawn(config, (), |_: &()| async { HealthStatus::Healthy });
        assert_eq!(monitor.status(), HealthStatus::Unknown);
        assert!(!monitor.is_usable());
    }
}
