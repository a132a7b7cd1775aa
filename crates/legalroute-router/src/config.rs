//! Environment-driven startup configuration.
//!
//! Every variable here is read once, at process start, into a typed
//! [`Config`]. There is no hot-reload; a changed environment requires a
//! restart, matching the process-wide-service-objects design note.

use std::net::SocketAddr;
use std::time::Duration;

/// Serving-tier configuration, read from the environment with documented
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub gpu_url: String,
    pub cpu_url: String,
    pub gpu_max_inflight: usize,
    pub backend_timeout: Duration,
    pub health_check_interval: Duration,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
    pub cache_similarity_threshold: f32,
    pub cache_ttl: Duration,
    pub embedding_dimension: usize,
    pub embedding_service_url: Option<String>,
    pub retrieval_alpha: f32,
    pub retrieval_bi_encoder_model: Option<String>,
    pub retrieval_cross_encoder_model: Option<String>,
    pub retrieval_enable_reranking: bool,
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            listen_addr: env_parse("LEGALROUTE_LISTEN_ADDR", ([127, 0, 0, 1], 3000).into()),
            gpu_url: env_string("LEGALROUTE_GPU_URL", "http://localhost:8001"),
            cpu_url: env_string("LEGALROUTE_CPU_URL", "http://localhost:8002"),
            gpu_max_inflight: env_parse("LEGALROUTE_GPU_MAX_INFLIGHT", 20),
            backend_timeout: Duration::from_secs(env_parse("LEGALROUTE_BACKEND_TIMEOUT_SECS", 60)),
            health_check_interval: Duration::from_secs(env_parse(
                "LEGALROUTE_HEALTH_CHECK_INTERVAL_SECS",
                10,
            )),
            circuit_breaker_failure_threshold: env_parse(
                "LEGALROUTE_CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                5,
            ),
            circuit_breaker_cooldown: Duration::from_secs(env_parse(
                "LEGALROUTE_CIRCUIT_BREAKER_COOLDOWN_SECS",
                30,
            )),
            cache_similarity_threshold: env_parse("LEGALROUTE_CACHE_SIMILARITY_THRESHOLD", 0.95),
            cache_ttl: Duration::from_secs(env_parse("LEGALROUTE_CACHE_TTL_SECS", 3600)),
            embedding_dimension: env_parse("LEGALROUTE_EMBEDDING_DIMENSION", 384),
            embedding_service_url: std::env::var("LEGALROUTE_EMBEDDING_SERVICE_URL").ok(),
            retrieval_alpha: env_parse("LEGALROUTE_RETRIEVAL_ALPHA", 0.5),
            retrieval_bi_encoder_model: std::env::var("LEGALROUTE_RETRIEVAL_BI_ENCODER").ok(),
            retrieval_cross_encoder_model: std::env::var("LEGALROUTE_RETRIEVAL_CROSS_ENCODER").ok(),
            retrieval_enable_reranking: env_parse("LEGALROUTE_RETRIEVAL_ENABLE_RERANKING", false),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_when_unset() {
        for key in [
            "LEGALROUTE_GPU_MAX_INFLIGHT",
            "LEGALROUTE_BACKEND_TIMEOUT_SECS",
            "LEGALROUTE_CIRCUIT_BREAKER_FAILURE_THRESHOLD",
            "LEGALROUTE_CIRCUIT_BREAKER_COOLDOWN_SECS",
            "LEGALROUTE_CACHE_SIMILARITY_THRESHOLD",
        ] {
            std::env::remove_var(key);
        }

        let config = Config::from_env();
        assert_eq!(config.gpu_max_inflight, 20);
        assert_eq!(config.backend_timeout, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker_failure_threshold, 5);
        assert_eq!(config.circuit_breaker_cooldown, Duration::from_secs(30));
        assert_eq!(config.cache_similarity_threshold, 0.95);
    }
}
