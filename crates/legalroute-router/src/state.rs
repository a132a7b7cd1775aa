//! Shared application state, wired once at startup.

use crate::config::Config;
use crate::forwarder::BackendForwarder;
use crate::orchestrator::Orchestrator;
use crate::routing::{BackendHandle, RoutingEngine};
use legalroute_bulkhead::{AdmissionGate, BulkheadConfig};
use legalroute_cache::{CacheConfig, SemanticCache};
use legalroute_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use legalroute_healthcheck::{HealthCheckConfig, HealthChecker, HealthMonitor, HealthStatus};
use legalroute_retrieval::{Embedder as RetrievalEmbedder, HashEmbedder, RetrievalConfig, RetrievalIndex};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Adapts [`legalroute_retrieval::HashEmbedder`] to [`legalroute_cache::Embedder`]
/// so the cache's semantic-similarity path shares the same fallback
/// embedding collaborator as the retrieval index, rather than each crate
/// needing its own concrete embedder implementation.
struct CacheEmbedder(HashEmbedder);

impl legalroute_cache::Embedder for CacheEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        self.0.embed(text)
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub routing: Arc<RoutingEngine>,
    pub orchestrator: Arc<Orchestrator>,
    pub cache: Arc<SemanticCache>,
    pub retrieval: Arc<RetrievalIndex>,
    pub metrics_handle: Arc<PrometheusHandle>,
}

struct BackendProbe {
    client: reqwest::Client,
    url: String,
}

impl BackendProbe {
    fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/health", base_url.trim_end_matches('/')),
        }
    }

    async fn check(&self) -> HealthStatus {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            _ => HealthStatus::Unhealthy,
        }
    }
}

fn health_checker() -> impl HealthChecker<BackendProbe> {
    |probe: &BackendProbe| {
        let client = probe.client.clone();
        let url = probe.url.clone();
        Box::pin(async move { BackendProbe { client, url }.check().await })
    }
}

impl AppState {
    pub fn build(config: &Config, metrics_handle: PrometheusHandle) -> Self {
        let health_config = HealthCheckConfig::builder()
            .interval(config.health_check_interval)
            .name("gpu-backend")
            .build();
        let gpu_health = Arc::new(HealthMonitor::spawn(
            health_config,
            BackendProbe::new(&config.gpu_url),
            health_checker(),
        ));

        let gpu_gate = AdmissionGate::new(
            BulkheadConfig::builder().max_concurrent_calls(config.gpu_max_inflight).name("gpu-gate").build(),
        );

        let gpu_breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(config.circuit_breaker_failure_threshold)
                .cooldown(config.circuit_breaker_cooldown)
                .name("gpu-breaker")
                .build(),
        );
        let cpu_breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(config.circuit_breaker_failure_threshold)
                .cooldown(config.circuit_breaker_cooldown)
                .name("cpu-breaker")
                .build(),
        );

        let gpu = BackendHandle {
            forwarder: BackendForwarder::new(&config.gpu_url, config.backend_timeout),
            breaker: gpu_breaker,
            health: Some(gpu_health),
            gate: Some(gpu_gate),
        };
        let cpu = BackendHandle {
            forwarder: BackendForwarder::new(&config.cpu_url, config.backend_timeout),
            breaker: cpu_breaker,
            health: None,
            gate: None,
        };

        let routing = Arc::new(RoutingEngine::new(gpu, cpu));

        let cache_config = CacheConfig::builder()
            .similarity_threshold(config.cache_similarity_threshold)
            .ttl(config.cache_ttl)
            .embedding_dimension(config.embedding_dimension)
            .name("router-cache")
            .build();
        let cache_embedder: Arc<dyn legalroute_cache::Embedder> =
            Arc::new(CacheEmbedder(HashEmbedder::new(config.embedding_dimension)));
        let cache = Arc::new(SemanticCache::with_embedder(cache_config, Some(cache_embedder)));

        let retrieval_config = RetrievalConfig::builder()
            .alpha(config.retrieval_alpha)
            .enable_reranking(config.retrieval_enable_reranking)
            .embedding_dimension(config.embedding_dimension)
            .name("router-retrieval")
            .build();
        let embedder = Arc::new(HashEmbedder::new(config.embedding_dimension));
        let retrieval = Arc::new(RetrievalIndex::new(retrieval_config, embedder));

        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&cache), Arc::clone(&retrieval)));

        Self { routing, orchestrator, cache, retrieval, metrics_handle: Arc::new(metrics_handle) }
    }
}
