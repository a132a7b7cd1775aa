//! Axum handlers for the router's HTTP surface.
//!
//! Each handler is a thin translation layer: parse the body, delegate to
//! the orchestrator/routing engine/cache/retrieval index, shape the typed
//! response. No routing, caching, or retrieval logic lives here.

use crate::error::RouterError;
use crate::forwarder::strip_hop_by_hop_headers;
use crate::models::*;
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use legalroute_cache::CacheLookup;
use legalroute_circuitbreaker::CircuitState;
use legalroute_retrieval::RetrievalError;
use serde_json::json;
use std::time::Instant;

/// Default `max_tokens` when the caller omits it.
const DEFAULT_MAX_TOKENS: u32 = 256;

/// `POST /infer`.
pub async fn infer(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(request): Json<InferRequest>,
) -> Result<Json<InferResponse>, RouterError> {
    let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    let messages = request.into_messages();
    crate::orchestrator::Orchestrator::validate(&messages, max_tokens, request.model.as_deref())?;

    let use_retrieval = request.use_retrieval.unwrap_or(false);
    let assembled = state.orchestrator.assemble(
        &messages,
        max_tokens,
        request.document_id.as_deref(),
        use_retrieval,
        request.retrieval_top_k,
    );

    let use_cache = request.use_cache.unwrap_or(true);
    if use_cache {
        if let CacheLookup::Hit { value, semantic } = state
            .orchestrator
            .lookup_cache(&assembled.cache_key_prompt, max_tokens, request.similarity_threshold)
            .await
        {
            metrics::counter!("router_cache_hits_total", "kind" => if semantic { "semantic" } else { "exact" })
                .increment(1);
            return Ok(Json(InferResponse {
                content: value,
                backend: "cache".to_string(),
                cached: true,
                cache_hit_kind: Some(if semantic { "semantic" } else { "exact" }.to_string()),
                retrieval_used: assembled.retrieval_used,
                fallback_reason: None,
            }));
        }
    }

    let prefer_gpu = request.prefer_gpu.unwrap_or(true);
    let forward_headers = strip_hop_by_hop_headers(&headers);
    let raw_query = query.unwrap_or_default();

    let start = Instant::now();
    let outcome = state
        .routing
        .dispatch(
            &assembled.generator_prompt,
            max_tokens,
            request.model.clone(),
            &raw_query,
            &forward_headers,
            prefer_gpu,
        )
        .await;
    let elapsed = start.elapsed();

    metrics::histogram!("router_request_duration_seconds", "backend" => outcome.backend.as_str())
        .record(elapsed.as_secs_f64());
    metrics::counter!("router_requests_total", "backend" => outcome.backend.as_str()).increment(1);
    if let Some(reason) = outcome.fallback_reason {
        metrics::counter!("router_fallback_total", "reason" => reason.as_str()).increment(1);
    }

    match outcome.result {
        Ok(content) => {
            metrics::counter!("router_tokens_generated_total").increment(max_tokens as u64);
            if use_cache {
                state.orchestrator.store_cache(&assembled.cache_key_prompt, max_tokens, content.clone());
            }
            Ok(Json(InferResponse {
                content,
                backend: outcome.backend.as_str().to_string(),
                cached: false,
                cache_hit_kind: None,
                retrieval_used: assembled.retrieval_used,
                fallback_reason: outcome.fallback_reason.map(|r| r.as_str().to_string()),
            }))
        }
        Err(dispatch_error) => Err(dispatch_error.into()),
    }
}

impl From<crate::routing::DispatchError> for RouterError {
    fn from(err: crate::routing::DispatchError) -> Self {
        match err {
            crate::routing::DispatchError::Timeout => RouterError::BackendTimeout,
            crate::routing::DispatchError::Unreachable => RouterError::BackendUnreachable,
            crate::routing::DispatchError::ServerError { status, body } => {
                RouterError::BackendInternal { status, body }
            }
        }
    }
}

/// `POST /rag/index`.
pub async fn rag_index(
    State(state): State<AppState>,
    Json(request): Json<IndexDocumentRequest>,
) -> Result<Json<IndexDocumentResponse>, ApiError> {
    let use_semantic_chunking = request.use_semantic_chunking.unwrap_or(true);
    let set_as_default = request.set_as_default.unwrap_or(true);

    let outcome = state
        .retrieval
        .index_document(
            &request.text,
            request.document_id,
            use_semantic_chunking,
            request.max_chunk_size,
            request.similarity_threshold,
            set_as_default,
        )
        .map_err(ApiError::from_retrieval)?;

    Ok(Json(IndexDocumentResponse {
        document_id: outcome.document_id,
        num_chunks: outcome.num_chunks,
        is_default: outcome.is_default,
        chunking_method: outcome.chunking_method,
    }))
}

/// `POST /rag/query`.
pub async fn rag_query(
    State(state): State<AppState>,
    Json(request): Json<RagQueryRequest>,
) -> Result<Json<RagQueryResponse>, ApiError> {
    let results = state
        .retrieval
        .query(&request.query, request.document_id.as_deref(), request.top_k, request.use_reranking)
        .map_err(ApiError::from_retrieval)?;

    let context = state
        .retrieval
        .context_for_llm(&request.query, request.document_id.as_deref(), request.top_k, request.use_reranking)
        .unwrap_or_default();

    let results = results
        .into_iter()
        .map(|r| RagQueryResult {
            text: r.text,
            chunk_index: r.chunk_index,
            rank: r.rank,
            score: r.score,
            hybrid_score: r.hybrid_score,
            bm25_score: r.bm25_score,
            dense_score: r.dense_score,
        })
        .collect();

    Ok(Json(RagQueryResponse { results, context }))
}

/// `GET /rag/documents`.
pub async fn rag_documents(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    let summaries = state
        .retrieval
        .list_documents()
        .into_iter()
        .map(|d| DocumentSummary {
            document_id: d.document_id,
            is_indexed: d.is_indexed,
            num_chunks: d.num_chunks,
            alpha: d.alpha,
            has_cross_encoder: d.has_cross_encoder,
        })
        .collect();
    Json(summaries)
}

/// `GET /rag/stats`.
pub async fn rag_stats(State(state): State<AppState>) -> Json<RetrievalStatsResponse> {
    let (num_documents, default_document) = state.retrieval.stats();
    Json(RetrievalStatsResponse { num_documents, default_document })
}

/// `DELETE /rag/documents/{id}`.
pub async fn rag_delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.retrieval.delete_document(&document_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(StatusCode::NOT_FOUND, format!("document '{document_id}' is not indexed")))
    }
}

/// `POST /cache/clear`.
pub async fn cache_clear(State(state): State<AppState>) -> Json<CacheClearResponse> {
    let entries_removed = state.cache.clear();
    Json(CacheClearResponse { entries_removed })
}

/// `GET /cache/stats`.
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.cache.stats();
    Json(CacheStatsResponse {
        connected: stats.connected,
        cache_entries: stats.cache_entries,
        hits_exact: stats.hits_exact,
        hits_semantic: stats.hits_semantic,
        misses: stats.misses,
        semantic_caching_enabled: stats.semantic_caching_enabled,
        similarity_threshold: stats.similarity_threshold,
        embedding_available: stats.embedding_available,
    })
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let gpu_health = state.routing.gpu_health().map(|h| h.status()).unwrap_or(legalroute_healthcheck::HealthStatus::Unknown);
    let gpu_in_flight = state.routing.gpu_gate().map(|g| g.in_flight()).unwrap_or(0);
    let gpu_available_permits = state.routing.gpu_gate().map(|g| g.available_permits()).unwrap_or(0);
    let cache_stats = state.cache.stats();

    Json(HealthResponse {
        gpu: health_status_str(gpu_health),
        cpu: "overflow",
        gpu_circuit_breaker: circuit_state_str(state.routing.gpu_breaker().state()),
        cpu_circuit_breaker: circuit_state_str(state.routing.cpu_breaker().state()),
        gpu_in_flight,
        gpu_available_permits,
        cache_connected: cache_stats.connected,
        cache_embedding_available: cache_stats.embedding_available,
    })
}

/// `GET /metrics`.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

fn health_status_str(status: legalroute_healthcheck::HealthStatus) -> &'static str {
    use legalroute_healthcheck::HealthStatus;
    match status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Degraded => "degraded",
        HealthStatus::Unhealthy => "unhealthy",
        HealthStatus::Unknown => "unknown",
    }
}

fn circuit_state_str(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    }
}

/// A minimal `(status, message)` error for the `/rag/*` and `/cache/*`
/// endpoints, which don't participate in the fallback/metrics machinery
/// `RouterError` exists for.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn from_retrieval(err: RetrievalError) -> Self {
        let status = match err {
            RetrievalError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,
            RetrievalError::EmptyDocument => StatusCode::BAD_REQUEST,
            RetrievalError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
        };
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}
