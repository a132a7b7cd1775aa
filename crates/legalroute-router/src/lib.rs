//! Library surface for the legalroute serving-tier binary.
//!
//! Split out from `main.rs` so integration tests can build an [`AppState`]
//! against fake backends and drive the real [`app`] router directly,
//! instead of exercising the process over the network.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod routing;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use state::AppState;

/// Builds the full Axum router, wiring every HTTP handler to
/// the shared [`AppState`].
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/infer", post(handlers::infer))
        .route("/rag/index", post(handlers::rag_index))
        .route("/rag/query", post(handlers::rag_query))
        .route("/rag/documents", get(handlers::rag_documents))
        .route("/rag/documents/{document_id}", delete(handlers::rag_delete_document))
        .route("/rag/stats", get(handlers::rag_stats))
        .route("/cache/clear", post(handlers::cache_clear))
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}
