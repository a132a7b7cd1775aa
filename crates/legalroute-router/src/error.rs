//! Router-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors that can terminate an `/infer` request before a response body is
/// produced. Cache and retrieval unavailability are not represented here:
/// both degrade silently (logged, not propagated) per the orchestrator's
/// best-effort treatment of those dependencies.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("backend timed out")]
    BackendTimeout,

    #[error("backend unreachable")]
    BackendUnreachable,

    #[error("backend returned an error")]
    BackendInternal { status: StatusCode, body: String },

    #[error("generation failed: {0}")]
    GenerationFailure(String),
}

impl RouterError {
    fn kind(&self) -> &'static str {
        match self {
            RouterError::Validation(_) => "validation",
            RouterError::BackendTimeout => "backend_timeout",
            RouterError::BackendUnreachable => "backend_unreachable",
            RouterError::BackendInternal { .. } => "backend_internal",
            RouterError::GenerationFailure(_) => "generation_failure",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RouterError::Validation(_) => StatusCode::BAD_REQUEST,
            RouterError::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            RouterError::BackendUnreachable => StatusCode::BAD_GATEWAY,
            RouterError::BackendInternal { status, .. } => {
                if status.is_client_error() || status.is_server_error() {
                    *status
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            RouterError::GenerationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        metrics::counter!("router_errors_total", "kind" => self.kind()).increment(1);

        let status = self.status();
        let message = self.to_string();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = RouterError::Validation("messages must not be empty".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn timeout_maps_to_504() {
        assert_eq!(RouterError::BackendTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn unreachable_maps_to_502() {
        assert_eq!(RouterError::BackendUnreachable.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn backend_internal_preserves_original_status() {
        let err = RouterError::BackendInternal {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: "bad prompt".into(),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn backend_internal_falls_back_to_500_for_non_error_status() {
        let err = RouterError::BackendInternal {
            status: StatusCode::OK,
            body: "unexpected".into(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
