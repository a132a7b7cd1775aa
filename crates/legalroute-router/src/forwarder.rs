//! Backend forwarder: sends an assembled prompt to a GPU or CPU inference
//! backend over HTTP and classifies the outcome.

use reqwest::header::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Request body sent to a backend's `/infer` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BackendInferRequest {
    pub prompt: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Response body returned by a backend's `/infer` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendInferResponse {
    pub content: String,
}

/// A forwarded call that reached the backend and got an HTTP response.
#[derive(Debug, Clone)]
pub enum ForwardOutcome {
    /// Status < 500: a usable response, even if it's a 4xx the caller needs
    /// surfaced (e.g. a backend-side validation rejection).
    Success(BackendInferResponse),
    /// Status >= 500: the backend is up but failed to serve this request.
    /// Counted as a circuit-breaker failure.
    ServerError { status: reqwest::StatusCode, body: String },
}

/// A forwarded call that never got a usable HTTP response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned an unparsable response: {0}")]
    Malformed(String),
}

/// Headers that must not be copied across a proxy hop.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Returns `true` if `name` is a hop-by-hop header that a forwarder must
/// strip before relaying a request or response.
pub fn is_hop_by_hop_header(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Copies `inbound` into a fresh `HeaderMap` with hop-by-hop headers
/// dropped, ready to attach to the relayed request.
pub fn strip_hop_by_hop_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

/// Forwards assembled prompts to a single backend over HTTP.
pub struct BackendForwarder {
    client: reqwest::Client,
    base_url: String,
}

impl BackendForwarder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("backend http client configuration is always valid");
        Self { client, base_url: base_url.into() }
    }

    /// Sends `request` to this backend's `/infer` endpoint, relaying
    /// `query` verbatim and `headers` with hop-by-hop entries already
    /// stripped, and classifies the result.
    pub async fn forward(
        &self,
        request: &BackendInferRequest,
        query: &str,
        headers: &HeaderMap,
    ) -> Result<ForwardOutcome, ForwardError> {
        let mut url = format!("{}/infer", self.base_url.trim_end_matches('/'));
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }

        let mut builder = self.client.post(&url).json(request);
        for (name, value) in headers.iter() {
            if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
                builder = builder.header(name, value.clone());
            }
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                ForwardError::Timeout
            } else {
                ForwardError::Unreachable(err.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ForwardOutcome::ServerError { status, body });
        }

        let parsed: BackendInferResponse = response
            .json()
            .await
            .map_err(|err| ForwardError::Malformed(err.to_string()))?;
        Ok(ForwardOutcome::Success(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_hop_by_hop_headers_case_insensitively() {
        assert!(is_hop_by_hop_header("Connection"));
        assert!(is_hop_by_hop_header("TRANSFER-ENCODING"));
        assert!(is_hop_by_hop_header("keep-alive"));
        assert!(!is_hop_by_hop_header("content-type"));
        assert!(!is_hop_by_hop_header("authorization"));
    }

    #[test]
    fn strip_hop_by_hop_headers_drops_only_listed_names() {
        use reqwest::header::{HeaderValue, CONTENT_TYPE};

        let mut inbound = HeaderMap::new();
        inbound.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert(
            HeaderName::from_static("connection"),
            HeaderValue::from_static("keep-alive"),
        );
        inbound.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Bearer xyz"),
        );

        let stripped = strip_hop_by_hop_headers(&inbound);
        assert_eq!(stripped.len(), 2);
        assert!(stripped.contains_key(CONTENT_TYPE));
        assert!(stripped.contains_key("authorization"));
        assert!(!stripped.contains_key("connection"));
    }
}
