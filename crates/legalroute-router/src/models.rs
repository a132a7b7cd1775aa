//! HTTP request/response bodies.

use serde::{Deserialize, Serialize};

/// A single turn in a chat-style conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// `POST /infer` request body. The envelope carries
/// *either* a bare `prompt` string *or* an ordered `messages` sequence;
/// [`InferRequest::into_messages`] normalises whichever was sent into the
/// single `Vec<Message>` shape the rest of the router works with.
#[derive(Debug, Clone, Deserialize)]
pub struct InferRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub use_retrieval: Option<bool>,
    #[serde(default)]
    pub retrieval_top_k: Option<usize>,
    #[serde(default)]
    pub use_cache: Option<bool>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Caller intent. `false` routes straight to CPU with
    /// no GPU attempt at all; defaults to `true` (let the routing engine
    /// decide).
    #[serde(default)]
    pub prefer_gpu: Option<bool>,
}

impl InferRequest {
    /// Normalises a bare `prompt` into a single-message `messages` list,
    /// or passes an explicit `messages` list through unchanged. A request
    /// with neither yields an empty list, which [`Orchestrator::validate`]
    /// rejects as a 400.
    ///
    /// [`Orchestrator::validate`]: crate::orchestrator::Orchestrator::validate
    pub fn into_messages(&self) -> Vec<Message> {
        if let Some(messages) = &self.messages {
            return messages.clone();
        }
        match &self.prompt {
            Some(prompt) => vec![Message { role: "user".to_string(), content: prompt.clone() }],
            None => Vec::new(),
        }
    }
}

/// `POST /infer` response body.
#[derive(Debug, Clone, Serialize)]
pub struct InferResponse {
    pub content: String,
    pub backend: String,
    pub cached: bool,
    pub cache_hit_kind: Option<String>,
    pub retrieval_used: bool,
    pub fallback_reason: Option<String>,
}

/// `POST /rag/index` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDocumentRequest {
    pub text: String,
    pub document_id: String,
    #[serde(default)]
    pub use_semantic_chunking: Option<bool>,
    #[serde(default)]
    pub max_chunk_size: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub set_as_default: Option<bool>,
}

/// `POST /rag/index` response body.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDocumentResponse {
    pub document_id: String,
    pub num_chunks: usize,
    pub is_default: bool,
    pub chunking_method: &'static str,
}

/// `POST /rag/query` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub use_reranking: Option<bool>,
}

/// A single ranked chunk in a `/rag/query` response.
#[derive(Debug, Clone, Serialize)]
pub struct RagQueryResult {
    pub text: String,
    pub chunk_index: usize,
    pub rank: usize,
    pub score: f32,
    pub hybrid_score: f32,
    pub bm25_score: f32,
    pub dense_score: f32,
}

/// `POST /rag/query` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RagQueryResponse {
    pub results: Vec<RagQueryResult>,
    /// The `[Context n]\n<chunk-text>\n\n...` string the retrieval index
    /// produces, the same format the inference orchestrator embeds into its
    /// prompt.
    pub context: String,
}

/// `GET /rag/documents` response entry.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub is_indexed: bool,
    pub num_chunks: usize,
    pub alpha: f32,
    pub has_cross_encoder: bool,
}

/// `GET /rag/stats` response body.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalStatsResponse {
    pub num_documents: usize,
    pub default_document: Option<String>,
}

/// `GET /cache/stats` response body.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub connected: bool,
    pub cache_entries: usize,
    pub hits_exact: u64,
    pub hits_semantic: u64,
    pub misses: u64,
    pub semantic_caching_enabled: bool,
    pub similarity_threshold: f32,
    pub embedding_available: bool,
}

/// `POST /cache/clear` response body.
#[derive(Debug, Clone, Serialize)]
pub struct CacheClearResponse {
    pub entries_removed: usize,
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub gpu: &'static str,
    pub cpu: &'static str,
    pub gpu_circuit_breaker: &'static str,
    pub cpu_circuit_breaker: &'static str,
    pub gpu_in_flight: usize,
    pub gpu_available_permits: usize,
    pub cache_connected: bool,
    pub cache_embedding_available: bool,
}
