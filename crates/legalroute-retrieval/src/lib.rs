//! Hybrid (lexical + dense) retrieval index.
//!
//! Each document gets one [`DocumentIndex`]: a per-document bundle of
//! chunks, a BM25 keyword index, and a row-normalised dense embedding
//! matrix. A query against it runs both scorers, fuses them with a
//! configurable weight, optionally reranks the fused top candidates with a
//! cross-encoder, and formats the winners as the `[Context n]` string the
//! inference orchestrator embeds into its prompt.
//!
//! Multiple documents are held in one [`RetrievalIndex`], keyed by document
//! id, with at most one marked as the default queried when the caller
//! doesn't name one. Rebuilding an existing document id swaps in a fresh
//! `Arc<DocumentIndex>` under the write lock; an in-flight retrieval that
//! already cloned the old `Arc` finishes against the old index rather than
//! being torn out from under it — the copy-on-write handoff recorded as a
//! deliberate choice in the design ledger.
//!
//! ## Example
//!
//! ```rust
//! use legalroute_retrieval::{HashEmbedder, RetrievalConfig, RetrievalIndex};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = RetrievalIndex::new(RetrievalConfig::builder().build(), Arc::new(HashEmbedder::new(32)));
//! index.index_document("The Security Deposit is $600.", "lease-1", true, None, None, true)?;
//! let context = index.context_for_llm("How much is the security deposit?", None, Some(1), Some(false))?;
//! assert!(context.contains("$600"));
//! # Ok(())
//! # }
//! ```

mod chunker;
mod config;
mod embedder;
mod error;
mod lexical;
mod vector;

pub use config::{RetrievalConfig, RetrievalConfigBuilder};
pub use embedder::{CrossEncoder, Embedder, HashEmbedder};
pub use error::{Result, RetrievalError};

use chunker::{semantic_chunk, sliding_window_chunk};
use lexical::{min_max_normalize, tokenize, Bm25Index};
use legalroute_core::{EventListeners, ResilienceEvent};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use vector::{hybrid_score, normalize, DenseIndex};

/// One chunk of a document, alongside its position in the chunk sequence.
/// A retrieval chunk: a contiguous span plus its dense
/// embedding and position index; the tokenised lexical form lives in the
/// owning [`DocumentIndex`]'s BM25 table rather than per-chunk, matching
/// `BM25Okapi`'s corpus-level term/document frequency state.
#[derive(Debug, Clone)]
pub struct RetrievalChunk {
    pub text: String,
    pub position: usize,
}

/// A single scored result from [`RetrievalIndex::query`].
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub text: String,
    pub chunk_index: usize,
    pub rank: usize,
    /// The score results were sorted by: the rerank score if reranking ran,
    /// otherwise the hybrid score.
    pub score: f32,
    pub hybrid_score: f32,
    pub bm25_score: f32,
    pub dense_score: f32,
}

/// Outcome of [`RetrievalIndex::index_document`], shaped for `/rag/index`.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub document_id: String,
    pub num_chunks: usize,
    pub is_default: bool,
    pub chunking_method: &'static str,
}

/// Per-document statistics, shaped for `/rag/documents` and `/rag/stats`.
#[derive(Debug, Clone)]
pub struct DocumentStats {
    pub document_id: String,
    pub is_indexed: bool,
    pub num_chunks: usize,
    pub alpha: f32,
    pub has_cross_encoder: bool,
}

/// Event emitted on indexing, deletion, and retrieval failure.
#[derive(Debug, Clone)]
pub struct RetrievalEvent {
    pub name: String,
    pub kind: RetrievalEventKind,
    timestamp: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalEventKind {
    DocumentIndexed { document_id: String, num_chunks: usize },
    DocumentDeleted { document_id: String },
    RetrievalFailed { document_id: String },
}

impl ResilienceEvent for RetrievalEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            RetrievalEventKind::DocumentIndexed { .. } => "document_indexed",
            RetrievalEventKind::DocumentDeleted { .. } => "document_deleted",
            RetrievalEventKind::RetrievalFailed { .. } => "retrieval_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn pattern_name(&self) -> &str {
        &self.name
    }
}

/// One document's hybrid index: chunks, BM25 table, and dense matrix.
///
/// Immutable once built; a rebuild constructs a fresh instance rather than
/// mutating this one, which is what makes the copy-on-write document-map
/// handoff safe.
struct DocumentIndex {
    document_id: String,
    chunks: Vec<String>,
    bm25: Bm25Index,
    dense: DenseIndex,
}

impl DocumentIndex {
    fn build(
        document_id: String,
        text: &str,
        use_semantic_chunking: bool,
        max_chunk_size: usize,
        similarity_threshold: f32,
        embedder: &dyn Embedder,
    ) -> Option<Self> {
        let sentences = chunker::split_sentences(text);
        if sentences.is_empty() {
            return None;
        }

        let raw_chunks = if use_semantic_chunking {
            let sentence_embeddings: Vec<Vec<f32>> =
                sentences.iter().map(|s| embedder.embed(s)).collect();
            semantic_chunk(&sentences, &sentence_embeddings, max_chunk_size, similarity_threshold)
        } else {
            sliding_window_chunk(&sentences, 3, 1)
        };

        if raw_chunks.is_empty() {
            return None;
        }

        let chunks: Vec<String> = raw_chunks.into_iter().map(|c| c.text).collect();
        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(c)).collect();
        let bm25 = Bm25Index::build(&tokenized);
        let embeddings: Vec<Vec<f32>> = chunks.iter().map(|c| embedder.embed(c)).collect();
        let dense = DenseIndex::build(embeddings);

        Some(Self {
            document_id,
            chunks,
            bm25,
            dense,
        })
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn query(
        &self,
        query: &str,
        top_k: usize,
        initial_retrieve: usize,
        alpha: f32,
        embedder: &dyn Embedder,
        cross_encoder: Option<&dyn CrossEncoder>,
    ) -> Vec<RetrievalResult> {
        let num_chunks = self.len();
        if num_chunks == 0 {
            return Vec::new();
        }
        let top_k = top_k.min(num_chunks).max(1);
        let initial_retrieve = initial_retrieve.min(num_chunks).max(1);

        let query_tokens = tokenize(query);
        let bm25_raw = self.bm25.scores(&query_tokens);
        let bm25_normalized = min_max_normalize(&bm25_raw);

        let mut query_embedding = embedder.embed(query);
        normalize(&mut query_embedding);
        let dense_raw = self.dense.scores(&query_embedding);
        let dense_normalized = min_max_normalize(&dense_raw);

        let mut hybrid: Vec<f32> = Vec::with_capacity(num_chunks);
        for i in 0..num_chunks {
            hybrid.push(hybrid_score(dense_normalized[i], bm25_normalized[i], alpha));
        }

        let mut order: Vec<usize> = (0..num_chunks).collect();
        order.sort_by(|&a, &b| hybrid[b].partial_cmp(&hybrid[a]).unwrap_or(std::cmp::Ordering::Equal));
        order.truncate(initial_retrieve);

        if let Some(encoder) = cross_encoder {
            let mut rerank_scores: Vec<(usize, f32)> = order
                .iter()
                .map(|&idx| (idx, encoder.score(query, &self.chunks[idx])))
                .collect();
            rerank_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            rerank_scores
                .into_iter()
                .take(top_k)
                .enumerate()
                .map(|(rank, (idx, rerank_score))| RetrievalResult {
                    text: self.chunks[idx].clone(),
                    chunk_index: idx,
                    rank: rank + 1,
                    score: rerank_score,
                    hybrid_score: hybrid[idx],
                    bm25_score: bm25_normalized[idx],
                    dense_score: dense_normalized[idx],
                })
                .collect()
        } else {
            order
                .into_iter()
                .take(top_k)
                .enumerate()
                .map(|(rank, idx)| RetrievalResult {
                    text: self.chunks[idx].clone(),
                    chunk_index: idx,
                    rank: rank + 1,
                    score: hybrid[idx],
                    hybrid_score: hybrid[idx],
                    bm25_score: bm25_normalized[idx],
                    dense_score: dense_normalized[idx],
                })
                .collect()
        }
    }
}

/// Hybrid retrieval index over zero or more named documents.
///
/// Cloning shares the underlying document map (`Arc`).
#[derive(Clone)]
pub struct RetrievalIndex {
    config: Arc<RetrievalConfig>,
    embedder: Arc<dyn Embedder>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    documents: Arc<RwLock<HashMap<String, Arc<DocumentIndex>>>>,
    default_document: Arc<RwLock<Option<String>>>,
    listeners: Arc<EventListeners<RetrievalEvent>>,
}

impl RetrievalIndex {
    /// Creates an empty index with no cross-encoder configured; reranking
    /// is a no-op regardless of the `use_reranking` flag until one is
    /// attached with [`RetrievalIndex::with_cross_encoder`].
    pub fn new(config: RetrievalConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            cross_encoder: None,
            documents: Arc::new(RwLock::new(HashMap::new())),
            default_document: Arc::new(RwLock::new(None)),
            listeners: Arc::new(EventListeners::new()),
        }
    }

    /// Attaches a cross-encoder used for the optional reranking pass.
    pub fn with_cross_encoder(mut self, cross_encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(cross_encoder);
        self
    }

    /// Registers a listener invoked on indexing, deletion, and retrieval
    /// failure.
    pub fn with_listener<L>(self, listener: L) -> Self
    where
        L: legalroute_core::EventListener<RetrievalEvent> + 'static,
    {
        let mut listeners = EventListeners::new();
        listeners.add(listener);
        Self {
            listeners: Arc::new(listeners),
            ..self
        }
    }

    /// Builds and stores an index for `document_id`, replacing any existing
    /// index under that id. The most recently indexed document becomes the
    /// default unless `set_as_default` is `false`.
    ///
    /// `max_chunk_size` and `similarity_threshold` override the instance
    /// config for this call only, matching the original deployment's
    /// per-request overrides on `/rag/index`.
    pub fn index_document(
        &self,
        text: &str,
        document_id: impl Into<String>,
        use_semantic_chunking: bool,
        max_chunk_size: Option<usize>,
        similarity_threshold: Option<f32>,
        set_as_default: bool,
    ) -> Result<IndexOutcome> {
        let document_id = document_id.into();
        let max_chunk_size = max_chunk_size.unwrap_or(self.config.max_chunk_size());
        let similarity_threshold =
            similarity_threshold.unwrap_or(self.config.chunk_similarity_threshold());

        let index = DocumentIndex::build(
            document_id.clone(),
            text,
            use_semantic_chunking,
            max_chunk_size,
            similarity_threshold,
            self.embedder.as_ref(),
        )
        .ok_or(RetrievalError::EmptyDocument)?;

        let num_chunks = index.len();

        {
            let mut documents = self.documents.write().expect("retrieval index map poisoned");
            documents.insert(document_id.clone(), Arc::new(index));
        }
        if set_as_default {
            let mut default = self.default_document.write().expect("default document lock poisoned");
            *default = Some(document_id.clone());
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            index = %self.config.name(),
            document_id = %document_id,
            num_chunks,
            "document indexed"
        );
        #[cfg(feature = "metrics")]
        metrics::counter!("retrieval_documents_indexed_total", "index" => self.config.name().to_string()).increment(1);

        self.listeners.emit(&RetrievalEvent {
            name: self.config.name().to_string(),
            kind: RetrievalEventKind::DocumentIndexed {
                document_id: document_id.clone(),
                num_chunks,
            },
            timestamp: Instant::now(),
        });

        Ok(IndexOutcome {
            document_id,
            num_chunks,
            is_default: set_as_default,
            chunking_method: if use_semantic_chunking { "semantic" } else { "simple" },
        })
    }

    /// Retrieves ranked chunks for `query` against `document_id` (or the
    /// default document if `None`). `top_k` and `use_reranking` default to
    /// the instance config when not given.
    pub fn query(
        &self,
        query: &str,
        document_id: Option<&str>,
        top_k: Option<usize>,
        use_reranking: Option<bool>,
    ) -> Result<Vec<RetrievalResult>> {
        let index = self.resolve(document_id)?;
        let top_k = top_k.unwrap_or(self.config.default_top_k());
        let use_reranking = use_reranking.unwrap_or(self.config.enable_reranking());
        let cross_encoder = if use_reranking {
            self.cross_encoder.as_deref()
        } else {
            None
        };

        Ok(index.query(
            query,
            top_k,
            self.config.initial_retrieve(),
            self.config.alpha(),
            self.embedder.as_ref(),
            cross_encoder,
        ))
    }

    /// Retrieves and formats the `[Context n]\n<text>` string the
    /// orchestrator embeds into its prompt. The retrieval
    /// *query* should be the last user message, not the serialised
    /// conversation — callers are responsible for that extraction before
    /// calling in.
    pub fn context_for_llm(
        &self,
        query: &str,
        document_id: Option<&str>,
        top_k: Option<usize>,
        use_reranking: Option<bool>,
    ) -> Result<String> {
        match self.query(query, document_id, top_k, use_reranking) {
            Ok(results) => Ok(format_context(&results)),
            Err(err) => {
                self.listeners.emit(&RetrievalEvent {
                    name: self.config.name().to_string(),
                    kind: RetrievalEventKind::RetrievalFailed {
                        document_id: document_id.unwrap_or("default").to_string(),
                    },
                    timestamp: Instant::now(),
                });
                Err(err)
            }
        }
    }

    /// True if an index exists for `document_id` (or a default exists, if
    /// `None`).
    pub fn has_index(&self, document_id: Option<&str>) -> bool {
        self.resolve(document_id).is_ok()
    }

    /// Per-document stats, shaped for `/rag/documents`.
    pub fn list_documents(&self) -> Vec<DocumentStats> {
        let documents = self.documents.read().expect("retrieval index map poisoned");
        documents
            .values()
            .map(|index| DocumentStats {
                document_id: index.document_id.clone(),
                is_indexed: true,
                num_chunks: index.len(),
                alpha: self.config.alpha(),
                has_cross_encoder: self.cross_encoder.is_some(),
            })
            .collect()
    }

    /// Deletes the index for `document_id`, clearing the default marker if
    /// it pointed at this document. Returns `true` if a document was
    /// removed.
    pub fn delete_document(&self, document_id: &str) -> bool {
        let removed = {
            let mut documents = self.documents.write().expect("retrieval index map poisoned");
            documents.remove(document_id).is_some()
        };
        if removed {
            let mut default = self.default_document.write().expect("default document lock poisoned");
            if default.as_deref() == Some(document_id) {
                *default = None;
            }

            #[cfg(feature = "tracing")]
            tracing::info!(index = %self.config.name(), document_id = %document_id, "document deleted");

            self.listeners.emit(&RetrievalEvent {
                name: self.config.name().to_string(),
                kind: RetrievalEventKind::DocumentDeleted {
                    document_id: document_id.to_string(),
                },
                timestamp: Instant::now(),
            });
        }
        removed
    }

    /// Number of currently indexed documents and the default document id,
    /// shaped for `/rag/stats`.
    pub fn stats(&self) -> (usize, Option<String>) {
        let documents = self.documents.read().expect("retrieval index map poisoned");
        let default = self.default_document.read().expect("default document lock poisoned");
        (documents.len(), default.clone())
    }

    fn resolve(&self, document_id: Option<&str>) -> Result<Arc<DocumentIndex>> {
        let documents = self.documents.read().expect("retrieval index map poisoned");
        match document_id {
            Some(id) => documents
                .get(id)
                .cloned()
                .ok_or_else(|| RetrievalError::DocumentNotFound {
                    document_id: id.to_string(),
                }),
            None => {
                drop(documents);
                let default = self.default_document.read().expect("default document lock poisoned");
                match default.as_ref() {
                    Some(id) => {
                        let documents = self.documents.read().expect("retrieval index map poisoned");
                        documents
                            .get(id)
                            .cloned()
                            .ok_or_else(|| RetrievalError::DocumentNotFound {
                                document_id: id.clone(),
                            })
                    }
                    None => Err(RetrievalError::DocumentNotFound {
                        document_id: "default".to_string(),
                    }),
                }
            }
        }
    }
}

/// Formats ranked results as `[Context n]\n<chunk-text>\n\n...`, the string
/// the inference orchestrator embeds verbatim into its prompt template.
fn format_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| format!("[Context {}]\n{}", r.rank, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
