//! Configuration for the hybrid retrieval index.

/// Configuration for a [`crate::RetrievalIndex`].
#[derive(Clone)]
pub struct RetrievalConfig {
    pub(crate) alpha: f32,
    pub(crate) enable_reranking: bool,
    pub(crate) max_chunk_size: usize,
    pub(crate) chunk_similarity_threshold: f32,
    pub(crate) default_top_k: usize,
    pub(crate) initial_retrieve: usize,
    pub(crate) embedding_dimension: usize,
    pub(crate) name: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            enable_reranking: false,
            max_chunk_size: 512,
            chunk_similarity_threshold: 0.5,
            default_top_k: 5,
            initial_retrieve: 20,
            embedding_dimension: 384,
            name: "retrieval-index".to_string(),
        }
    }
}

impl RetrievalConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Weight given to the dense (embedding) score in hybrid fusion; the
    /// lexical (BM25) score gets `1.0 - alpha`.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Whether a cross-encoder reranking pass runs over the fused top
    /// candidates before truncating to `top_k`.
    pub fn enable_reranking(&self) -> bool {
        self.enable_reranking
    }

    /// Maximum character length a semantically-grouped chunk may grow to
    /// before a new chunk is started.
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Minimum cosine similarity between a sentence and a chunk's running
    /// mean embedding for the sentence to join that chunk.
    pub fn chunk_similarity_threshold(&self) -> f32 {
        self.chunk_similarity_threshold
    }

    /// Default number of chunks returned by a query when not overridden
    /// per-request.
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Number of candidates kept after hybrid fusion, before an optional
    /// reranking pass truncates down to `top_k`.
    pub fn initial_retrieve(&self) -> usize {
        self.initial_retrieve
    }

    /// Embedding dimension fixed at construction; vectors of any other
    /// length are rejected.
    pub fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }

    /// Name of this index instance, used in metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`RetrievalConfig`].
#[derive(Default)]
pub struct RetrievalConfigBuilder {
    alpha: Option<f32>,
    enable_reranking: Option<bool>,
    max_chunk_size: Option<usize>,
    chunk_similarity_threshold: Option<f32>,
    default_top_k: Option<usize>,
    initial_retrieve: Option<usize>,
    embedding_dimension: Option<usize>,
    name: Option<String>,
}

impl RetrievalConfigBuilder {
    /// Sets the dense/lexical fusion weight.
    ///
    /// Default: 0.5
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Enables or disables cross-encoder reranking.
    ///
    /// Default: false
    pub fn enable_reranking(mut self, enabled: bool) -> Self {
        self.enable_reranking = Some(enabled);
        self
    }

    /// Sets the maximum character length per semantic chunk.
    ///
    /// Default: 512
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = Some(size);
        self
    }

    /// Sets the semantic chunking similarity threshold.
    ///
    /// Default: 0.5
    pub fn chunk_similarity_threshold(mut self, threshold: f32) -> Self {
        self.chunk_similarity_threshold = Some(threshold);
        self
    }

    /// Sets the default number of chunks returned per query.
    ///
    /// Default: 5
    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = Some(top_k);
        self
    }

    /// Sets the number of hybrid-fusion candidates kept before reranking.
    ///
    /// Default: 20
    pub fn initial_retrieve(mut self, initial_retrieve: usize) -> Self {
        self.initial_retrieve = Some(initial_retrieve);
        self
    }

    /// Sets the fixed embedding dimension for this index instance.
    ///
    /// Default: 384
    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = Some(dimension);
        self
    }

    /// Sets the name used in logs and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RetrievalConfig {
        let default = RetrievalConfig::default();
        RetrievalConfig {
            alpha: self.alpha.unwrap_or(default.alpha),
            enable_reranking: self.enable_reranking.unwrap_or(default.enable_reranking),
            max_chunk_size: self.max_chunk_size.unwrap_or(default.max_chunk_size),
            chunk_similarity_threshold: self
                .chunk_similarity_threshold
                .unwrap_or(default.chunk_similarity_threshold),
            default_top_k: self.default_top_k.unwrap_or(default.default_top_k),
            initial_retrieve: self
                .initial_retrieve
                .unwrap_or(default.initial_retrieve),
            embedding_dimension: self
                .embedding_dimension
                .unwrap_or(default.embedding_dimension),
            name: self.name.unwrap_or(default.name),
        }
    }
}
