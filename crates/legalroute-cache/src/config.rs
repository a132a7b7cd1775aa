//! Configuration for the semantic response cache.

use std::time::Duration;

/// Configuration for a [`crate::SemanticCache`].
#[derive(Clone)]
pub struct CacheConfig {
    pub(crate) ttl: Duration,
    pub(crate) similarity_threshold: f32,
    pub(crate) embedding_dimension: usize,
    pub(crate) reconnect_initial_backoff: Duration,
    pub(crate) reconnect_max_backoff: Duration,
    pub(crate) name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            similarity_threshold: 0.95,
            embedding_dimension: 384,
            reconnect_initial_backoff: Duration::from_millis(200),
            reconnect_max_backoff: Duration::from_secs(30),
            name: "semantic-cache".to_string(),
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Default entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Minimum cosine similarity for a semantic match, absent a per-request override.
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Embedding dimension fixed at construction; vectors of any other length are skipped.
    pub fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
    }

    /// Name of this cache instance, used in metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`CacheConfig`].
#[derive(Default)]
pub struct CacheConfigBuilder {
    ttl: Option<Duration>,
    similarity_threshold: Option<f32>,
    embedding_dimension: Option<usize>,
    reconnect_initial_backoff: Option<Duration>,
    reconnect_max_backoff: Option<Duration>,
    name: Option<String>,
}

impl CacheConfigBuilder {
    /// Sets the entry TTL.
    ///
    /// Default: 3600 seconds
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the default similarity threshold for semantic matches.
    ///
    /// Default: 0.95
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Sets the fixed embedding dimension for this cache instance.
    ///
    /// Default: 384
    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = Some(dimension);
        self
    }

    /// Sets the initial backoff between failed reconnect attempts.
    ///
    /// Default: 200 milliseconds
    pub fn reconnect_initial_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_initial_backoff = Some(backoff);
        self
    }

    /// Sets the ceiling the reconnect backoff grows to.
    ///
    /// Default: 30 seconds
    pub fn reconnect_max_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_max_backoff = Some(backoff);
        self
    }

    /// Sets the name used in logs and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CacheConfig {
        let default = CacheConfig::default();
        CacheConfig {
            ttl: self.ttl.unwrap_or(default.ttl),
            similarity_threshold: self
                .similarity_threshold
                .unwrap_or(default.similarity_threshold),
            embedding_dimension: self
                .embedding_dimension
                .unwrap_or(default.embedding_dimension),
            reconnect_initial_backoff: self
                .reconnect_initial_backoff
                .unwrap_or(default.reconnect_initial_backoff),
            reconnect_max_backoff: self
                .reconnect_max_backoff
                .unwrap_or(default.reconnect_max_backoff),
            name: self.name.unwrap_or(default.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.similarity_threshold(), 0.95);
        assert_eq!(config.embedding_dimension(), 384);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = CacheConfig::builder()
            .ttl(Duration::from_secs(60))
            .similarity_threshold(0.9)
            .embedding_dimension(768)
            .name("rag-cache")
            .build();

        assert_eq!(config.ttl(), Duration::from_secs(60));
        assert_eq!(config.similarity_threshold(), 0.9);
        assert_eq!(config.embedding_dimension(), 768);
        assert_eq!(config.name(), "rag-cache");
    }
}
