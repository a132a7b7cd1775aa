//! Semantic response cache.
//!
//! Two lookup paths sit in front of an inference backend: an exact-match
//! path keyed by a SHA-256 fingerprint of `(assembled prompt, max_tokens)`,
//! and a fallback semantic path that embeds the prompt and scans live
//! entries sharing `max_tokens` for the highest cosine similarity above a
//! threshold. Either path returning a hit skips the backend entirely.
//!
//! Both the entry store and the embedding collaborator are modelled as
//! external dependencies that may not be reachable yet at any given moment.
//! A background task repeatedly attempts to (re)establish them and publishes
//! two lock-free flags — [`SemanticCache::store_connected`] and
//! [`SemanticCache::embedding_available`] — that the request path reads
//! without ever blocking on a connection attempt itself. Reconnect attempts
//! back off exponentially, the same shape `tower-resilience-reconnect` uses
//! for its connection state machine.
//!
//! ## Example
//!
//! ```rust
//! use legalroute_cache::{CacheConfig, CacheLookup, SemanticCache};
//!
//! # async fn example() {
//! let cache = SemanticCache::new(CacheConfig::builder().build());
//! // give the background connector a moment to mark the store connected
//! tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!
//! cache.put("what is promissory estoppel?", 256, "...".to_string());
//! match cache.get("what is promissory estoppel?", 256, None).await {
//!     CacheLookup::Hit { value, .. } => println!("{value}"),
//!     CacheLookup::Miss => println!("miss"),
//! }
//! # }
//! ```

mod config;
mod error;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use store::Embedder;

use legalroute_core::{EventListeners, ResilienceEvent};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::{cosine_similarity, normalize, Entry, EntryStore};
use tokio::task::JoinHandle;

/// Result of a [`SemanticCache::get`] lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A cached value was found, either by exact fingerprint or by semantic
    /// similarity above the configured threshold.
    Hit {
        value: String,
        /// `true` if this hit came from the similarity path rather than an
        /// exact fingerprint match.
        semantic: bool,
    },
    /// No usable entry was found, or the cache was unavailable.
    Miss,
}

/// Point-in-time cache statistics, shaped for the `/cache/stats` endpoint.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub connected: bool,
    pub cache_entries: usize,
    pub hits_exact: u64,
    pub hits_semantic: u64,
    pub misses: u64,
    pub semantic_caching_enabled: bool,
    pub similarity_threshold: f32,
    pub embedding_available: bool,
}

/// Event emitted on every lookup and on connection state changes.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub name: String,
    pub kind: CacheEventKind,
    timestamp: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEventKind {
    ExactHit,
    SemanticHit,
    Miss,
    StoreConnected,
    EmbeddingAvailable,
    EmbeddingUnavailable,
}

impl ResilienceEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            CacheEventKind::ExactHit => "exact_hit",
            CacheEventKind::SemanticHit => "semantic_hit",
            CacheEventKind::Miss => "miss",
            CacheEventKind::StoreConnected => "store_connected",
            CacheEventKind::EmbeddingAvailable => "embedding_available",
            CacheEventKind::EmbeddingUnavailable => "embedding_unavailable",
        }
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn pattern_name(&self) -> &str {
        &self.name
    }
}

struct ConnectionManager {
    store_connected: Arc<AtomicBool>,
    embedding_available: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawns the background connector. The in-process store always
    /// connects on the first tick; the embedder (if any) is polled for
    /// reachability on a steady-state interval once connected, falling back
    /// to exponential backoff while unreachable.
    fn spawn(
        name: String,
        embedder: Option<Arc<dyn Embedder>>,
        initial_backoff: Duration,
        max_backoff: Duration,
        listeners: Arc<EventListeners<CacheEvent>>,
    ) -> Self {
        let store_connected = Arc::new(AtomicBool::new(false));
        let embedding_available = Arc::new(AtomicBool::new(false));
        let task_store = Arc::clone(&store_connected);
        let task_embed = Arc::clone(&embedding_available);

        let handle = tokio::spawn(async move {
            let mut backoff = initial_backoff;
            loop {
                if !task_store.swap(true, Ordering::AcqRel) {
                    #[cfg(feature = "tracing")]
                    tracing::info!(cache = %name, "cache store connected");
                    listeners.emit(&CacheEvent {
                        name: name.clone(),
                        kind: CacheEventKind::StoreConnected,
                        timestamp: Instant::now(),
                    });
                }

                let reachable = embedder.as_ref().map(|e| e.dimension() > 0).unwrap_or(false);
                let was_available = task_embed.swap(reachable, Ordering::AcqRel);

                if reachable && !was_available {
                    #[cfg(feature = "tracing")]
                    tracing::info!(cache = %name, "embedding service available");
                    listeners.emit(&CacheEvent {
                        name: name.clone(),
                        kind: CacheEventKind::EmbeddingAvailable,
                        timestamp: Instant::now(),
                    });
                } else if !reachable && was_available {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(cache = %name, "embedding service unavailable");
                    listeners.emit(&CacheEvent {
                        name: name.clone(),
                        kind: CacheEventKind::EmbeddingUnavailable,
                        timestamp: Instant::now(),
                    });
                }

                #[cfg(feature = "metrics")]
                metrics::gauge!("cache_embedding_available", "cache" => name.clone())
                    .set(if reachable { 1.0 } else { 0.0 });

                if reachable || embedder.is_none() {
                    backoff = initial_backoff;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                } else {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
            }
        });

        Self {
            store_connected,
            embedding_available,
            handle,
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Semantic response cache sitting in front of an inference backend.
///
/// Cloning shares the underlying store and connection state (`Arc`).
#[derive(Clone)]
pub struct SemanticCache {
    config: Arc<CacheConfig>,
    store: Arc<EntryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    connection: Arc<ConnectionManager>,
    listeners: Arc<EventListeners<CacheEvent>>,
    hits_exact: Arc<AtomicU64>,
    hits_semantic: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl SemanticCache {
    /// Creates a cache with no embedding collaborator; only exact-match
    /// lookups will ever hit.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_embedder(config, None)
    }

    /// Creates a cache backed by the given embedder, enabling the semantic
    /// similarity lookup path once the embedder becomes reachable.
    pub fn with_embedder(config: CacheConfig, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let listeners = Arc::new(EventListeners::new());
        let connection = Arc::new(ConnectionManager::spawn(
            config.name().to_string(),
            embedder.clone(),
            config.reconnect_initial_backoff(),
            config.reconnect_max_backoff(),
            Arc::clone(&listeners),
        ));
        Self {
            config: Arc::new(config),
            store: Arc::new(EntryStore::new()),
            embedder,
            connection,
            listeners,
            hits_exact: Arc::new(AtomicU64::new(0)),
            hits_semantic: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers a listener invoked on cache hits, misses, and connection
    /// state changes.
    pub fn with_listener<L>(self, listener: L) -> Self
    where
        L: legalroute_core::EventListener<CacheEvent> + 'static,
    {
        let mut listeners = EventListeners::new();
        listeners.add(listener);
        Self {
            listeners: Arc::new(listeners),
            ..self
        }
    }

    /// Whether the backing entry store is connected. Read lock-free; never
    /// blocks on a connection attempt.
    pub fn store_connected(&self) -> bool {
        self.connection.store_connected.load(Ordering::Acquire)
    }

    /// Whether the embedding collaborator is currently reachable.
    pub fn embedding_available(&self) -> bool {
        self.connection.embedding_available.load(Ordering::Acquire)
    }

    /// Computes the exact-match fingerprint for `(prompt, max_tokens)`,
    /// matching the original deployment's `sha256(f"{prompt}:{max_tokens}")`
    /// keyed under a cache-specific prefix.
    pub fn fingerprint(prompt: &str, max_tokens: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update(b":");
        hasher.update(max_tokens.to_string().as_bytes());
        format!("legalroute:cache:{:x}", hasher.finalize())
    }

    /// Looks up a cached response for `prompt` at `max_tokens`.
    ///
    /// Tries the exact fingerprint first, then falls back to semantic
    /// similarity if an embedder is available and reachable. `threshold`
    /// overrides [`CacheConfig::similarity_threshold`] for this call only.
    /// Returns [`CacheLookup::Miss`] immediately, without attempting either
    /// path, if the store is not currently connected.
    pub async fn get(&self, prompt: &str, max_tokens: u32, threshold: Option<f32>) -> CacheLookup {
        if !self.store_connected() {
            return CacheLookup::Miss;
        }

        let fingerprint = Self::fingerprint(prompt, max_tokens);
        if let Some(entry) = self.store.get_exact(&fingerprint, self.config.ttl()) {
            self.record_hit(CacheEventKind::ExactHit, &self.hits_exact);
            return CacheLookup::Hit {
                value: entry.value,
                semantic: false,
            };
        }

        if !self.embedding_available() {
            self.record_miss();
            return CacheLookup::Miss;
        }
        let Some(embedder) = &self.embedder else {
            self.record_miss();
            return CacheLookup::Miss;
        };

        let mut query_embedding = embedder.embed(prompt);
        normalize(&mut query_embedding);
        let threshold = threshold.unwrap_or_else(|| self.config.similarity_threshold());
        let dimension = self.config.embedding_dimension();

        let mut best: Option<(f32, String)> = None;
        for (value, embedding) in self.store.candidates(max_tokens, self.config.ttl()) {
            if embedding.len() != dimension {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    cache = %self.config.name(),
                    expected = dimension,
                    actual = embedding.len(),
                    "skipping candidate with mismatched embedding dimension"
                );
                continue;
            }
            let similarity = cosine_similarity(&query_embedding, &embedding);
            if similarity >= threshold && best.as_ref().map(|(s, _)| similarity > *s).unwrap_or(true)
            {
                best = Some((similarity, value));
            }
        }

        match best {
            Some((_, value)) => {
                self.record_hit(CacheEventKind::SemanticHit, &self.hits_semantic);
                CacheLookup::Hit {
                    value,
                    semantic: true,
                }
            }
            None => {
                self.record_miss();
                CacheLookup::Miss
            }
        }
    }

    /// Stores `value` under the exact fingerprint for `(prompt, max_tokens)`,
    /// attaching an embedding when the embedder is currently reachable. A
    /// no-op if the store is not connected.
    pub fn put(&self, prompt: &str, max_tokens: u32, value: String) {
        if !self.store_connected() {
            return;
        }
        let embedding = if self.embedding_available() {
            self.embedder.as_ref().map(|embedder| {
                let mut v = embedder.embed(prompt);
                normalize(&mut v);
                v
            })
        } else {
            None
        };

        self.store.insert(
            Self::fingerprint(prompt, max_tokens),
            Entry {
                value,
                max_tokens,
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops every cached entry, returning the number removed.
    pub fn clear(&self) -> usize {
        let count = self.store.len();
        self.store.clear();
        count
    }

    /// Point-in-time statistics, shaped for the `/cache/stats` endpoint.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            connected: self.store_connected(),
            cache_entries: self.store.len(),
            hits_exact: self.hits_exact.load(Ordering::Relaxed),
            hits_semantic: self.hits_semantic.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            semantic_caching_enabled: self.embedder.is_some(),
            similarity_threshold: self.config.similarity_threshold(),
            embedding_available: self.embedding_available(),
        }
    }

    fn record_hit(&self, kind: CacheEventKind, counter: &Arc<AtomicU64>) {
        counter.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        {
            let kind_label = if kind == CacheEventKind::ExactHit { "exact" } else { "semantic" };
            metrics::counter!("cache_hits_total", "cache" => self.config.name().to_string(), "kind" => kind_label).increment(1);
        }
        self.listeners.emit(&CacheEvent {
            name: self.config.name().to_string(),
            kind,
            timestamp: Instant::now(),
        });
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("cache_misses_total", "cache" => self.config.name().to_string()).increment(1);
        self.listeners.emit(&CacheEvent {
            name: self.config.name().to_string(),
            kind: CacheEventKind::Miss,
            timestamp: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FixedEmbedder {
        vectors: std::collections::HashMap<String, Vec<f32>>,
        dimension: usize,
    }

    impl Embedder for FixedEmbedder {
        fn embed(&self, text: &str) -> Vec<f32> {
            self.vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    async fn wait_connected(cache: &SemanticCache) {
        for _ in 0..100 {
            if cache.store_connected() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache never connected");
    }

    async fn wait_embedding_available(cache: &SemanticCache) {
        for _ in 0..100 {
            if cache.embedding_available() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("embedding never became available");
    }

    #[tokio::test]
    async fn exact_hit_then_miss_for_different_key() {
        let cache = SemanticCache::new(CacheConfig::builder().build());
        wait_connected(&cache).await;

        cache.put("what is consideration?", 256, "an answer".to_string());
        assert_eq!(
            cache.get("what is consideration?", 256, None).await,
            CacheLookup::Hit {
                value: "an answer".to_string(),
                semantic: false,
            }
        );
        assert_eq!(
            cache.get("what is consideration?", 512, None).await,
            CacheLookup::Miss
        );
    }

    #[tokio::test]
    async fn ttl_expiry_causes_miss() {
        let cache =
            SemanticCache::new(CacheConfig::builder().ttl(Duration::from_nanos(1)).build());
        wait_connected(&cache).await;
        cache.put("q", 64, "a".to_string());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("q", 64, None).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn semantic_hit_above_threshold() {
        let mut vectors = std::collections::HashMap::new();
        vectors.insert("first question".to_string(), vec![1.0, 0.0]);
        vectors.insert("near duplicate question".to_string(), vec![0.99, 0.14]);
        let embedder = Arc::new(FixedEmbedder {
            vectors,
            dimension: 2,
        });

        let cache = SemanticCache::with_embedder(
            CacheConfig::builder()
                .embedding_dimension(2)
                .similarity_threshold(0.9)
                .build(),
            Some(embedder),
        );
        wait_connected(&cache).await;
        wait_embedding_available(&cache).await;

        cache.put("first question", 256, "cached answer".to_string());

        match cache.get("near duplicate question", 256, None).await {
            CacheLookup::Hit { value, semantic } => {
                assert!(semantic);
                assert_eq!(value, "cached answer");
            }
            CacheLookup::Miss => panic!("expected a semantic hit"),
        }
    }

    #[tokio::test]
    async fn semantic_miss_below_threshold() {
        let mut vectors = std::collections::HashMap::new();
        vectors.insert("first question".to_string(), vec![1.0, 0.0]);
        vectors.insert("unrelated question".to_string(), vec![0.0, 1.0]);
        let embedder = Arc::new(FixedEmbedder {
            vectors,
            dimension: 2,
        });

        let cache = SemanticCache::with_embedder(
            CacheConfig::builder()
                .embedding_dimension(2)
                .similarity_threshold(0.9)
                .build(),
            Some(embedder),
        );
        wait_connected(&cache).await;
        wait_embedding_available(&cache).await;

        cache.put("first question", 256, "cached answer".to_string());
        assert_eq!(
            cache.get("unrelated question", 256, None).await,
            CacheLookup::Miss
        );
    }

    #[tokio::test]
    async fn clear_empties_store_and_reports_len() {
        let cache = SemanticCache::new(CacheConfig::builder().build());
        wait_connected(&cache).await;
        cache.put("a", 1, "x".to_string());
        cache.put("b", 1, "y".to_string());
        assert_eq!(cache.stats().cache_entries, 2);
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().cache_entries, 0);
    }

    #[tokio::test]
    async fn stats_reflects_hits_and_misses() {
        let cache = SemanticCache::new(CacheConfig::builder().build());
        wait_connected(&cache).await;
        cache.put("q", 64, "a".to_string());
        cache.get("q", 64, None).await;
        cache.get("missing", 64, None).await;

        let stats = cache.stats();
        assert_eq!(stats.hits_exact, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.connected);
        assert!(!stats.semantic_caching_enabled);
    }

    #[tokio::test]
    async fn listener_observes_hits_and_misses() {
        use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let cache = SemanticCache::new(CacheConfig::builder().build()).with_listener(
            legalroute_core::FnListener::new(move |_event: &CacheEvent| {
                count_clone.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );
        wait_connected(&cache).await;
        cache.put("q", 64, "a".to_string());
        cache.get("q", 64, None).await;
        cache.get("missing", 64, None).await;
        assert_eq!(count.load(AtomicOrdering::SeqCst), 2);
    }
}
