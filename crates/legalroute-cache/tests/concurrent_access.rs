//! Exercises `SemanticCache` as an external crate consumer would: many
//! concurrent tasks sharing one cache handle via `Arc`/`Clone`.

use legalroute_cache::{CacheConfig, CacheLookup, Embedder, SemanticCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct StubEmbedder {
    dimension: usize,
}

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            v[i % self.dimension] += byte as f32;
        }
        v
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

async fn wait_connected(cache: &SemanticCache) {
    for _ in 0..200 {
        if cache.store_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cache never connected");
}

#[tokio::test]
async fn concurrent_puts_and_gets_from_many_tasks_are_consistent() {
    let cache = SemanticCache::new(CacheConfig::builder().name("concurrency-cache").build());
    wait_connected(&cache).await;

    let mut handles = Vec::new();
    for i in 0..50 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.put(&format!("question-{i}"), 128, format!("answer-{i}"));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.stats().cache_entries, 50);

    let hits = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for i in 0..50 {
        let cache = cache.clone();
        let hits = Arc::clone(&hits);
        handles.push(tokio::spawn(async move {
            if let CacheLookup::Hit { value, semantic } = cache.get(&format!("question-{i}"), 128, None).await {
                assert!(!semantic);
                assert_eq!(value, format!("answer-{i}"));
                hits.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(hits.load(Ordering::SeqCst), 50);
    assert_eq!(cache.stats().hits_exact, 50);
}

#[tokio::test]
async fn semantic_lookup_is_safe_under_concurrent_writers() {
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder { dimension: 8 });
    let cache = SemanticCache::with_embedder(
        CacheConfig::builder()
            .embedding_dimension(8)
            .similarity_threshold(0.0)
            .name("concurrency-semantic-cache")
            .build(),
        Some(embedder),
    );
    wait_connected(&cache).await;
    for _ in 0..200 {
        if cache.embedding_available() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut writers = Vec::new();
    for i in 0..20 {
        let cache = cache.clone();
        writers.push(tokio::spawn(async move {
            cache.put(&format!("topic {i}"), 64, format!("reply {i}"));
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    // A lookup for an unseen-but-similar phrase should not panic or
    // deadlock while writers were still racing the store.
    let outcome = cache.get("topic 7ish", 64, Some(0.0)).await;
    assert!(matches!(outcome, CacheLookup::Hit { .. } | CacheLookup::Miss));
}

#[tokio::test]
async fn cleared_cache_stays_usable_for_new_entries() {
    let cache = SemanticCache::new(CacheConfig::builder().name("clear-cache").build());
    wait_connected(&cache).await;

    cache.put("first", 32, "a".to_string());
    cache.put("second", 32, "b".to_string());
    assert_eq!(cache.clear(), 2);

    cache.put("third", 32, "c".to_string());
    assert_eq!(
        cache.get("third", 32, None).await,
        CacheLookup::Hit { value: "c".to_string(), semantic: false }
    );
    assert_eq!(cache.get("first", 32, None).await, CacheLookup::Miss);
}
