//! In-process store backing the cache, and the embedding collaborator trait.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Produces a dense embedding for a piece of text.
///
/// Stands in for a co-located embedding service; a
/// real deployment wires a remote call here, tests use a deterministic
/// fallback.
pub trait Embedder: Send + Sync {
    /// Embeds `text`, returning a vector of [`Embedder::dimension`] length.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// The fixed dimension every embedding this instance produces has.
    fn dimension(&self) -> usize;
}

/// One cached value alongside the fields needed for semantic lookup.
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) value: String,
    pub(crate) max_tokens: u32,
    pub(crate) embedding: Option<Vec<f32>>,
    pub(crate) inserted_at: Instant,
}

impl Entry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Content-addressed store, keyed by exact fingerprint.
///
/// Backed by [`DashMap`] rather than an external key-value service, per the
/// scope decision recorded in the design ledger: a remote, cross-replica
/// store is out of scope for this serving tier.
#[derive(Default)]
pub(crate) struct EntryStore {
    entries: DashMap<String, Entry>,
}

impl EntryStore {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get_exact(&self, fingerprint: &str, ttl: Duration) -> Option<Entry> {
        let entry = self.entries.get(fingerprint)?;
        if entry.is_expired(ttl) {
            drop(entry);
            self.entries.remove(fingerprint);
            return None;
        }
        Some(entry.clone())
    }

    pub(crate) fn insert(&self, fingerprint: String, entry: Entry) {
        self.entries.insert(fingerprint, entry);
    }

    /// Scans all live entries sharing `max_tokens`, skipping expired ones and
    /// ones without a stored embedding.
    pub(crate) fn candidates(&self, max_tokens: u32, ttl: Duration) -> Vec<(String, Vec<f32>)> {
        let mut expired = Vec::new();
        let mut candidates = Vec::new();

        for item in self.entries.iter() {
            if item.value().is_expired(ttl) {
                expired.push(item.key().clone());
                continue;
            }
            if item.value().max_tokens != max_tokens {
                continue;
            }
            if let Some(embedding) = &item.value().embedding {
                candidates.push((item.value().value.clone(), embedding.clone()));
            }
        }

        for key in expired {
            self.entries.remove(&key);
        }

        candidates
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}

/// Cosine similarity between two equal-length vectors. Both are assumed
/// already L2-normalised, so this reduces to a dot product.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2-normalises `v` in place. A zero vector is left unchanged.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_hit_then_expiry() {
        let store = EntryStore::new();
        store.insert(
            "fp1".to_string(),
            Entry {
                value: "hello".to_string(),
                max_tokens: 64,
                embedding: None,
                inserted_at: Instant::now(),
            },
        );
        assert!(store.get_exact("fp1", Duration::from_secs(60)).is_some());
        assert!(store.get_exact("fp1", Duration::from_nanos(0)).is_none());
    }

    #[test]
    fn candidates_filters_by_max_tokens_and_embedding_presence() {
        let store = EntryStore::new();
        store.insert(
            "a".to_string(),
            Entry {
                value: "a".to_string(),
                max_tokens: 64,
                embedding: Some(vec![1.0, 0.0]),
                inserted_at: Instant::now(),
            },
        );
        store.insert(
            "b".to_string(),
            Entry {
                value: "b".to_string(),
                max_tokens: 128,
                embedding: Some(vec![0.0, 1.0]),
                inserted_at: Instant::now(),
            },
        );
        store.insert(
            "c".to_string(),
            Entry {
                value: "c".to_string(),
                max_tokens: 64,
                embedding: None,
                inserted_at: Instant::now(),
            },
        );

        let candidates = store.candidates(64, Duration::from_secs(60));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].0, "a");
    }

    #[test]
    fn cosine_of_normalized_vectors() {
        let mut a = vec![1.0, 1.0];
        let mut b = vec![1.0, 0.0];
        normalize(&mut a);
        normalize(&mut b);
        let sim = cosine_similarity(&a, &b);
        assert!((sim - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }
}
