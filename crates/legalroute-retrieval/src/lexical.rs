//! BM25 keyword index over a document's chunks.

use std::collections::HashMap;

const K1: f32 = 1.5;
const B: f32 = 0.75;

/// Tokenises `text` into lowercase alphanumeric runs, matching the
/// original deployment's `re.findall(r'\b\w+\b', text.lower())`.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// BM25Okapi-style index over a fixed corpus of chunk token lists, scored
/// with the standard `rank_bm25` defaults (k1 = 1.5, b = 0.75).
pub(crate) struct Bm25Index {
    doc_lengths: Vec<usize>,
    avg_doc_length: f32,
    term_frequencies: Vec<HashMap<String, usize>>,
    document_frequencies: HashMap<String, usize>,
    num_docs: usize,
}

impl Bm25Index {
    pub(crate) fn build(tokenized_chunks: &[Vec<String>]) -> Self {
        let num_docs = tokenized_chunks.len();
        let doc_lengths: Vec<usize> = tokenized_chunks.iter().map(|c| c.len()).collect();
        let avg_doc_length = if num_docs == 0 {
            0.0
        } else {
            doc_lengths.iter().sum::<usize>() as f32 / num_docs as f32
        };

        let mut term_frequencies = Vec::with_capacity(num_docs);
        let mut document_frequencies: HashMap<String, usize> = HashMap::new();

        for tokens in tokenized_chunks {
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *document_frequencies.entry(term.clone()).or_insert(0) += 1;
            }
            term_frequencies.push(tf);
        }

        Self {
            doc_lengths,
            avg_doc_length,
            term_frequencies,
            document_frequencies,
            num_docs,
        }
    }

    /// BM25 score for `query_tokens` against every chunk, in chunk order.
    pub(crate) fn scores(&self, query_tokens: &[String]) -> Vec<f32> {
        (0..self.num_docs)
            .map(|doc_index| self.score_one(doc_index, query_tokens))
            .collect()
    }

    fn score_one(&self, doc_index: usize, query_tokens: &[String]) -> f32 {
        let doc_length = self.doc_lengths[doc_index] as f32;
        let tf = &self.term_frequencies[doc_index];

        let mut score = 0.0f32;
        for term in query_tokens {
            let Some(&freq) = tf.get(term) else {
                continue;
            };
            let freq = freq as f32;
            let df = *self.document_frequencies.get(term).unwrap_or(&0) as f32;
            let idf = (((self.num_docs as f32 - df + 0.5) / (df + 0.5)) + 1.0).ln();
            let denom = freq + K1 * (1.0 - B + B * doc_length / self.avg_doc_length.max(1e-9));
            score += idf * (freq * (K1 + 1.0)) / denom.max(1e-9);
        }
        score
    }
}

/// Min-max normalises `scores` into `[0, 1]`. A constant input (including a
/// single-element or empty slice) maps to all-ones, matching
/// `np.ones_like` in the original when `max - min == 0`.
pub(crate) fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < 1e-12 {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / (max - min)).collect()
}
