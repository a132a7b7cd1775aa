//! Document chunking: semantic grouping of sentences, with a fixed
//! sliding-window fallback.

/// Splits `text` into sentences on `.`, `!`, and `?` boundaries followed by
/// whitespace or end-of-string. This is a lightweight approximation of a
/// real sentence tokenizer (the original deployment used NLTK's `punkt`);
/// it is good enough for legal prose, which rarely nests abbreviations
/// inside the spans that matter for retrieval.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<char> = trimmed.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == '.' || c == '!' || c == '?' {
            let at_boundary = i + 1 == chars.len() || chars[i + 1].is_whitespace();
            if at_boundary {
                let sentence: String = chars[start..=i].iter().collect();
                let sentence = sentence.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = i + 1;
            }
        }
    }

    if start < chars.len() {
        let remainder: String = chars[start..].iter().collect();
        let remainder = remainder.trim();
        if !remainder.is_empty() {
            sentences.push(remainder.to_string());
        }
    }

    sentences
}

/// One chunk produced by either chunking strategy.
#[derive(Debug, Clone)]
pub(crate) struct RawChunk {
    pub(crate) text: String,
}

/// Groups consecutive sentences whose embedding stays close to the running
/// mean of the chunk being built so far. `embed` is called
/// once per sentence.
///
/// A single-sentence document produces one chunk containing that sentence.
/// An empty document produces no chunks.
pub(crate) fn semantic_chunk(
    sentences: &[String],
    embeddings: &[Vec<f32>],
    max_chunk_size: usize,
    similarity_threshold: f32,
) -> Vec<RawChunk> {
    if sentences.is_empty() {
        return Vec::new();
    }
    if sentences.len() == 1 {
        return vec![RawChunk {
            text: sentences[0].clone(),
        }];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<usize> = vec![0];
    let mut running_mean = embeddings[0].clone();

    for i in 1..sentences.len() {
        let similarity = cosine(&running_mean, &embeddings[i]);
        let current_text = join_sentences(sentences, &current);
        let potential_len = current_text.len() + 1 + sentences[i].len();

        if similarity >= similarity_threshold && potential_len < max_chunk_size {
            current.push(i);
            running_mean = mean_embedding(embeddings, &current);
        } else {
            chunks.push(RawChunk {
                text: join_sentences(sentences, &current),
            });
            current = vec![i];
            running_mean = embeddings[i].clone();
        }
    }

    if !current.is_empty() {
        chunks.push(RawChunk {
            text: join_sentences(sentences, &current),
        });
    }

    chunks
}

/// Fixed sliding window over sentences, `window` sentences per chunk with
/// `overlap` sentences shared between consecutive chunks. Used when
/// semantic chunking is disabled (no encoder configured, or the caller asks
/// for the cheaper strategy).
pub(crate) fn sliding_window_chunk(sentences: &[String], window: usize, overlap: usize) -> Vec<RawChunk> {
    if sentences.is_empty() {
        return Vec::new();
    }
    if sentences.len() <= window {
        return vec![RawChunk {
            text: sentences.join(" "),
        }];
    }

    let step = window.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < sentences.len() {
        let end = (i + window).min(sentences.len());
        chunks.push(RawChunk {
            text: sentences[i..end].join(" "),
        });
        i += step;
    }
    chunks
}

fn join_sentences(sentences: &[String], indices: &[usize]) -> String {
    indices
        .iter()
        .map(|&i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn mean_embedding(embeddings: &[Vec<f32>], indices: &[usize]) -> Vec<f32> {
    let dim = embeddings[indices[0]].len();
    let mut mean = vec![0.0f32; dim];
    for &i in indices {
        for (m, v) in mean.iter_mut().zip(embeddings[i].iter()) {
            *m += v;
        }
    }
    let n = indices.len() as f32;
    for m in mean.iter_mut() {
        *m /= n;
    }
    mean
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("The sky is blue. Is it always blue? Yes!");
        assert_eq!(
            sentences,
            vec![
                "The sky is blue.".to_string(),
                "Is it always blue?".to_string(),
                "Yes!".to_string(),
            ]
        );
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert!(split_sentences("   ").is_empty());
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn single_sentence_document_is_one_chunk() {
        let sentences = vec!["The Security Deposit is $600.".to_string()];
        let embeddings = vec![vec![1.0, 0.0]];
        let chunks = semantic_chunk(&sentences, &embeddings, 512, 0.5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The Security Deposit is $600.");
    }

    #[test]
    fn empty_document_has_no_chunks() {
        let chunks = semantic_chunk(&[], &[], 512, 0.5);
        assert!(chunks.is_empty());
    }

    #[test]
    fn dissimilar_sentences_split_into_separate_chunks() {
        let sentences = vec!["a".to_string(), "b".to_string()];
        let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let chunks = semantic_chunk(&sentences, &embeddings, 512, 0.9);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn similar_sentences_merge_into_one_chunk() {
        let sentences = vec!["a".to_string(), "b".to_string()];
        let embeddings = vec![vec![1.0, 0.0], vec![0.99, 0.01]];
        let chunks = semantic_chunk(&sentences, &embeddings, 512, 0.5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a b");
    }

    #[test]
    fn chunk_size_ceiling_forces_a_split_even_when_similar() {
        let long_a = "x".repeat(400);
        let long_b = "y".repeat(400);
        let sentences = vec![long_a, long_b];
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let chunks = semantic_chunk(&sentences, &embeddings, 512, 0.5);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn sliding_window_overlaps_between_chunks() {
        let sentences: Vec<String> = (0..7).map(|i| format!("s{i}")).collect();
        let chunks = sliding_window_chunk(&sentences, 3, 1);
        assert_eq!(chunks[0].text, "s0 s1 s2");
        assert_eq!(chunks[1].text, "s2 s3 s4");
    }

    #[test]
    fn sliding_window_emits_a_trailing_short_chunk() {
        let sentences: Vec<String> = (0..7).map(|i| format!("s{i}")).collect();
        let chunks = sliding_window_chunk(&sentences, 3, 1);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[2].text, "s4 s5 s6");
        assert_eq!(chunks[3].text, "s6");
    }

    #[test]
    fn sliding_window_short_document_is_single_chunk() {
        let sentences = vec!["a".to_string(), "b".to_string()];
        let chunks = sliding_window_chunk(&sentences, 3, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a b");
    }
}
