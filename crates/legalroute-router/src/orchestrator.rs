//! Inference orchestrator: validates a request, assembles the final
//! prompt (optionally with retrieval context), and drives the
//! cache-then-generate path.

use crate::error::RouterError;
use crate::models::Message;
use legalroute_cache::{CacheLookup, SemanticCache};
use legalroute_retrieval::RetrievalIndex;
use std::sync::Arc;

const NO_CONTEXT_TEMPLATE: &str =
    "You are a helpful assistant. Answer in no more than {word_budget} words.\n\n{content}\n\nAssistant:";

const WITH_CONTEXT_TEMPLATE: &str = "You are a helpful assistant. Use the context below if it is \
relevant; otherwise answer from general knowledge. Answer in no more than {word_budget} words.\n\n\
Context:\n{context}\n\n{content}\n\nAssistant:";

/// Valid model-selector tags, matched case-insensitively.
const VALID_MODEL_TAGS: &[&str] = &["qwen", "llama"];

/// Upper bound on the retrieval-context slice folded into the cache key,
/// so the key's length doesn't track the full context size.
const CACHE_KEY_CONTEXT_PREFIX_CHARS: usize = 500;

/// The two prompt strings the orchestrator produces: the full prompt sent
/// to the generator, and a shorter, separately-derived string used only to
/// compute the cache fingerprint.
pub struct AssembledPrompt {
    pub generator_prompt: String,
    pub cache_key_prompt: String,
    pub retrieval_used: bool,
}

pub struct Orchestrator {
    cache: Arc<SemanticCache>,
    retrieval: Arc<RetrievalIndex>,
}

impl Orchestrator {
    pub fn new(cache: Arc<SemanticCache>, retrieval: Arc<RetrievalIndex>) -> Self {
        Self { cache, retrieval }
    }

    /// Validates the raw request fields: non-empty content,
    /// `max_tokens` in `[1, 2048]`, and (if given) a recognised model tag.
    pub fn validate(
        messages: &[Message],
        max_tokens: u32,
        model: Option<&str>,
    ) -> Result<(), RouterError> {
        if messages.is_empty() {
            return Err(RouterError::Validation("messages must not be empty".into()));
        }
        if messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(RouterError::Validation("messages must not be blank".into()));
        }
        if !(1..=2048).contains(&max_tokens) {
            return Err(RouterError::Validation("max_tokens must be in [1, 2048]".into()));
        }
        if let Some(tag) = model {
            let known = VALID_MODEL_TAGS.iter().any(|v| v.eq_ignore_ascii_case(tag));
            if !known {
                return Err(RouterError::Validation(format!("unknown model tag: {tag}")));
            }
        }
        Ok(())
    }

    /// Serialises `messages` as `User: ...\n\nAssistant: ...\n\n...`
    /// ending with a trailing `Assistant:`, and returns alongside it the
    /// last user message (scanned in reverse), used as the retrieval
    /// query.
    fn assemble_conversation(messages: &[Message]) -> (String, String) {
        let mut serialised = String::new();
        for message in messages {
            let role = if message.role.eq_ignore_ascii_case("assistant") { "Assistant" } else { "User" };
            serialised.push_str(role);
            serialised.push_str(": ");
            serialised.push_str(&message.content);
            serialised.push_str("\n\n");
        }
        serialised.push_str("Assistant:");

        let retrieval_query = messages
            .iter()
            .rev()
            .find(|m| !m.role.eq_ignore_ascii_case("assistant"))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        (serialised, retrieval_query)
    }

    /// Builds the generator and cache-key prompts for one request,
    /// fetching retrieval context when asked for. A retrieval failure is
    /// logged and swallowed, not surfaced as a request error.
    pub fn assemble(
        &self,
        messages: &[Message],
        max_tokens: u32,
        document_id: Option<&str>,
        use_retrieval: bool,
        retrieval_top_k: Option<usize>,
    ) -> AssembledPrompt {
        let (content, retrieval_query) = Self::assemble_conversation(messages);
        let word_budget = (max_tokens as f32 * 0.75).round().max(1.0) as u32;

        // Retrieval `top_k` is bounded to [1, 10] at the
        // request envelope level.
        let top_k = retrieval_top_k.map(|k| k.clamp(1, 10));

        let context = if use_retrieval && self.retrieval.has_index(document_id) {
            match self.retrieval.context_for_llm(&retrieval_query, document_id, top_k, None) {
                Ok(context) if !context.is_empty() => Some(context),
                Ok(_) => None,
                Err(err) => {
                    tracing::warn!(error = %err, "retrieval failed, proceeding without context");
                    None
                }
            }
        } else {
            None
        };

        let generator_prompt = match &context {
            Some(context) => WITH_CONTEXT_TEMPLATE
                .replace("{context}", context)
                .replace("{content}", &content)
                .replace("{word_budget}", &word_budget.to_string()),
            None => NO_CONTEXT_TEMPLATE
                .replace("{content}", &content)
                .replace("{word_budget}", &word_budget.to_string()),
        };

        let cache_key_prompt = match &context {
            Some(context) => format!("{content}|RAG:{}", prefix_chars(context, CACHE_KEY_CONTEXT_PREFIX_CHARS)),
            None => format!("{content}|RAG:none"),
        };

        AssembledPrompt { generator_prompt, cache_key_prompt, retrieval_used: context.is_some() }
    }

    pub async fn lookup_cache(
        &self,
        cache_key_prompt: &str,
        max_tokens: u32,
        threshold: Option<f32>,
    ) -> CacheLookup {
        self.cache.get(cache_key_prompt, max_tokens, threshold).await
    }

    pub fn store_cache(&self, cache_key_prompt: &str, max_tokens: u32, value: String) {
        self.cache.put(cache_key_prompt, max_tokens, value);
    }
}

/// Truncates `s` to at most `max_chars` characters, walking back to the
/// nearest character boundary rather than splitting a multi-byte UTF-8
/// sequence.
fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
