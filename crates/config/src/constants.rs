//! Centralized default constants, mirroring the spec's enumerated environment
//! configuration (§6) and component defaults (§4).

/// Default endpoints for the external collaborators, overridable by env vars.
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// Ollama-compatible LLM endpoint (env: `OLLAMA_URL`).
    pub static OLLAMA_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
    });

    /// Qdrant vector store endpoint (env: `QDRANT_URL`).
    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6333".to_string())
    });
}

/// Hybrid retrieval and multi-hop defaults (§4.5, §4.6, §4.7).
pub mod rag {
    /// α — weight for the dense semantic score in the final fusion.
    pub const SEMANTIC_WEIGHT: f64 = 0.6;
    /// β — weight for the lexical keyword score.
    pub const KEYWORD_WEIGHT: f64 = 0.3;
    /// γ — weight for the time-decayed feedback score.
    pub const FEEDBACK_WEIGHT: f64 = 0.1;
    /// Bonus added when a candidate appears with `keywordScore > 0.3`.
    pub const BOTH_SIGNALS_BONUS: f64 = 0.05;
    /// Threshold above which a candidate's keyword score counts as "appears in both".
    pub const BOTH_SIGNALS_KEYWORD_THRESHOLD: f64 = 0.3;

    /// Similarity threshold gating whether RAG context is used at all (§4.7).
    pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;
    /// Threshold used when building the EVALUATE context string (§4.6).
    pub const EVALUATE_CONTEXT_THRESHOLD: f64 = 0.4;

    /// Default `topK` passed to `HybridRetriever::search` for the initial hop.
    pub const INITIAL_HOP_TOP_K: usize = 10;
    /// `topK` passed to `HybridRetriever::search` for replay/fanout hops.
    pub const SUBSEQUENT_HOP_TOP_K: usize = 5;
    /// `HybridRetriever` requests `3 * topK` raw matches from the vector index.
    pub const RAW_MATCH_MULTIPLIER: usize = 3;

    /// λ — the feedback score's exponential time-decay rate (per day).
    pub const FEEDBACK_DECAY_LAMBDA: f64 = 0.1;

    /// Default maximum number of decomposition rounds beyond the initial hop.
    pub const DEFAULT_MAX_HOPS: u32 = 1;

    /// Embedding cache size (entries), default S from §4.1.
    pub const DEFAULT_EMBEDDING_CACHE_SIZE: usize = 100;
    /// Default embedding dimension F.
    pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

    /// Recommended rolling conversation-window length N (§3, §4.8).
    pub const DEFAULT_CONVERSATION_WINDOW: usize = 6;

    /// Minimum trimmed length for a feedback correction to be injected (§4.4).
    pub const MIN_CORRECTION_LENGTH: usize = 5;
}

#[cfg(test)]
mod tests {
    use super::rag;

    #[test]
    fn fusion_weights_sum_to_one() {
        let sum = rag::SEMANTIC_WEIGHT + rag::KEYWORD_WEIGHT + rag::FEEDBACK_WEIGHT;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
