//! Hybrid retrieval and multi-hop query decomposition (C1–C3, C5–C6), plus
//! the correction-injection path that closes the loop with the feedback
//! ledger.

pub mod correction;
pub mod embeddings;
pub mod keyword;
pub mod multihop;
pub mod retriever;
pub mod vector_store;

pub use correction::FeedbackService;
pub use embeddings::{CacheStats, EmbeddingConfig, EmbeddingProvider};
pub use keyword::{calculate_keyword_score, extract_keywords};
pub use multihop::{MultiHopController, MultiHopOutcome};
pub use retriever::{FusionWeights, HybridResult, HybridRetriever};
pub use vector_store::{Match, UpsertItem, VectorIndex, VectorStoreConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("search error: {0}")]
    Search(String),
}

impl From<RagError> for ragqa_core::Error {
    fn from(err: RagError) -> Self {
        ragqa_core::Error::Retrieval(err.to_string())
    }
}
