//! Application State
//!
//! Shared state across all handlers. Every process-wide singleton is
//! constructed once at startup and handed to the orchestrator by reference,
//! matching the teacher's "construct once, pass by handle" convention.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use ragqa_agent::{AnswerOrchestrator, ConversationMemory};
use ragqa_config::Settings;
use ragqa_ledger::FeedbackLedger;
use ragqa_llm::{LlmBackend, LlmSettings, OllamaBackend};
use ragqa_rag::{
    EmbeddingConfig, EmbeddingProvider, FeedbackService, HybridRetriever, MultiHopController,
    VectorIndex, VectorStoreConfig,
};

use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub ledger: Arc<FeedbackLedger>,
    pub orchestrator: Arc<AnswerOrchestrator>,
    pub feedback_service: Arc<FeedbackService>,
}

impl AppState {
    /// Wires every component singleton (C1–C8) from `Settings`.
    pub async fn new(settings: Settings) -> Result<Self, ServerError> {
        let embeddings = Arc::new(EmbeddingProvider::new(EmbeddingConfig {
            dim: settings.vector_store.vector_dim,
            ..EmbeddingConfig::default()
        }));

        let vector_index = Arc::new(VectorIndex::new(
            VectorStoreConfig {
                endpoint: settings.vector_store.endpoint.clone(),
                collection: settings.vector_store.collection.clone(),
                vector_dim: settings.vector_store.vector_dim,
                api_key: settings.vector_store.api_key.clone(),
            },
            Arc::clone(&embeddings),
        ));

        let ledger = Arc::new(
            FeedbackLedger::connect(&settings.ledger.database_url)
                .await
                .map_err(|e| ServerError::Startup(e.to_string()))?,
        );

        let retriever = Arc::new(
            HybridRetriever::new(Arc::clone(&vector_index), Arc::clone(&ledger)).with_weights(
                ragqa_rag::FusionWeights {
                    semantic: settings.rag.semantic_weight,
                    keyword: settings.rag.keyword_weight,
                    feedback: settings.rag.feedback_weight,
                },
            ),
        );

        let llm: Arc<dyn LlmBackend> = Arc::new(
            OllamaBackend::new(LlmSettings {
                model: settings.llm.model.clone(),
                endpoint: settings.llm.endpoint.clone(),
                timeout: Duration::from_secs(settings.llm.timeout_secs),
                ..LlmSettings::default()
            })
            .map_err(|e| ServerError::Startup(e.to_string()))?,
        );

        let multihop = Arc::new(MultiHopController::new(
            Arc::clone(&retriever),
            Arc::clone(&ledger),
            Arc::clone(&llm),
        ));

        let memory = Arc::new(ConversationMemory::new());

        let feedback_service = Arc::new(FeedbackService::new(
            Arc::clone(&ledger),
            Arc::clone(&embeddings),
            Arc::clone(&vector_index),
        ));

        let orchestrator = Arc::new(AnswerOrchestrator::new(
            retriever,
            multihop,
            Arc::clone(&ledger),
            llm,
            memory,
            settings.rag.similarity_threshold,
            settings.rag.max_hops,
            Duration::from_secs(settings.llm.timeout_secs),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(settings)),
            ledger,
            orchestrator,
            feedback_service,
        })
    }

    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }
}
