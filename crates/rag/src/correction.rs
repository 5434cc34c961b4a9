//! Correction injection: the `rag`-side half of `submitFeedback`.
//!
//! The ledger can only persist the correction text, since embedding and
//! vector-store upsert live in this crate. [`FeedbackService`] sits above
//! both, calling the ledger's pure mutation first and then, if a correction
//! was supplied and survives the length check, embedding and upserting it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use ragqa_core::new_id;
use ragqa_ledger::FeedbackLedger;

use crate::embeddings::EmbeddingProvider;
use crate::vector_store::{UpsertItem, VectorIndex};

const MIN_CORRECTION_LENGTH: usize = ragqa_config::constants::rag::MIN_CORRECTION_LENGTH;

pub struct FeedbackService {
    ledger: Arc<FeedbackLedger>,
    embeddings: Arc<EmbeddingProvider>,
    vector_index: Arc<VectorIndex>,
}

impl FeedbackService {
    pub fn new(
        ledger: Arc<FeedbackLedger>,
        embeddings: Arc<EmbeddingProvider>,
        vector_index: Arc<VectorIndex>,
    ) -> Self {
        Self {
            ledger,
            embeddings,
            vector_index,
        }
    }

    /// `submitFeedback(responseId, feedback, correction?)`. Persists the
    /// feedback and, when eligible, injects the correction as a new
    /// retrievable document. Injection failures are logged, never fatal.
    pub async fn submit_feedback(
        &self,
        response_id: &str,
        feedback: i64,
        correction: Option<&str>,
    ) -> Result<(), ragqa_core::Error> {
        self.ledger
            .submit_feedback(response_id, feedback, correction)
            .await?;

        let Some(correction) = correction else {
            return Ok(());
        };
        let trimmed = correction.trim();
        if trimmed.len() <= MIN_CORRECTION_LENGTH {
            return Ok(());
        }

        if let Err(err) = self.inject_correction(trimmed).await {
            tracing::warn!(error = %err, "correction injection failed");
        }
        Ok(())
    }

    async fn inject_correction(&self, text: &str) -> Result<(), ragqa_core::Error> {
        let vector = self
            .embeddings
            .embed(text)
            .map_err(|e| ragqa_core::Error::Retrieval(e.to_string()))?;

        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), Value::String(text.to_string()));
        metadata.insert("type".to_string(), Value::String("correction".to_string()));
        metadata.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        metadata.insert(
            "source".to_string(),
            Value::String("user_feedback".to_string()),
        );

        self.vector_index
            .upsert(&[UpsertItem {
                id: format!("correction-{}", new_id()),
                vector,
                metadata,
            }])
            .await
            .map_err(|e| ragqa_core::Error::Retrieval(e.to_string()))
    }
}
