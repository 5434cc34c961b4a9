//! HybridRetriever (C5): fuses dense similarity, keyword overlap, and
//! historical feedback into a single ranked candidate set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use ragqa_ledger::FeedbackLedger;

use crate::keyword::{calculate_keyword_score, extract_keywords};
use crate::vector_store::VectorIndex;

/// Fusion weights `(α, β, γ)` applied to semantic, keyword, and feedback
/// scores respectively.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub semantic: f64,
    pub keyword: f64,
    pub feedback: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        use ragqa_config::constants::rag;
        Self {
            semantic: rag::SEMANTIC_WEIGHT,
            keyword: rag::KEYWORD_WEIGHT,
            feedback: rag::FEEDBACK_WEIGHT,
        }
    }
}

/// Bonus added when a candidate scores above the keyword co-occurrence
/// threshold in both the semantic and keyword signals.
const BOTH_SIGNALS_BONUS: f64 = ragqa_config::constants::rag::BOTH_SIGNALS_BONUS;
const APPEARS_IN_BOTH_THRESHOLD: f64 = ragqa_config::constants::rag::BOTH_SIGNALS_KEYWORD_THRESHOLD;

#[derive(Debug, Clone)]
pub struct HybridResult {
    pub id: String,
    pub semantic_score: f64,
    pub keyword_score: f64,
    pub feedback_score: f64,
    pub appears_in_both: bool,
    pub final_score: f64,
    pub metadata: HashMap<String, Value>,
}

pub struct HybridRetriever {
    vector_index: Arc<VectorIndex>,
    ledger: Arc<FeedbackLedger>,
    weights: FusionWeights,
}

impl HybridRetriever {
    pub fn new(vector_index: Arc<VectorIndex>, ledger: Arc<FeedbackLedger>) -> Self {
        Self {
            vector_index,
            ledger,
            weights: FusionWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// `search(query, topK, weights) -> ordered HybridResults, length <= topK`.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<HybridResult> {
        let keywords = extract_keywords(query);
        let (raw_matches, _) = self
            .vector_index
            .query(query, top_k * ragqa_config::constants::rag::RAW_MATCH_MULTIPLIER)
            .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();
        for m in raw_matches {
            if !seen.insert(m.id.clone()) {
                continue;
            }
            let text_content = join_text_fields(&m.metadata);
            let keyword_score = calculate_keyword_score(&keywords, &text_content);
            let appears_in_both = keyword_score > APPEARS_IN_BOTH_THRESHOLD;
            candidates.push((m.id, m.score as f64, keyword_score, appears_in_both, m.metadata));
        }

        // Concurrent feedback lookups; per-candidate failure is isolated.
        let feedback_futures = candidates
            .iter()
            .map(|(id, ..)| self.ledger.get_document_global_score(id));
        let feedback_scores: Vec<f64> = futures::future::join_all(feedback_futures)
            .await
            .into_iter()
            .map(|result| result.unwrap_or(0.0))
            .collect();

        let mut results: Vec<HybridResult> = candidates
            .into_iter()
            .zip(feedback_scores)
            .map(
                |((id, semantic_score, keyword_score, appears_in_both, metadata), feedback_score)| {
                    let bonus = if appears_in_both { BOTH_SIGNALS_BONUS } else { 0.0 };
                    let final_score = self.weights.semantic * semantic_score
                        + self.weights.keyword * keyword_score
                        + self.weights.feedback * feedback_score
                        + bonus;
                    HybridResult {
                        id,
                        semantic_score,
                        keyword_score,
                        feedback_score,
                        appears_in_both,
                        final_score,
                        metadata,
                    }
                },
            )
            .collect();

        results.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.semantic_score.partial_cmp(&a.semantic_score).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(top_k);
        results
    }

    /// `getHighestScore(results) -> max(finalScore) or None`.
    pub fn highest_score(results: &[HybridResult]) -> Option<f64> {
        results
            .iter()
            .map(|r| r.final_score)
            .fold(None, |acc, score| match acc {
                None => Some(score),
                Some(current) => Some(current.max(score)),
            })
    }
}

fn join_text_fields(metadata: &HashMap<String, Value>) -> String {
    let mut parts = Vec::new();
    for key in ["text", "title", "source"] {
        if let Some(Value::String(s)) = metadata.get(key) {
            parts.push(s.clone());
        }
    }
    if let Some(Value::Array(tags)) = metadata.get("tags") {
        for tag in tags {
            if let Value::String(s) = tag {
                parts.push(s.clone());
            }
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_score_is_none_for_empty_results() {
        assert_eq!(HybridRetriever::highest_score(&[]), None);
    }

    #[test]
    fn highest_score_picks_the_max() {
        let results = vec![
            HybridResult {
                id: "a".to_string(),
                semantic_score: 0.5,
                keyword_score: 0.0,
                feedback_score: 0.0,
                appears_in_both: false,
                final_score: 0.3,
                metadata: HashMap::new(),
            },
            HybridResult {
                id: "b".to_string(),
                semantic_score: 0.9,
                keyword_score: 0.0,
                feedback_score: 0.0,
                appears_in_both: false,
                final_score: 0.8,
                metadata: HashMap::new(),
            },
        ];
        assert_eq!(HybridRetriever::highest_score(&results), Some(0.8));
    }

    #[test]
    fn join_text_fields_concatenates_known_keys() {
        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), Value::String("gold loan info".to_string()));
        metadata.insert("title".to_string(), Value::String("Gold Loans".to_string()));
        metadata.insert(
            "tags".to_string(),
            Value::Array(vec![Value::String("finance".to_string())]),
        );
        let joined = join_text_fields(&metadata);
        assert!(joined.contains("gold loan info"));
        assert!(joined.contains("Gold Loans"));
        assert!(joined.contains("finance"));
    }
}
