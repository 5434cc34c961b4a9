//! MultiHopController (C6): decomposes a question into sequential search
//! hops, replaying a known-good template when one exists.

use std::collections::HashSet;
use std::sync::Arc;

use ragqa_core::new_id;
use ragqa_ledger::FeedbackLedger;
use ragqa_llm::{prompt, LlmBackend};

use crate::retriever::{HybridResult, HybridRetriever};

use ragqa_config::constants::rag as rag_constants;

const CONTEXT_THRESHOLD: f64 = rag_constants::EVALUATE_CONTEXT_THRESHOLD;
const REPLAY_TOP_K: usize = rag_constants::SUBSEQUENT_HOP_TOP_K;
const FANOUT_TOP_K: usize = rag_constants::SUBSEQUENT_HOP_TOP_K;
const INITIAL_TOP_K: usize = rag_constants::INITIAL_HOP_TOP_K;

pub struct MultiHopOutcome {
    pub results: Vec<HybridResult>,
    pub hop_ids: Vec<String>,
    pub generated_queries: Vec<String>,
    pub query_id: String,
}

pub struct MultiHopController {
    retriever: Arc<HybridRetriever>,
    ledger: Arc<FeedbackLedger>,
    llm: Arc<dyn LlmBackend>,
}

impl MultiHopController {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        ledger: Arc<FeedbackLedger>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            retriever,
            ledger,
            llm,
        }
    }

    /// `run(originalQuery, maxHops) -> {results, hopIds, generatedQueries, queryId}`.
    pub async fn run(&self, original_query: &str, max_hops: u32) -> MultiHopOutcome {
        let query_id = new_id();
        let _ = self.ledger.log_query(&query_id, original_query).await;

        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut accumulator: Vec<HybridResult> = Vec::new();
        let mut hop_ids = Vec::new();

        if let Ok(template) = self.ledger.get_successful_template(original_query).await {
            if !template.is_empty() {
                for step in template {
                    let hop_id = new_id();
                    let _ = self
                        .ledger
                        .log_hop(
                            &hop_id,
                            &query_id,
                            step.hop_order,
                            &step.sub_query,
                            "Replay from history",
                        )
                        .await;
                    hop_ids.push(hop_id.clone());
                    self.execute_hop(&hop_id, &step.sub_query, REPLAY_TOP_K, &mut seen_ids, &mut accumulator)
                        .await;
                }
                accumulator.sort_by(|a, b| {
                    b.final_score
                        .partial_cmp(&a.final_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                return MultiHopOutcome {
                    results: accumulator,
                    hop_ids,
                    generated_queries: Vec::new(),
                    query_id,
                };
            }
        }

        // INITIAL_HOP
        let initial_hop_id = new_id();
        let _ = self
            .ledger
            .log_hop(&initial_hop_id, &query_id, 0, original_query, "Initial Query")
            .await;
        hop_ids.push(initial_hop_id.clone());
        self.execute_hop(&initial_hop_id, original_query, INITIAL_TOP_K, &mut seen_ids, &mut accumulator)
            .await;

        let mut current_hop = 0u32;
        let mut generated_queries = Vec::new();

        loop {
            let evaluation = self.evaluate(&accumulator, original_query).await;
            let Some(evaluation) = evaluation else {
                break;
            };
            if evaluation.sufficient || current_hop >= max_hops || evaluation.queries.is_empty() {
                break;
            }

            let next_hop_order = current_hop as i64 + 1;
            for sub_query in &evaluation.queries {
                let hop_id = new_id();
                let _ = self
                    .ledger
                    .log_hop(&hop_id, &query_id, next_hop_order, sub_query, "LLM Generated")
                    .await;
                hop_ids.push(hop_id.clone());
                self.execute_hop(&hop_id, sub_query, FANOUT_TOP_K, &mut seen_ids, &mut accumulator)
                    .await;
            }
            generated_queries.extend(evaluation.queries);
            current_hop += 1;
        }

        accumulator.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        MultiHopOutcome {
            results: accumulator,
            hop_ids,
            generated_queries,
            query_id,
        }
    }

    async fn execute_hop(
        &self,
        hop_id: &str,
        sub_query: &str,
        top_k: usize,
        seen_ids: &mut HashSet<String>,
        accumulator: &mut Vec<HybridResult>,
    ) {
        let results = self.retriever.search(sub_query, top_k).await;
        for (rank, result) in results.iter().enumerate() {
            let _ = self
                .ledger
                .log_hop_document(
                    &new_id(),
                    hop_id,
                    &result.id,
                    result.semantic_score,
                    result.keyword_score,
                    rank as i64 + 1,
                )
                .await;
        }
        for result in results {
            if seen_ids.insert(result.id.clone()) {
                accumulator.push(result);
            }
        }
    }

    async fn evaluate(&self, accumulator: &[HybridResult], original_query: &str) -> Option<Evaluation> {
        let context = build_context(accumulator);
        let messages = prompt::decomposition_messages(&context, original_query);
        let generation = self.llm.generate(&messages).await.ok()?;
        parse_decomposition_response(&generation.text)
    }
}

struct Evaluation {
    sufficient: bool,
    queries: Vec<String>,
}

#[derive(serde::Deserialize)]
struct DecompositionResponse {
    sufficient: bool,
    #[serde(default)]
    queries: Vec<String>,
}

fn parse_decomposition_response(text: &str) -> Option<Evaluation> {
    let trimmed = ragqa_llm::strip_code_fence(text);
    let parsed: DecompositionResponse = serde_json::from_str(&trimmed).ok()?;
    Some(Evaluation {
        sufficient: parsed.sufficient,
        queries: parsed.queries,
    })
}

fn build_context(accumulator: &[HybridResult]) -> String {
    accumulator
        .iter()
        .filter(|r| r.final_score >= CONTEXT_THRESHOLD)
        .filter_map(|r| match r.metadata.get("text") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_decomposition_response() {
        let evaluation =
            parse_decomposition_response("{\"sufficient\": false, \"queries\": [\"sub a\", \"sub b\"]}")
                .unwrap();
        assert!(!evaluation.sufficient);
        assert_eq!(evaluation.queries, vec!["sub a", "sub b"]);
    }

    #[test]
    fn parse_failure_returns_none() {
        assert!(parse_decomposition_response("not json").is_none());
    }

    #[test]
    fn context_filters_by_threshold() {
        use std::collections::HashMap;
        let mut metadata_above = HashMap::new();
        metadata_above.insert("text".to_string(), serde_json::Value::String("kept".to_string()));
        let mut metadata_below = HashMap::new();
        metadata_below.insert("text".to_string(), serde_json::Value::String("dropped".to_string()));

        let results = vec![
            HybridResult {
                id: "a".to_string(),
                semantic_score: 0.9,
                keyword_score: 0.0,
                feedback_score: 0.0,
                appears_in_both: false,
                final_score: 0.6,
                metadata: metadata_above,
            },
            HybridResult {
                id: "b".to_string(),
                semantic_score: 0.1,
                keyword_score: 0.0,
                feedback_score: 0.0,
                appears_in_both: false,
                final_score: 0.1,
                metadata: metadata_below,
            },
        ];
        let context = build_context(&results);
        assert!(context.contains("kept"));
        assert!(!context.contains("dropped"));
    }
}
