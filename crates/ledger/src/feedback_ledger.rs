//! The `FeedbackLedger` (C4): durable writes, per-document feedback scoring,
//! template replay lookup, weakest-link diagnosis, and debug metrics.

use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use ragqa_core::records::HopStatus;
use ragqa_core::{EvidenceChain, Hop, HopDocument, Query, Response};

use crate::{schema, LedgerError};

/// λ — the decay rate applied in `getDocumentGlobalScore` (§4.4).
const FEEDBACK_DECAY_LAMBDA: f64 = 0.1;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStep {
    pub hop_order: i64,
    pub sub_query: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSubQuery {
    pub sub_query: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeDocument {
    pub document_id: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMetrics {
    pub positive_feedback: i64,
    pub negative_feedback: i64,
    pub total_feedback: i64,
    pub top_failed_sub_queries: Vec<FailedSubQuery>,
    pub top_negative_documents: Vec<NegativeDocument>,
}

/// Durable record of queries, hops, per-hop documents, responses, and
/// evidence chains, backed by a single `SqlitePool` with foreign keys
/// enforced.
pub struct FeedbackLedger {
    pool: SqlitePool,
}

impl FeedbackLedger {
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(LedgerError::Database)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        schema::apply(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, LedgerError> {
        Self::connect("sqlite::memory:").await
    }

    // ---- Writes ---------------------------------------------------------

    pub async fn log_query(&self, id: &str, text: &str) -> Result<(), LedgerError> {
        sqlx::query("INSERT OR IGNORE INTO queries (id, text, timestamp) VALUES (?, ?, ?)")
            .bind(id)
            .bind(text)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn log_hop(
        &self,
        id: &str,
        query_id: &str,
        hop_order: i64,
        sub_query: &str,
        reasoning: &str,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT OR IGNORE INTO hops (id, query_id, hop_order, sub_query, reasoning, status) \
             VALUES (?, ?, ?, ?, ?, 'pending')",
        )
        .bind(id)
        .bind(query_id)
        .bind(hop_order)
        .bind(sub_query)
        .bind(reasoning)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn log_hop_document(
        &self,
        id: &str,
        hop_id: &str,
        document_id: &str,
        dense_score: f64,
        sparse_score: f64,
        rank_position: i64,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT OR IGNORE INTO hop_documents \
             (id, hop_id, document_id, dense_score, sparse_score, rank_position) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(hop_id)
        .bind(document_id)
        .bind(dense_score)
        .bind(sparse_score)
        .bind(rank_position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn log_response(
        &self,
        id: &str,
        query_id: &str,
        content: &str,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT OR IGNORE INTO responses (id, query_id, content, timestamp, user_feedback) \
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(id)
        .bind(query_id)
        .bind(content)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn log_evidence_chain(
        &self,
        id: &str,
        response_id: &str,
        hop_ids: &[String],
        document_ids: &[String],
        confidence_score: f64,
    ) -> Result<(), LedgerError> {
        let hop_ids_json = serde_json::to_string(hop_ids).unwrap_or_default();
        let document_ids_json = serde_json::to_string(document_ids).unwrap_or_default();
        sqlx::query(
            "INSERT OR IGNORE INTO evidence_chains \
             (id, response_id, hop_ids, document_ids, confidence_score) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(response_id)
        .bind(hop_ids_json)
        .bind(document_ids_json)
        .bind(confidence_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `submitFeedback(responseId, feedback, correction?)` — updates the
    /// response row and triggers weakest-link analysis on negative feedback.
    /// Correction injection (embedding + vector-store upsert) is the
    /// caller's responsibility; this method only persists `userCorrection`.
    pub async fn submit_feedback(
        &self,
        response_id: &str,
        feedback: i64,
        correction: Option<&str>,
    ) -> Result<(), LedgerError> {
        sqlx::query("UPDATE responses SET user_feedback = ?, user_correction = ? WHERE id = ?")
            .bind(feedback)
            .bind(correction)
            .bind(response_id)
            .execute(&self.pool)
            .await?;

        if feedback < 0 {
            self.diagnose_weakest_hop(response_id).await?;
        }
        Ok(())
    }

    /// Negative-feedback analysis (§4.4): find the evidence chain for
    /// `response_id`, compute each hop's mean combined score, and mark the
    /// weakest hop `failed`. Silently returns if no evidence chain exists.
    async fn diagnose_weakest_hop(&self, response_id: &str) -> Result<(), LedgerError> {
        let chain_row = sqlx::query("SELECT hop_ids FROM evidence_chains WHERE response_id = ?")
            .bind(response_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(chain_row) = chain_row else {
            return Ok(());
        };
        let hop_ids_json: String = chain_row.get("hop_ids");
        let hop_ids: Vec<String> = serde_json::from_str(&hop_ids_json).unwrap_or_default();
        if hop_ids.is_empty() {
            return Ok(());
        }

        let mut best: Option<(f64, i64, String)> = None; // (avg_score, hop_order, id)
        for hop_id in &hop_ids {
            let hop_row = sqlx::query("SELECT hop_order FROM hops WHERE id = ?")
                .bind(hop_id)
                .fetch_optional(&self.pool)
                .await?;
            let Some(hop_row) = hop_row else { continue };
            let hop_order: i64 = hop_row.get("hop_order");

            let rows = sqlx::query(
                "SELECT dense_score, sparse_score FROM hop_documents WHERE hop_id = ?",
            )
            .bind(hop_id)
            .fetch_all(&self.pool)
            .await?;
            if rows.is_empty() {
                continue;
            }
            let total: f64 = rows
                .iter()
                .map(|r| r.get::<f64, _>("dense_score") + r.get::<f64, _>("sparse_score"))
                .sum();
            let avg = total / rows.len() as f64;

            let candidate = (avg, hop_order, hop_id.clone());
            best = Some(match best {
                None => candidate,
                Some(current) => {
                    if candidate.0 < current.0
                        || (candidate.0 == current.0 && candidate.1 < current.1)
                        || (candidate.0 == current.0
                            && candidate.1 == current.1
                            && candidate.2 < current.2)
                    {
                        candidate
                    } else {
                        current
                    }
                }
            });
        }

        if let Some((_, _, weakest_id)) = best {
            sqlx::query("UPDATE hops SET status = 'failed' WHERE id = ?")
                .bind(&weakest_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    // ---- Reads ------------------------------------------------------------

    /// `getDocumentGlobalScore(documentId)` (§4.4).
    pub async fn get_document_global_score(&self, document_id: &str) -> Result<f64, LedgerError> {
        let rows = sqlx::query(
            "SELECT DISTINCT r.id AS response_id, r.user_feedback, r.timestamp \
             FROM hop_documents hd \
             JOIN hops h ON h.id = hd.hop_id \
             JOIN responses r ON r.query_id = h.query_id \
             WHERE hd.document_id = ?",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(0.0);
        }

        let raw: i64 = rows.iter().map(|r| r.get::<i64, _>("user_feedback")).sum();
        let last_time: i64 = rows
            .iter()
            .map(|r| r.get::<i64, _>("timestamp"))
            .max()
            .unwrap_or(0);

        let age_days = ((now_millis() - last_time) as f64 / MILLIS_PER_DAY).max(0.0);
        let score = (raw as f64 / 10.0).tanh() * (-FEEDBACK_DECAY_LAMBDA * age_days).exp();
        Ok(score)
    }

    /// `getSuccessfulTemplate(queryText)` (§4.4): hop breakdown of the most
    /// recent prior query with identical text whose response was `+1`.
    pub async fn get_successful_template(
        &self,
        query_text: &str,
    ) -> Result<Vec<TemplateStep>, LedgerError> {
        let rows = sqlx::query(
            "SELECT h.hop_order, h.sub_query, h.reasoning \
             FROM hops h \
             WHERE h.query_id = ( \
                 SELECT q.id FROM queries q \
                 JOIN responses r ON r.query_id = q.id \
                 WHERE q.text = ? AND r.user_feedback = 1 \
                 ORDER BY r.timestamp DESC LIMIT 1 \
             ) \
             ORDER BY h.hop_order ASC",
        )
        .bind(query_text)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TemplateStep {
                hop_order: r.get("hop_order"),
                sub_query: r.get("sub_query"),
                reasoning: r.get("reasoning"),
            })
            .collect())
    }

    pub async fn metrics(&self) -> Result<LedgerMetrics, LedgerError> {
        let positive: i64 =
            sqlx::query("SELECT COUNT(*) AS c FROM responses WHERE user_feedback = 1")
                .fetch_one(&self.pool)
                .await?
                .get("c");
        let negative: i64 =
            sqlx::query("SELECT COUNT(*) AS c FROM responses WHERE user_feedback = -1")
                .fetch_one(&self.pool)
                .await?
                .get("c");

        let failed_rows = sqlx::query(
            "SELECT sub_query, COUNT(*) AS cnt FROM hops WHERE status = 'failed' \
             GROUP BY sub_query ORDER BY cnt DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;
        let top_failed_sub_queries = failed_rows
            .into_iter()
            .map(|r| FailedSubQuery {
                sub_query: r.get("sub_query"),
                count: r.get("cnt"),
            })
            .collect();

        let negative_doc_rows = sqlx::query(
            "SELECT hd.document_id AS document_id, COUNT(*) AS cnt \
             FROM hop_documents hd \
             JOIN hops h ON h.id = hd.hop_id \
             JOIN responses r ON r.query_id = h.query_id \
             WHERE r.user_feedback = -1 \
             GROUP BY hd.document_id ORDER BY cnt DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;
        let top_negative_documents = negative_doc_rows
            .into_iter()
            .map(|r| NegativeDocument {
                document_id: r.get("document_id"),
                count: r.get("cnt"),
            })
            .collect();

        Ok(LedgerMetrics {
            positive_feedback: positive,
            negative_feedback: negative,
            total_feedback: positive + negative,
            top_failed_sub_queries,
            top_negative_documents,
        })
    }

    pub async fn get_response(&self, response_id: &str) -> Result<Option<Response>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, query_id, content, timestamp, user_feedback, user_correction \
             FROM responses WHERE id = ?",
        )
        .bind(response_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Response {
            id: r.get("id"),
            query_id: r.get("query_id"),
            content: r.get("content"),
            timestamp: r.get("timestamp"),
            user_feedback: r.get("user_feedback"),
            user_correction: r.get("user_correction"),
        }))
    }

    pub async fn get_query(&self, query_id: &str) -> Result<Option<Query>, LedgerError> {
        let row = sqlx::query("SELECT id, text, timestamp FROM queries WHERE id = ?")
            .bind(query_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Query {
            id: r.get("id"),
            text: r.get("text"),
            timestamp: r.get("timestamp"),
        }))
    }

    pub async fn get_hop(&self, hop_id: &str) -> Result<Option<Hop>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, query_id, hop_order, sub_query, reasoning, status FROM hops WHERE id = ?",
        )
        .bind(hop_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| {
            let status: String = r.get("status");
            Hop {
                id: r.get("id"),
                query_id: r.get("query_id"),
                hop_order: r.get("hop_order"),
                sub_query: r.get("sub_query"),
                reasoning: r.get("reasoning"),
                status: HopStatus::from_str(&status),
            }
        }))
    }

    pub async fn get_hop_documents(&self, hop_id: &str) -> Result<Vec<HopDocument>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, hop_id, document_id, dense_score, sparse_score, rank_position \
             FROM hop_documents WHERE hop_id = ? ORDER BY rank_position ASC",
        )
        .bind(hop_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| HopDocument {
                id: r.get("id"),
                hop_id: r.get("hop_id"),
                document_id: r.get("document_id"),
                dense_score: r.get("dense_score"),
                sparse_score: r.get("sparse_score"),
                rank_position: r.get("rank_position"),
            })
            .collect())
    }

    pub async fn get_evidence_chain(
        &self,
        response_id: &str,
    ) -> Result<Option<EvidenceChain>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, response_id, hop_ids, document_ids, confidence_score \
             FROM evidence_chains WHERE response_id = ?",
        )
        .bind(response_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| {
            let hop_ids_json: String = r.get("hop_ids");
            let document_ids_json: String = r.get("document_ids");
            EvidenceChain {
                id: r.get("id"),
                response_id: r.get("response_id"),
                hop_ids: serde_json::from_str(&hop_ids_json).unwrap_or_default(),
                document_ids: serde_json::from_str(&document_ids_json).unwrap_or_default(),
                confidence_score: r.get("confidence_score"),
            }
        }))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_and_read_round_trip() {
        let ledger = FeedbackLedger::in_memory().await.unwrap();
        ledger.log_query("q1", "hello").await.unwrap();
        ledger.log_hop("h1", "q1", 0, "hello", "Initial Query").await.unwrap();
        ledger
            .log_hop_document("hd1", "h1", "doc1", 0.8, 0.5, 1)
            .await
            .unwrap();
        ledger.log_response("r1", "q1", "answer").await.unwrap();

        let query = ledger.get_query("q1").await.unwrap().unwrap();
        assert_eq!(query.text, "hello");
        let hop = ledger.get_hop("h1").await.unwrap().unwrap();
        assert_eq!(hop.hop_order, 0);
        let docs = ledger.get_hop_documents("h1").await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn foreign_key_violation_is_rejected() {
        let ledger = FeedbackLedger::in_memory().await.unwrap();
        let result = ledger.log_hop("h1", "missing-query", 0, "x", "y").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn weakest_hop_is_marked_failed_on_negative_feedback() {
        let ledger = FeedbackLedger::in_memory().await.unwrap();
        ledger.log_query("q1", "compare a and b").await.unwrap();
        ledger.log_hop("h1", "q1", 0, "a", "Initial Query").await.unwrap();
        ledger.log_hop("h2", "q1", 1, "b", "LLM Generated").await.unwrap();
        // H1 mean = (0.9+0.5)/1 = 1.4, H2 mean = (0.4+0.2)/1 = 0.6
        ledger.log_hop_document("hd1", "h1", "doc1", 0.9, 0.5, 1).await.unwrap();
        ledger.log_hop_document("hd2", "h2", "doc2", 0.4, 0.2, 1).await.unwrap();
        ledger.log_response("r1", "q1", "answer").await.unwrap();
        ledger
            .log_evidence_chain("e1", "r1", &["h1".to_string(), "h2".to_string()], &["doc1".to_string(), "doc2".to_string()], 0.7)
            .await
            .unwrap();

        ledger.submit_feedback("r1", -1, None).await.unwrap();

        let h1 = ledger.get_hop("h1").await.unwrap().unwrap();
        let h2 = ledger.get_hop("h2").await.unwrap().unwrap();
        assert_eq!(h1.status, HopStatus::Pending);
        assert_eq!(h2.status, HopStatus::Failed);
        let response = ledger.get_response("r1").await.unwrap().unwrap();
        assert_eq!(response.user_feedback, -1);
    }

    #[tokio::test]
    async fn feedback_can_flip_from_positive_to_negative() {
        let ledger = FeedbackLedger::in_memory().await.unwrap();
        ledger.log_query("q1", "hi").await.unwrap();
        ledger.log_response("r1", "q1", "answer").await.unwrap();
        ledger.submit_feedback("r1", 1, None).await.unwrap();
        ledger.submit_feedback("r1", -1, None).await.unwrap();
        let response = ledger.get_response("r1").await.unwrap().unwrap();
        assert_eq!(response.user_feedback, -1);
    }

    #[tokio::test]
    async fn document_global_score_is_zero_with_no_feedback() {
        let ledger = FeedbackLedger::in_memory().await.unwrap();
        let score = ledger.get_document_global_score("nonexistent").await.unwrap();
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn successful_template_is_found_by_exact_text_match() {
        let ledger = FeedbackLedger::in_memory().await.unwrap();
        ledger.log_query("q1", "compare a and b").await.unwrap();
        ledger.log_hop("h1", "q1", 0, "a", "Initial Query").await.unwrap();
        ledger.log_hop("h2", "q1", 1, "b", "LLM Generated").await.unwrap();
        ledger.log_response("r1", "q1", "answer").await.unwrap();
        ledger.submit_feedback("r1", 1, None).await.unwrap();

        let template = ledger.get_successful_template("compare a and b").await.unwrap();
        assert_eq!(template.len(), 2);
        assert_eq!(template[0].sub_query, "a");
        assert_eq!(template[1].sub_query, "b");

        let none = ledger.get_successful_template("unrelated").await.unwrap();
        assert!(none.is_empty());
    }
}
