//! Persistent record shapes written and read by the feedback ledger.

use serde::{Deserialize, Serialize};

/// Status of a [`Hop`]. Set to `Failed` only by the weakest-link diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopStatus {
    Pending,
    Failed,
}

impl HopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HopStatus::Pending => "pending",
            HopStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "failed" => HopStatus::Failed,
            _ => HopStatus::Pending,
        }
    }
}

/// Created at the start of every knowledge-mode retrieval; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
    pub timestamp: i64,
}

/// Created when a sub-query is about to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    pub id: String,
    pub query_id: String,
    pub hop_order: i64,
    pub sub_query: String,
    pub reasoning: String,
    pub status: HopStatus,
}

/// Records every document surfaced by every hop in ranked order. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopDocument {
    pub id: String,
    pub hop_id: String,
    pub document_id: String,
    pub dense_score: f64,
    pub sparse_score: f64,
    pub rank_position: i64,
}

/// Created at answer completion; `user_feedback`/`user_correction` are
/// mutated exactly once by the feedback-submit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub query_id: String,
    pub content: String,
    pub timestamp: i64,
    pub user_feedback: i64,
    pub user_correction: Option<String>,
}

/// One per response; immutable after write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceChain {
    pub id: String,
    pub response_id: String,
    pub hop_ids: Vec<String>,
    pub document_ids: Vec<String>,
    pub confidence_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_status_round_trips_through_str() {
        assert_eq!(HopStatus::from_str("failed").as_str(), "failed");
        assert_eq!(HopStatus::from_str("pending").as_str(), "pending");
        assert_eq!(HopStatus::from_str("anything-else").as_str(), "pending");
    }
}
