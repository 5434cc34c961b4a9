//! The feedback and evidence ledger (C4).
//!
//! Durably records every query, hop, retrieved document, response, and
//! evidence chain in SQLite, with foreign keys enforced by the database so
//! the lifecycle invariants in the data model hold without being
//! re-implemented in application code.

pub mod feedback_ledger;
pub mod schema;

pub use feedback_ledger::{FailedSubQuery, FeedbackLedger, LedgerMetrics, NegativeDocument};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<LedgerError> for ragqa_core::Error {
    fn from(err: LedgerError) -> Self {
        ragqa_core::Error::Ledger(err.to_string())
    }
}
