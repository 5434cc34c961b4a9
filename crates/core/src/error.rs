//! Top-level error type
//!
//! Component crates keep their own `thiserror` enum (`RagError`, `LlmError`,
//! `LedgerError`, `AgentError`) and bridge into this one via `From` impls,
//! so the server layer only ever matches on a single type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// True for the input-validation kind that must surface as HTTP 400.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}
