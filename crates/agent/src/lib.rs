//! Answer orchestration (C7) and process-wide conversation memory (C8).

pub mod memory;
pub mod orchestrator;

pub use memory::ConversationMemory;
pub use orchestrator::{
    detect_mode, parse_llm_json_response, AnswerFailure, AnswerOrchestrator, AnswerResult, Mode,
    StreamEvent,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("orchestration error: {0}")]
    Orchestration(String),
}

impl From<AgentError> for ragqa_core::Error {
    fn from(err: AgentError) -> Self {
        ragqa_core::Error::Agent(err.to_string())
    }
}
