//! LLM backend abstraction.
//!
//! A single `LlmBackend` trait is implemented by an Ollama-compatible HTTP
//! backend. Buffered and streaming generation are both supported; the
//! orchestrator decides which to use per call.

pub mod backend;
pub mod parsing;
pub mod prompt;

pub use backend::{FinishReason, GenerationResult, LlmBackend, LlmSettings, OllamaBackend};
pub use parsing::strip_code_fence;
pub use prompt::{Message, Role};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation error: {0}")]
    Generation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for ragqa_core::Error {
    fn from(err: LlmError) -> Self {
        ragqa_core::Error::Llm(err.to_string())
    }
}
