//! HTTP server binding for the question-answering engine.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("startup error: {0}")]
    Startup(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Startup(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ragqa_core::Error> for ServerError {
    fn from(err: ragqa_core::Error) -> Self {
        if err.is_invalid_input() {
            ServerError::InvalidRequest(err.to_string())
        } else {
            ServerError::Internal(err.to_string())
        }
    }
}
