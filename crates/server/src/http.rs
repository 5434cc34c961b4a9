//! HTTP Endpoints
//!
//! REST and SSE surface for the question-answering engine.

use std::convert::Infallible;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ragqa_core::{Block, Source};

use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/feedback", post(feedback))
        .route("/api/debug/metrics", get(debug_metrics))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    blocks: Vec<Block>,
    sources: Vec<Source>,
    mode: String,
    request_id: String,
}

/// `POST /api/chat` — buffered request/response.
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> impl IntoResponse {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "message is required"})),
        )
            .into_response();
    }

    match state
        .orchestrator
        .answer(&request.message, request.conversation_id)
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(ChatResponse {
                blocks: result.blocks,
                sources: result.sources,
                mode: result.mode,
                request_id: result.request_id,
            }),
        )
            .into_response(),
        Err(failure) => {
            let body = failure.fallback_body();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    blocks: body.blocks,
                    sources: body.sources,
                    mode: body.mode,
                    request_id: body.request_id,
                }),
            )
                .into_response()
        }
    }
}

/// `POST /api/chat/stream` — Server-Sent Events.
async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<(axum::http::HeaderMap, Sse<impl Stream<Item = Result<Event, Infallible>>>), StatusCode> {
    if request.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let orchestrator = state.orchestrator;
    let events = orchestrator.answer_stream(request.message, request.conversation_id);

    let stream = events.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(data))
    });

    Ok((
        sse_headers(),
        Sse::new(stream).keep_alive(KeepAlive::default()),
    ))
}

fn sse_headers() -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert("Cache-Control", "no-cache".parse().unwrap());
    headers.insert("Connection", "keep-alive".parse().unwrap());
    headers.insert("X-Accel-Buffering", "no".parse().unwrap());
    headers
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    response_id: Option<String>,
    feedback: Option<i64>,
    correction: Option<String>,
}

#[derive(Debug, Serialize)]
struct FeedbackResponse {
    status: String,
    message: String,
}

/// `POST /api/feedback`.
async fn feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> impl IntoResponse {
    let (Some(response_id), Some(feedback_value)) = (request.response_id, request.feedback) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(FeedbackResponse {
                status: "error".to_string(),
                message: "response_id and feedback are required".to_string(),
            }),
        );
    };

    if feedback_value != -1 && feedback_value != 1 {
        return (
            StatusCode::BAD_REQUEST,
            Json(FeedbackResponse {
                status: "error".to_string(),
                message: "feedback must be -1 or 1".to_string(),
            }),
        );
    }

    match state
        .feedback_service
        .submit_feedback(&response_id, feedback_value, request.correction.as_deref())
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(FeedbackResponse {
                status: "success".to_string(),
                message: "feedback recorded".to_string(),
            }),
        ),
        Err(err) => {
            tracing::error!(error = %err, "failed to submit feedback");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FeedbackResponse {
                    status: "error".to_string(),
                    message: "failed to record feedback".to_string(),
                }),
            )
        }
    }
}

/// `GET /api/debug/metrics`.
async fn debug_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.metrics().await {
        Ok(metrics) => (StatusCode::OK, Json(serde_json::to_value(metrics).unwrap())).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to load debug metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "failed to load metrics"})),
            )
                .into_response()
        }
    }
}

/// `GET /health`.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_router_creation() {
        let settings = ragqa_config::Settings::default();
        let state = AppState::new(settings).await.expect("state should construct");
        let _ = create_router(state);
    }
}
