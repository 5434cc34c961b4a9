//! The `LlmBackend` trait and its Ollama-compatible HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::prompt::Message;
use crate::LlmError;

/// Settings for [`OllamaBackend`].
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "llama3.1:8b".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// A text-in / text-stream-out LLM provider.
///
/// Retrieval calls are not retried per spec §5, but an LLM call is: a
/// transient provider error is retried with exponential backoff up to
/// `max_retries` times before surfacing as [`LlmError`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Buffered generation: returns the full response text.
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Streaming generation: forwards each chunk of generated text on `tx`
    /// as it arrives. The channel closing early (receiver dropped) is not an
    /// error — it signals the caller cancelled the stream.
    async fn generate_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<(), LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [OllamaMessage<'a>],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama-compatible HTTP backend, the reference `LlmBackend` implementation.
#[derive(Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl OllamaBackend {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(LlmError::from)?;
        Ok(Self { client, settings })
    }

    fn api_url(&self) -> String {
        format!("{}/api/chat", self.settings.endpoint.trim_end_matches('/'))
    }

    fn to_ollama_messages(messages: &[Message]) -> Vec<OllamaMessage<'_>> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    crate::prompt::Role::System => "system",
                    crate::prompt::Role::User => "user",
                    crate::prompt::Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }

    fn is_retryable(err: &LlmError) -> bool {
        matches!(err, LlmError::Network(_) | LlmError::Timeout)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let ollama_messages = Self::to_ollama_messages(messages);
        let request = OllamaChatRequest {
            model: &self.settings.model,
            messages: &ollama_messages,
            stream: false,
        };

        let mut backoff = self.settings.initial_backoff;
        let mut last_err = None;
        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            match self.execute_request(&request).await {
                Ok(result) => return Ok(result),
                Err(e) if Self::is_retryable(&e) => {
                    tracing::warn!(attempt, error = %e, "llm request failed, retrying");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(LlmError::Generation("exhausted retries".to_string())))
    }

    async fn generate_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<(), LlmError> {
        let ollama_messages = Self::to_ollama_messages(messages);
        let request = OllamaChatRequest {
            model: &self.settings.model,
            messages: &ollama_messages,
            stream: true,
        };

        let response = self
            .client
            .post(self.api_url())
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        use futures::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                let parsed: OllamaChatResponse = match serde_json::from_str(&line) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if !parsed.message.content.is_empty() && tx.send(parsed.message.content).await.is_err()
                {
                    // Receiver dropped: caller cancelled the stream.
                    return Ok(());
                }
                if parsed.done {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

impl OllamaBackend {
    async fn execute_request(
        &self,
        request: &OllamaChatRequest<'_>,
    ) -> Result<GenerationResult, LlmError> {
        let response = self
            .client
            .post(self.api_url())
            .json(request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        let body: OllamaChatResponse = response.json().await?;
        Ok(GenerationResult {
            text: body.message.content,
            finish_reason: FinishReason::Stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_ollama_convention() {
        let settings = LlmSettings::default();
        assert_eq!(settings.endpoint, "http://localhost:11434");
        assert_eq!(settings.max_retries, 3);
    }
}
