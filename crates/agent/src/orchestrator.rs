//! AnswerOrchestrator (C7): routes an incoming message through the general
//! or knowledge path, turning LLM output into Blocks and persisting turns.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use ragqa_core::{new_id, short_request_id, Block, Role, Source};
use ragqa_ledger::FeedbackLedger;
use ragqa_llm::{prompt, LlmBackend};
use ragqa_rag::{HybridRetriever, MultiHopController};

use crate::memory::ConversationMemory;

/// `detectMode` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    General,
    Knowledge,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Knowledge => "rag",
        }
    }
}

/// Keywords that route a message to the knowledge (retrieval) path.
const KNOWLEDGE_KEYWORDS: &[&str] = &[
    "what", "who", "when", "where", "why", "how", "which", "explain", "compare", "define",
];

/// `detectMode(message) -> {general, knowledge}`. Pure and deterministic:
/// a message containing a question mark or a wh-word routes to knowledge.
pub fn detect_mode(message: &str) -> Mode {
    let lower = message.to_lowercase();
    if lower.contains('?') {
        return Mode::Knowledge;
    }
    let first_word = lower.split_whitespace().next().unwrap_or("");
    if KNOWLEDGE_KEYWORDS.contains(&first_word) {
        return Mode::Knowledge;
    }
    Mode::General
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub blocks: Vec<Block>,
    pub sources: Vec<Source>,
    pub mode: String,
    pub request_id: String,
}

/// Returned by [`AnswerOrchestrator::answer`] when the LLM call itself
/// fails or times out. Carries just the request id; the fixed error body
/// (§6: `500 {blocks:[paragraph(...)], sources:[], mode:"general", ...}`)
/// is rebuilt on demand so the one error message lives in one place.
#[derive(Debug, Clone)]
pub struct AnswerFailure {
    pub request_id: String,
}

impl AnswerFailure {
    pub fn fallback_body(&self) -> AnswerResult {
        AnswerResult {
            blocks: vec![Block::paragraph(ERROR_MESSAGE)],
            sources: Vec::new(),
            mode: Mode::General.as_str().to_string(),
            request_id: self.request_id.clone(),
        }
    }
}

/// One SSE-shaped event emitted by `answer_stream`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Meta {
        mode: String,
        sources: Vec<Source>,
        request_id: String,
    },
    Chunk {
        data: String,
    },
    Done,
    Error {
        message: String,
    },
}

const FALLBACK_MESSAGE: &str = "I don't have that information in my knowledge base yet.";
const ERROR_MESSAGE: &str = "I encountered an issue while answering your question.";

pub struct AnswerOrchestrator {
    retriever: Arc<HybridRetriever>,
    multihop: Arc<MultiHopController>,
    ledger: Arc<FeedbackLedger>,
    llm: Arc<dyn LlmBackend>,
    memory: Arc<ConversationMemory>,
    similarity_threshold: f64,
    max_hops: u32,
    response_timeout: Duration,
}

impl AnswerOrchestrator {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        multihop: Arc<MultiHopController>,
        ledger: Arc<FeedbackLedger>,
        llm: Arc<dyn LlmBackend>,
        memory: Arc<ConversationMemory>,
        similarity_threshold: f64,
        max_hops: u32,
        response_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            multihop,
            ledger,
            llm,
            memory,
            similarity_threshold,
            max_hops,
            response_timeout,
        }
    }

    /// `answer(message, conversationId?)` — buffered request/response.
    /// `Err` carries the request id the caller surfaces as an HTTP 500
    /// alongside the fixed error body from [`AnswerFailure::fallback_body`].
    pub async fn answer(
        &self,
        message: &str,
        conversation_id: Option<String>,
    ) -> Result<AnswerResult, AnswerFailure> {
        let request_id = short_request_id();
        let conversation_id = conversation_id.unwrap_or_else(|| request_id.clone());

        match detect_mode(message) {
            Mode::General => self.answer_general(message, &conversation_id, &request_id).await,
            Mode::Knowledge => self.answer_knowledge(message, &conversation_id, &request_id).await,
        }
    }

    async fn answer_general(
        &self,
        message: &str,
        conversation_id: &str,
        request_id: &str,
    ) -> Result<AnswerResult, AnswerFailure> {
        let window = self.window_messages(conversation_id);
        let messages = prompt::general_messages(&window, message);

        let result = match tokio::time::timeout(self.response_timeout, self.llm.generate(&messages)).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "llm call failed in general path");
                return Err(AnswerFailure { request_id: request_id.to_string() });
            }
            Err(_) => {
                tracing::warn!("llm call timed out in general path");
                return Err(AnswerFailure { request_id: request_id.to_string() });
            }
        };
        let blocks = parse_llm_json_response(&result.text);

        self.memory.append_user(conversation_id, message);
        self.memory.append_assistant(conversation_id, blocks_to_text(&blocks));

        Ok(AnswerResult {
            blocks,
            sources: Vec::new(),
            mode: Mode::General.as_str().to_string(),
            request_id: request_id.to_string(),
        })
    }

    async fn answer_knowledge(
        &self,
        message: &str,
        conversation_id: &str,
        request_id: &str,
    ) -> Result<AnswerResult, AnswerFailure> {
        let outcome = self.multihop.run(message, self.max_hops).await;
        let highest = HybridRetriever::highest_score(&outcome.results);

        let should_use_rag = highest.map(|h| h >= self.similarity_threshold).unwrap_or(false);
        if !should_use_rag {
            return Ok(self.fallback_result(request_id));
        }

        let (context, sources) = build_context_and_sources(&outcome.results, self.similarity_threshold);
        if context.trim().is_empty() {
            return Ok(self.fallback_result(request_id));
        }

        let window = self.window_messages(conversation_id);
        let messages = prompt::rag_messages(&context, &window, message);

        let result = match tokio::time::timeout(self.response_timeout, self.llm.generate(&messages)).await
        {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "llm call failed in knowledge path");
                return Err(AnswerFailure { request_id: request_id.to_string() });
            }
            Err(_) => {
                tracing::warn!("llm call timed out in knowledge path");
                return Err(AnswerFailure { request_id: request_id.to_string() });
            }
        };
        let blocks = parse_llm_json_response(&result.text);

        self.memory.append_user(conversation_id, message);
        self.memory.append_assistant(conversation_id, blocks_to_text(&blocks));
        self.persist_evidence(&outcome, &blocks).await;

        Ok(AnswerResult {
            blocks,
            sources,
            mode: Mode::Knowledge.as_str().to_string(),
            request_id: request_id.to_string(),
        })
    }

    fn fallback_result(&self, request_id: &str) -> AnswerResult {
        AnswerResult {
            blocks: vec![Block::paragraph(FALLBACK_MESSAGE)],
            sources: Vec::new(),
            mode: Mode::Knowledge.as_str().to_string(),
            request_id: request_id.to_string(),
        }
    }

    /// `answerStream(message, conversationId?)` — SSE-shaped frames:
    /// `meta` once, `chunk` per LLM token, then `done`.
    pub fn answer_stream(
        self: Arc<Self>,
        message: String,
        conversation_id: Option<String>,
    ) -> impl Stream<Item = StreamEvent> {
        stream! {
            let request_id = short_request_id();
            let conversation_id = conversation_id.unwrap_or_else(|| request_id.clone());
            let mode = detect_mode(&message);
            let mut knowledge_outcome: Option<ragqa_rag::MultiHopOutcome> = None;

            let (messages, sources, fallback) = match mode {
                Mode::General => {
                    let window = self.window_messages(&conversation_id);
                    (prompt::general_messages(&window, &message), Vec::new(), None)
                }
                Mode::Knowledge => {
                    let outcome = self.multihop.run(&message, self.max_hops).await;
                    let highest = HybridRetriever::highest_score(&outcome.results);
                    let should_use_rag = highest.map(|h| h >= self.similarity_threshold).unwrap_or(false);

                    if !should_use_rag {
                        (Vec::new(), Vec::new(), Some(FALLBACK_MESSAGE.to_string()))
                    } else {
                        let (context, sources) =
                            build_context_and_sources(&outcome.results, self.similarity_threshold);
                        if context.trim().is_empty() {
                            (Vec::new(), Vec::new(), Some(FALLBACK_MESSAGE.to_string()))
                        } else {
                            let window = self.window_messages(&conversation_id);
                            let messages = prompt::rag_messages(&context, &window, &message);
                            knowledge_outcome = Some(outcome);
                            (messages, sources, None)
                        }
                    }
                }
            };

            yield StreamEvent::Meta {
                mode: mode.as_str().to_string(),
                sources: sources.clone(),
                request_id: request_id.clone(),
            };

            if let Some(fallback_text) = fallback {
                yield StreamEvent::Chunk { data: fallback_text.clone() };
                self.memory.append_user(&conversation_id, &message);
                self.memory.append_assistant(&conversation_id, fallback_text);
                yield StreamEvent::Done;
                return;
            }

            let (tx, mut rx) = mpsc::channel::<String>(32);
            let llm = Arc::clone(&self.llm);
            let generation = tokio::spawn(async move { llm.generate_stream(&messages, tx).await });

            let mut full_content = String::new();
            let deadline = tokio::time::sleep(self.response_timeout);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    chunk = rx.recv() => {
                        match chunk {
                            Some(data) => {
                                full_content.push_str(&data);
                                yield StreamEvent::Chunk { data };
                            }
                            None => break,
                        }
                    }
                    _ = &mut deadline => {
                        tracing::warn!("llm stream timed out, finalising with partial content");
                        break;
                    }
                }
            }

            match generation.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "llm stream generation failed");
                    if full_content.is_empty() {
                        yield StreamEvent::Error { message: ERROR_MESSAGE.to_string() };
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "llm stream task panicked");
                }
            }

            if !full_content.is_empty() {
                self.memory.append_user(&conversation_id, &message);
                self.memory.append_assistant(&conversation_id, &full_content);
                if let Some(outcome) = &knowledge_outcome {
                    self.persist_evidence(outcome, &[Block::paragraph(full_content.clone())]).await;
                }
            }

            yield StreamEvent::Done;
        }
    }

    fn window_messages(&self, conversation_id: &str) -> Vec<ragqa_llm::Message> {
        self.memory
            .get(conversation_id)
            .into_iter()
            .map(|entry| match entry.role {
                Role::User => ragqa_llm::Message::user(entry.content),
                Role::Assistant => ragqa_llm::Message::assistant(entry.content),
            })
            .collect()
    }

    async fn persist_evidence(&self, outcome: &ragqa_rag::MultiHopOutcome, blocks: &[Block]) {
        let response_id = new_id();
        let content = blocks_to_text(blocks);
        if let Err(err) = self
            .ledger
            .log_response(&response_id, &outcome.query_id, &content)
            .await
        {
            tracing::error!(error = %err, "failed to log response");
            return;
        }

        let document_ids: Vec<String> = outcome.results.iter().map(|r| r.id.clone()).collect();
        let confidence = HybridRetriever::highest_score(&outcome.results).unwrap_or(0.0);
        if let Err(err) = self
            .ledger
            .log_evidence_chain(&new_id(), &response_id, &outcome.hop_ids, &document_ids, confidence)
            .await
        {
            tracing::error!(error = %err, "failed to log evidence chain");
        }
    }
}

/// `parseLlmJsonResponse(text)`: trims fences, parses `{blocks: [...]}`.
/// Never throws: any parse failure wraps the raw text as one paragraph.
pub fn parse_llm_json_response(text: &str) -> Vec<Block> {
    let stripped = ragqa_llm::strip_code_fence(text);
    match serde_json::from_str::<RawResponse>(&stripped) {
        Ok(raw) if !raw.blocks.is_empty() => raw.blocks.into_iter().map(RawBlock::into_block).collect(),
        _ => vec![Block::paragraph(text.trim())],
    }
}

#[derive(serde::Deserialize)]
struct RawResponse {
    #[serde(default)]
    blocks: Vec<RawBlock>,
}

#[derive(serde::Deserialize)]
struct RawBlock {
    #[serde(default = "default_block_type")]
    r#type: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    language: String,
}

fn default_block_type() -> String {
    "paragraph".to_string()
}

impl RawBlock {
    fn into_block(self) -> Block {
        match self.r#type.as_str() {
            "list" => Block::List { items: self.items },
            "code" => Block::Code {
                language: self.language,
                content: self.content,
            },
            "heading" => Block::Heading { content: self.content },
            _ => Block::Paragraph { content: self.content },
        }
    }
}

fn blocks_to_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| match b {
            Block::Paragraph { content } | Block::Heading { content } => content.clone(),
            Block::Code { content, .. } => content.clone(),
            Block::List { items } => items.join(", "),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_context_and_sources(
    results: &[ragqa_rag::HybridResult],
    threshold: f64,
) -> (String, Vec<Source>) {
    let mut texts = Vec::new();
    let mut sources = Vec::new();
    for result in results.iter().filter(|r| r.final_score >= threshold) {
        if let Some(serde_json::Value::String(text)) = result.metadata.get("text") {
            texts.push(text.clone());
        }
        let title = match result.metadata.get("title") {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => result.id.clone(),
        };
        let source = match result.metadata.get("source") {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        sources.push(Source {
            title,
            source,
            score: result.final_score,
        });
    }
    (texts.join("\n\n"), sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_knowledge_mode_on_question_mark() {
        assert_eq!(detect_mode("what is project x?"), Mode::Knowledge);
    }

    #[test]
    fn detects_general_mode_for_plain_statement() {
        assert_eq!(detect_mode("hello there"), Mode::General);
    }

    #[test]
    fn detects_knowledge_mode_on_leading_wh_word() {
        assert_eq!(detect_mode("how does this work"), Mode::Knowledge);
    }

    #[test]
    fn parse_llm_json_response_extracts_blocks() {
        let text = "```json\n{\"blocks\": [{\"type\": \"paragraph\", \"content\": \"hi\"}]}\n```";
        let blocks = parse_llm_json_response(text);
        assert_eq!(blocks, vec![Block::paragraph("hi")]);
    }

    #[test]
    fn parse_llm_json_response_defaults_missing_type_to_paragraph() {
        let text = "{\"blocks\": [{\"content\": \"hi\"}]}";
        let blocks = parse_llm_json_response(text);
        assert_eq!(blocks, vec![Block::paragraph("hi")]);
    }

    #[test]
    fn parse_llm_json_response_wraps_raw_text_on_failure() {
        let blocks = parse_llm_json_response("not json at all");
        assert_eq!(blocks, vec![Block::paragraph("not json at all")]);
    }

    #[test]
    fn parse_llm_json_response_never_panics_on_empty_input() {
        let blocks = parse_llm_json_response("");
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn build_context_and_sources_filters_by_threshold() {
        use std::collections::HashMap;
        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), serde_json::Value::String("kept text".to_string()));
        metadata.insert("title".to_string(), serde_json::Value::String("Doc".to_string()));
        let results = vec![ragqa_rag::HybridResult {
            id: "a".to_string(),
            semantic_score: 0.9,
            keyword_score: 0.0,
            feedback_score: 0.0,
            appears_in_both: false,
            final_score: 0.6,
            metadata,
        }];
        let (context, sources) = build_context_and_sources(&results, 0.5);
        assert!(context.contains("kept text"));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "Doc");
    }
}
