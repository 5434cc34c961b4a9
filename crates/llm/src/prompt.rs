//! Chat message shape and the three prompt templates the orchestrator uses
//! (general, RAG, query-decomposition).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

const GENERAL_SYSTEM_PROMPT: &str = "You are a helpful assistant. Respond to the user's message. \
Return your answer as JSON of the shape {\"blocks\": [{\"type\": \"paragraph\", \"content\": \"...\"}]}.";

const RAG_SYSTEM_PROMPT_PREFIX: &str = "You are a helpful assistant answering from the provided \
context only. If the context does not contain the answer, say so. \
Return your answer as JSON of the shape {\"blocks\": [{\"type\": \"paragraph\", \"content\": \"...\"}]}.\n\nContext:\n";

const DECOMPOSITION_SYSTEM_PROMPT: &str = "You are a query planning assistant. Given the context \
gathered so far and the original question, decide whether the context is sufficient to answer it. \
Return JSON of the shape {\"sufficient\": bool, \"queries\": [string, ...]}. \
If sufficient, return an empty \"queries\" array. If not sufficient, list focused sub-queries that \
would fill the gaps.";

/// Builds the *general prompt*: a system message plus the conversation window
/// plus the new user message, with no retrieval context.
pub fn general_messages(window: &[Message], user_message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(Message::system(GENERAL_SYSTEM_PROMPT));
    messages.extend_from_slice(window);
    messages.push(Message::user(user_message));
    messages
}

/// Builds the *RAG prompt(context)*: a system message carrying the
/// concatenated retrieval context, the conversation window, and the new
/// user message.
pub fn rag_messages(context: &str, window: &[Message], user_message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(Message::system(format!(
        "{}{}",
        RAG_SYSTEM_PROMPT_PREFIX, context
    )));
    messages.extend_from_slice(window);
    messages.push(Message::user(user_message));
    messages
}

/// Builds the *query-decomposition prompt* used by the EVALUATE step.
pub fn decomposition_messages(context: &str, original_query: &str) -> Vec<Message> {
    vec![
        Message::system(DECOMPOSITION_SYSTEM_PROMPT),
        Message::user(format!(
            "Context so far:\n{}\n\nOriginal question: {}",
            context, original_query
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_messages_places_user_message_last() {
        let window = vec![Message::user("hi"), Message::assistant("hello")];
        let messages = general_messages(&window, "what's up");
        assert_eq!(messages.last().unwrap().content, "what's up");
        assert_eq!(messages[0].role, Role::System);
    }

    #[test]
    fn rag_messages_embed_context_in_system_message() {
        let messages = rag_messages("Project X launched in 2024.", &[], "What is Project X?");
        assert!(messages[0].content.contains("Project X launched in 2024."));
    }
}
