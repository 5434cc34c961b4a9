//! ConversationMemory (C8): process-wide, per-conversation turn history.
//!
//! Generalises the teacher's `DashMap`-keyed registries (see
//! `agent-registry`'s `DashMap<Uuid, Agent>`) to a conversation-id keyed map
//! of per-conversation turn queues, each guarded independently so that
//! concurrent appends to different conversations never contend.

use std::collections::VecDeque;

use dashmap::DashMap;
use parking_lot::Mutex;

use ragqa_core::{ConversationEntry, Role};

/// Number of most recent turns retained per conversation.
const WINDOW_SIZE: usize = 6;

pub struct ConversationMemory {
    conversations: DashMap<String, Mutex<VecDeque<ConversationEntry>>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
        }
    }

    /// `get(conversationId) -> current sequence`.
    pub fn get(&self, conversation_id: &str) -> Vec<ConversationEntry> {
        self.conversations
            .get(conversation_id)
            .map(|entry| entry.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `append(id, role, content)`: push to the tail, trim from the head
    /// once the window exceeds `WINDOW_SIZE`.
    pub fn append(&self, conversation_id: &str, role: Role, content: impl Into<String>) {
        let entry = self
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(WINDOW_SIZE + 1)));
        let mut turns = entry.lock();
        turns.push_back(ConversationEntry {
            role,
            content: content.into(),
        });
        while turns.len() > WINDOW_SIZE {
            turns.pop_front();
        }
    }

    pub fn append_user(&self, conversation_id: &str, content: impl Into<String>) {
        self.append(conversation_id, Role::User, content);
    }

    pub fn append_assistant(&self, conversation_id: &str, content: impl Into<String>) {
        self.append(conversation_id, Role::Assistant, content);
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_unknown_conversation_returns_empty() {
        let memory = ConversationMemory::new();
        assert!(memory.get("unknown").is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let memory = ConversationMemory::new();
        memory.append_user("c1", "hello");
        memory.append_assistant("c1", "hi there");
        let turns = memory.get("c1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn window_trims_from_head_past_six_turns() {
        let memory = ConversationMemory::new();
        for i in 0..10 {
            memory.append_user("c1", format!("turn {i}"));
        }
        let turns = memory.get("c1");
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[0].content, "turn 4");
        assert_eq!(turns[5].content, "turn 9");
    }

    #[test]
    fn independent_conversations_do_not_interfere() {
        let memory = ConversationMemory::new();
        memory.append_user("c1", "a");
        memory.append_user("c2", "b");
        assert_eq!(memory.get("c1").len(), 1);
        assert_eq!(memory.get("c2").len(), 1);
        assert_eq!(memory.get("c1")[0].content, "a");
    }
}
