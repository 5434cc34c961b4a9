//! Core types for the RAG question-answering engine
//!
//! This crate provides foundational types used across all other crates:
//! - The answer-block tagged variant and source provenance
//! - Persistent record shapes (Query, Hop, HopDocument, Response, EvidenceChain)
//! - Conversation memory entries
//! - The top-level error type

pub mod blocks;
pub mod conversation;
pub mod error;
pub mod ids;
pub mod records;

pub use blocks::{Block, Source};
pub use conversation::{ConversationEntry, Role};
pub use error::{Error, Result};
pub use ids::{new_id, short_request_id};
pub use records::{EvidenceChain, Hop, HopDocument, HopStatus, Query, Response};
