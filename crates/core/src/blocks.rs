//! Answer output shapes: the tagged `Block` variant and source provenance.

use serde::{Deserialize, Serialize};

/// One unit of structured answer output.
///
/// Produced by parsing the LLM's JSON response; if parsing fails the raw
/// text is wrapped as a single [`Block::Paragraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Paragraph { content: String },
    List { items: Vec<String> },
    Code { language: String, content: String },
    Heading { content: String },
}

impl Block {
    pub fn paragraph(content: impl Into<String>) -> Self {
        Block::Paragraph {
            content: content.into(),
        }
    }
}

/// Provenance attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub source: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_helper_builds_paragraph_variant() {
        let block = Block::paragraph("hello");
        assert_eq!(block, Block::Paragraph { content: "hello".to_string() });
    }

    #[test]
    fn block_serializes_with_type_tag() {
        let block = Block::Code {
            language: "rust".to_string(),
            content: "fn main() {}".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "code");
        assert_eq!(json["language"], "rust");
    }
}
