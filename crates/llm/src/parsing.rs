//! Shared helper for stripping Markdown code fences off LLM JSON output.
//!
//! Models are routinely instructed to "return JSON" and instead wrap it in
//! a ` ```json ... ``` ` fence anyway. Both the decomposition loop and the
//! answer parser need the same tolerant strip before calling into `serde_json`.

/// Trims surrounding whitespace and an optional leading ` ```json `/` ``` `
/// fence and trailing ` ``` ` fence.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_plain_fence() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn leaves_unfenced_text_unchanged() {
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }
}
