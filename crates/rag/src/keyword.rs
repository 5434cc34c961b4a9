//! Keyword extraction & scoring (C3): lightweight lexical overlap signal
//! that complements C1/C2's dense similarity.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being",
    "of", "in", "on", "at", "to", "for", "with", "by", "from", "as", "that", "this", "these",
    "those", "it", "its", "into", "about", "what", "which", "who", "whom", "how", "why", "when",
    "where", "can", "could", "will", "would", "should", "do", "does", "did", "has", "have", "had",
    "not", "you", "your", "i", "we", "our", "they", "their",
];

/// `extractKeywords(text) -> set of terms`: lowercase, split on
/// non-alphanumerics, drop stopwords and tokens shorter than 3 characters.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 3)
        .filter(|token| !STOPWORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

/// `calculateKeywordScore(keywords, documentText) -> [0,1]`: fraction of
/// distinct query keywords appearing as substrings of `document_text`.
pub fn calculate_keyword_score(keywords: &HashSet<String>, document_text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = document_text.to_lowercase();
    let hits = keywords.iter().filter(|kw| haystack.contains(kw.as_str())).count();
    hits as f64 / keywords.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_content_words_only() {
        let keywords = extract_keywords("What is the interest rate on a gold loan?");
        assert!(keywords.contains("interest"));
        assert!(keywords.contains("rate"));
        assert!(keywords.contains("gold"));
        assert!(keywords.contains("loan"));
        assert!(!keywords.contains("the"));
        assert!(!keywords.contains("is"));
        assert!(!keywords.contains("on"));
    }

    #[test]
    fn drops_tokens_shorter_than_three_chars() {
        let keywords = extract_keywords("a an it is ok no");
        assert!(keywords.is_empty() || keywords.contains("ok") == false);
    }

    #[test]
    fn empty_keywords_score_zero() {
        let keywords = HashSet::new();
        assert_eq!(calculate_keyword_score(&keywords, "anything goes here"), 0.0);
    }

    #[test]
    fn score_is_fraction_of_matching_keywords() {
        let keywords = extract_keywords("gold loan interest rate");
        let score = calculate_keyword_score(&keywords, "Our gold loan has a competitive interest rate.");
        assert!((score - 1.0).abs() < 1e-9);

        let partial = calculate_keyword_score(&keywords, "Our gold loan is popular.");
        assert!(partial > 0.0 && partial < 1.0);
    }
}
