//! Text analysis for session recall.
//!
//! Two jobs live here. First, the shared word tokenizer that both the
//! indexing side and the query side use, so a stored token stream and a
//! query tokenize identically. Second, the context analyzer: given a blob
//! of working context (issue lists, commit messages, whatever the caller
//! scraped together), pull out the keywords and technical vocabulary and
//! synthesize a short search query from them.
//!
//! Everything in this crate is pure: no I/O, no caches, no side effects.
//!
//! ```
//! use analyze::{analyze, tokenize_words};
//!
//! let tokens = tokenize_words("Fix JWT auth bug");
//! assert_eq!(tokens, vec!["fix", "jwt", "auth", "bug"]);
//!
//! let analysis = analyze("Debugging the OAuth login_handler in auth-service");
//! assert!(analysis.tech_terms.iter().any(|t| t == "oauth"));
//! ```

mod stopwords;
mod terms;
mod tokenize;

pub use crate::stopwords::is_stop_word;
pub use crate::terms::extract_technical_terms;
pub use crate::tokenize::tokenize_words;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default cap on extracted keywords.
pub const DEFAULT_MAX_KEYWORDS: usize = 10;

/// Minimum keyword length after stop-word removal.
pub const MIN_KEYWORD_LENGTH: usize = 3;

/// Result of analyzing a context blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextAnalysis {
    /// Frequency-ranked keywords, most frequent first.
    pub keywords: Vec<String>,
    /// Technical terms in order of first appearance, deduplicated.
    pub tech_terms: Vec<String>,
    /// Synthesized query: top technical terms plus top keywords.
    pub search_query: String,
}

/// Extract frequency-ranked keywords from `text`.
///
/// Words are lowercased alphabetic runs of at least [`MIN_KEYWORD_LENGTH`]
/// characters, with stop words removed. Ties in frequency keep first-seen
/// order so the output is deterministic.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let lower = text.to_lowercase();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    for word in tokenize::alphabetic_words(&lower) {
        if word.len() < MIN_KEYWORD_LENGTH || is_stop_word(word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            first_seen.push(word);
        }
        *count += 1;
    }

    // Stable rank: frequency descending, then first appearance.
    let mut ranked: Vec<(usize, &str)> = first_seen
        .iter()
        .enumerate()
        .map(|(order, word)| (order, *word))
        .collect();
    ranked.sort_by(|(order_a, word_a), (order_b, word_b)| {
        counts[word_b]
            .cmp(&counts[word_a])
            .then_with(|| order_a.cmp(order_b))
    });

    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(_, word)| word.to_string())
        .collect()
}

/// Analyze a context blob into keywords, technical terms, and a search query.
///
/// The query concatenates the top 3 technical terms and the top 2 keywords,
/// deduplicated with order preserved.
pub fn analyze(context_text: &str) -> ContextAnalysis {
    let keywords = extract_keywords(context_text, DEFAULT_MAX_KEYWORDS);
    let tech_terms = extract_technical_terms(context_text);

    let mut query_terms: Vec<&str> = Vec::with_capacity(5);
    for term in tech_terms.iter().take(3).chain(keywords.iter().take(2)) {
        if !query_terms.contains(&term.as_str()) {
            query_terms.push(term);
        }
    }

    ContextAnalysis {
        search_query: query_terms.join(" "),
        keywords,
        tech_terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_frequency_ranked() {
        let text = "auth auth auth token token login";
        let keywords = extract_keywords(text, 10);
        assert_eq!(keywords, vec!["auth", "token", "login"]);
    }

    #[test]
    fn keywords_drop_stop_words_and_short_words() {
        let keywords = extract_keywords("the quick db is on fire", 10);
        assert!(!keywords.contains(&"the".to_string()));
        assert!(!keywords.contains(&"is".to_string()));
        assert!(!keywords.contains(&"db".to_string()));
        assert!(keywords.contains(&"quick".to_string()));
        assert!(keywords.contains(&"fire".to_string()));
    }

    #[test]
    fn keywords_respect_limit() {
        let text = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima";
        let keywords = extract_keywords(text, 4);
        assert_eq!(keywords.len(), 4);
    }

    #[test]
    fn keyword_ties_keep_first_seen_order() {
        let keywords = extract_keywords("zebra apple zebra apple mango", 10);
        assert_eq!(keywords[0], "zebra");
        assert_eq!(keywords[1], "apple");
        assert_eq!(keywords[2], "mango");
    }

    #[test]
    fn analyze_builds_query_from_tech_terms_then_keywords() {
        let analysis = analyze("Fixing the OAuth token refresh in session_manager during login login login");
        assert!(!analysis.search_query.is_empty());
        let first = analysis.search_query.split(' ').next().unwrap();
        assert!(analysis.tech_terms.iter().any(|t| t == first));
    }

    #[test]
    fn analyze_query_has_no_duplicates() {
        let analysis = analyze("oauth oauth oauth oauth");
        let parts: Vec<&str> = analysis.search_query.split(' ').collect();
        let mut deduped = parts.clone();
        deduped.dedup();
        assert_eq!(parts, deduped);
    }

    #[test]
    fn analyze_empty_input() {
        let analysis = analyze("");
        assert!(analysis.keywords.is_empty());
        assert!(analysis.tech_terms.is_empty());
        assert!(analysis.search_query.is_empty());
    }

    #[test]
    fn analyze_is_deterministic() {
        let text = "Refactor HTTP client retry logic with exponential backoff in api_client";
        assert_eq!(analyze(text), analyze(text));
    }
}
