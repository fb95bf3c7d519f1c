//! Word tokenization shared by indexing and querying.

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static word regex"));
static ALPHA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+").expect("static alpha regex"));

/// Split `text` into lowercased word tokens.
///
/// A word is a maximal `\w+` run, so `login_handler` stays one token while
/// `auth-service` splits in two. Both the stored token streams and query
/// tokens go through this function, which is what keeps BM25 term matching
/// honest.
pub fn tokenize_words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Iterate purely alphabetic runs of an already-lowercased string.
///
/// Used by keyword extraction, which ignores digits and underscores.
pub(crate) fn alphabetic_words(lower: &str) -> impl Iterator<Item = &str> {
    ALPHA_RE.find_iter(lower).map(|m| m.as_str())
}
