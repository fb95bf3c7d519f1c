//! Fixed stop-word table for keyword extraction.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Common English words (plus contraction fragments left behind by
/// punctuation stripping) that carry no recall signal.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
        "those", "i", "you", "he", "she", "it", "we", "they", "what", "which", "who", "when",
        "where", "why", "how", "all", "each", "every", "both", "few", "more", "most", "some",
        "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "just",
        "now", "get", "make", "go", "see", "know", "take", "use", "find", "give", "tell", "work",
        "call", "try", "ask", "need", "feel", "become", "leave", "put", "mean", "keep", "let",
        "begin", "seem", "help", "talk", "turn", "start", "show", "move", "like", "live",
        "believe", "happen", "write", "sit", "stand", "lose", "pay", "meet", "run", "im", "ive",
        "id", "ill", "youre", "youve", "youd", "youll", "hes", "shes", "its", "theyre", "theyve",
        "theyd", "dont", "doesnt", "didnt", "wont", "wouldnt", "couldnt", "shouldnt", "cant",
        "cannot", "isnt", "arent", "wasnt", "werent", "hasnt", "havent",
    ]
    .into_iter()
    .collect()
});

/// True when `word` (already lowercased) is a stop word.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}
