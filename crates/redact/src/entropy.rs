//! Shannon-entropy fallback detection.
//!
//! Catches secrets the pattern catalog has never heard of: long random
//! strings have measurably higher entropy than prose or identifiers.

use std::collections::HashMap;

/// Shannon entropy of `text` in bits per character.
///
/// Rough reference points: English prose sits around 3.5–4.0, random
/// alphanumeric material around 5.5–6.0, typical API tokens 4.5–5.5.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut length = 0usize;
    for ch in text.chars() {
        *freq.entry(ch).or_insert(0) += 1;
        length += 1;
    }

    let length = length as f64;
    freq.values()
        .map(|&count| {
            let p = count as f64 / length;
            -p * p.log2()
        })
        .sum()
}

/// True when `ch` can be part of a token candidate: alphanumeric plus the
/// characters common in keys and tokens.
pub(crate) fn is_candidate_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '/' | '+' | '=' | '-')
}

/// Byte spans of candidate tokens (length ≥ `min_length` bytes) in `text`.
pub(crate) fn candidate_spans(text: &str, min_length: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if is_candidate_char(ch) {
            if start.is_none() {
                start = Some(idx);
            }
        } else if let Some(s) = start.take() {
            if idx - s >= min_length {
                spans.push((s, idx));
            }
        }
    }
    if let Some(s) = start {
        if text.len() - s >= min_length {
            spans.push((s, text.len()));
        }
    }

    spans
}
