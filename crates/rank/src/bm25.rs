//! Okapi BM25 scoring over stored corpus statistics.

use corpus::{Bm25Stats, SessionRecord};
use serde::{Deserialize, Serialize};

/// Okapi parameters. The defaults are the standard literature values and
/// what the statistics were tuned against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Aggregate index numbers, surfaced for observability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LexicalStats {
    pub avgdl: f64,
    pub total_docs: usize,
    pub vocab_size: usize,
}

/// Scores token queries against corpus subsets using precomputed global
/// statistics (avgdl, idf) and per-document token streams.
pub struct Bm25Scorer<'a> {
    stats: &'a Bm25Stats,
    params: Bm25Params,
}

impl<'a> Bm25Scorer<'a> {
    pub fn new(stats: &'a Bm25Stats, params: Bm25Params) -> Self {
        Self { stats, params }
    }

    /// Raw BM25 scores for `query_tokens` against `subset`, aligned with
    /// subset order.
    ///
    /// Empty queries, an all-empty corpus, and unknown terms all
    /// contribute zeros rather than errors; the caller falls back to
    /// temporal ordering when nothing matched.
    pub fn score(&self, query_tokens: &[String], subset: &[&SessionRecord]) -> Vec<f64> {
        let mut scores = vec![0.0; subset.len()];
        if query_tokens.is_empty() || self.stats.avgdl <= 0.0 {
            return scores;
        }

        for (slot, record) in subset.iter().enumerate() {
            let dl = record.token_stream.len() as f64;
            if dl == 0.0 {
                continue;
            }
            let len_norm = 1.0 - self.params.b + self.params.b * dl / self.stats.avgdl;

            let mut score = 0.0;
            for term in query_tokens {
                let Some(&idf) = self.stats.idf.get(term) else {
                    continue;
                };
                let tf = record.token_stream.iter().filter(|t| *t == term).count() as f64;
                if tf == 0.0 {
                    continue;
                }
                score += idf * tf * (self.params.k1 + 1.0) / (tf + self.params.k1 * len_norm);
            }
            scores[slot] = score;
        }

        scores
    }

    /// Aggregate numbers for telemetry and status surfaces.
    pub fn stats(&self) -> LexicalStats {
        LexicalStats {
            avgdl: self.stats.avgdl,
            total_docs: self.stats.doc_len.len(),
            vocab_size: self.stats.vocab_size(),
        }
    }
}

/// Min-max normalize scores to [0,1] in place: the maximum maps to 1.0,
/// and a zero maximum leaves every score at zero.
pub fn normalize_scores(scores: &mut [f64]) {
    let max = scores.iter().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for s in scores.iter_mut() {
            *s /= max;
        }
    }
}
