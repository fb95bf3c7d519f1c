//! Scoring primitives for session recall: Okapi BM25 over stored corpus
//! statistics, cosine similarity over the dense sidecar, and exponential
//! temporal decay.
//!
//! Everything here is pure computation over snapshots — no I/O, no caches,
//! no warnings. Policy (which signals to combine, what to do when the
//! dense side refuses) lives with the engine that calls in.

mod bm25;
mod dense;
mod temporal;

pub use crate::bm25::{normalize_scores, Bm25Params, Bm25Scorer, LexicalStats};
pub use crate::dense::{cosine_scores, DenseScoreError};
pub use crate::temporal::{
    temporal_score, DEFAULT_HALF_LIFE_DAYS, NEUTRAL_TEMPORAL_SCORE,
};
