//! Request, response, and configuration types for the search engine.

use chrono::{DateTime, Utc};
use corpus::{CorpusError, SessionRecord};
use rank::Bm25Params;
use semantic::SemanticError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on result counts, whatever the caller asked for.
pub const LIMIT_HARD_CAP: usize = 100;

/// Default result count.
pub const DEFAULT_LIMIT: usize = 5;

/// Selectable scoring modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Hybrid when the dense side is usable, BM25 otherwise.
    #[default]
    Auto,
    /// Fused lexical + dense scoring; degrades to BM25 when dense is out.
    Hybrid,
    /// Lexical scoring blended with temporal decay.
    Bm25,
    /// Dense-only scoring; an error when the model is unavailable.
    Semantic,
    /// Legacy weighted-field substring match.
    Simple,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Auto => "auto",
            SearchMode::Hybrid => "hybrid",
            SearchMode::Bm25 => "bm25",
            SearchMode::Semantic => "semantic",
            SearchMode::Simple => "simple",
        }
    }

    /// Parse a mode name. Unknown names are a bad-input error so they can
    /// be reported in telemetry rather than silently defaulted.
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name {
            "auto" => Ok(SearchMode::Auto),
            "hybrid" => Ok(SearchMode::Hybrid),
            "bm25" => Ok(SearchMode::Bm25),
            "semantic" => Ok(SearchMode::Semantic),
            "simple" => Ok(SearchMode::Simple),
            other => Err(EngineError::BadInput(format!("unknown search mode '{other}'"))),
        }
    }
}

/// Request-side filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    /// Reserved scope selector; `None` and `"all"` mean no scoping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Keep sessions whose id contains this substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_substring: Option<String>,
    /// Keep sessions sharing at least one of these topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.scope.is_none() && self.session_substring.is_none() && self.topics.is_none()
    }
}

/// Options for one search call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOptions {
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Results whose final score falls below this are dropped after
    /// sorting.
    #[serde(default)]
    pub min_relevance: f64,
    #[serde(default)]
    pub filters: SearchFilters,
    /// Tests only: propagate pipeline errors to the caller instead of
    /// swallowing them into an empty result.
    #[serde(default, skip_serializing)]
    pub strict: bool,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Auto,
            limit: DEFAULT_LIMIT,
            min_relevance: 0.0,
            filters: SearchFilters::default(),
            strict: false,
        }
    }
}

impl SearchOptions {
    /// Result-count ceiling after clamping bad input.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, LIMIT_HARD_CAP)
    }
}

/// One ranked hit with its per-signal score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub topics: Vec<String>,
    pub files_modified: Vec<String>,
    pub issue_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    /// Final fused score in [0, 1].
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_score: Option<f64>,
    /// Mode that actually produced this result.
    pub search_mode: String,
}

impl RankedResult {
    pub(crate) fn from_record(record: &SessionRecord, search_mode: &str) -> Self {
        Self {
            id: record.id.clone(),
            captured_at: record.captured_at,
            summary: record.summary.clone(),
            topics: record.topics.clone(),
            files_modified: record.files_modified.clone(),
            issue_refs: record.issue_refs.clone(),
            file: record.file.clone(),
            relevance_score: 0.0,
            bm25_score: None,
            semantic_score: None,
            temporal_score: None,
            search_mode: search_mode.to_string(),
        }
    }
}

/// Fusion weight pairs, resolved by the configuration layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HybridWeights {
    pub bm25_weight: f64,
    pub dense_weight: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            bm25_weight: 0.5,
            dense_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bm25TemporalWeights {
    pub bm25_weight: f64,
    pub temporal_weight: f64,
}

impl Default for Bm25TemporalWeights {
    fn default() -> Self {
        Self {
            bm25_weight: 0.7,
            temporal_weight: 0.3,
        }
    }
}

/// Engine configuration threaded in at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub default_mode: SearchMode,
    pub default_limit: usize,
    pub temporal_half_life_days: f64,
    pub bm25: Bm25Params,
    pub hybrid: HybridWeights,
    pub bm25_temporal: Bm25TemporalWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::Auto,
            default_limit: DEFAULT_LIMIT,
            temporal_half_life_days: rank::DEFAULT_HALF_LIFE_DAYS,
            bm25: Bm25Params::default(),
            hybrid: HybridWeights::default(),
            bm25_temporal: Bm25TemporalWeights::default(),
        }
    }
}

/// Errors inside the retrieval pipeline. By default these are swallowed
/// into an empty result list and surface only through telemetry; strict
/// mode propagates them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("semantic search unavailable")]
    SemanticUnavailable,
    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),
    #[error("bad input: {0}")]
    BadInput(String),
}

impl EngineError {
    /// Stable machine-readable tag recorded in `outcome.error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            EngineError::Corpus(CorpusError::Malformed(_)) => "index_malformed",
            EngineError::Corpus(CorpusError::Sidecar(_)) => "dense_sidecar",
            EngineError::Corpus(CorpusError::Io(_)) => "index_io",
            EngineError::SemanticUnavailable | EngineError::Semantic(_) => "semantic_unavailable",
            EngineError::BadInput(_) => "bad_input",
        }
    }
}
