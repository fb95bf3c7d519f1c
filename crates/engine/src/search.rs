//! The retrieval pipeline.
//!
//! One call, one telemetry event, sequential stages: resolve the mode,
//! snapshot the corpus, filter, score, fuse, sort, truncate. Degradation
//! is a first-class path — anything that makes the dense side unusable
//! at score time drops the request to the BM25 formula, marks the event
//! degraded, and warns once per reason per process.

use chrono::Utc;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

use analyze::tokenize_words;
use corpus::{CorpusIndex, CorpusStore, SessionRecord};
use rank::{cosine_scores, normalize_scores, temporal_score, Bm25Scorer};
use semantic::Embedder;
use telemetry::{EventType, Outcome, TelemetryCollector};

use crate::simple::simple_relevance_score;
use crate::types::{
    EngineConfig, EngineError, RankedResult, SearchMode, SearchOptions,
};

/// Hybrid search engine. Owns its corpus handle, its (optional) embedder,
/// and its telemetry collector; one instance serves a process.
pub struct SearchEngine {
    store: CorpusStore,
    embedder: Option<Embedder>,
    collector: TelemetryCollector,
    config: EngineConfig,
    /// One warning per degradation reason per process.
    degraded_warned: Mutex<HashSet<&'static str>>,
}

/// Outcome of the dense scoring attempt inside a hybrid/semantic request.
enum DenseOutcome {
    /// Scores aligned with the filtered subset, plus encode latency.
    Scores(Vec<f64>, f64),
    /// The dense side is unusable for this request; the tag names why.
    Unusable(&'static str),
}

impl SearchEngine {
    pub fn new(
        store: CorpusStore,
        embedder: Option<Embedder>,
        collector: TelemetryCollector,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            collector,
            config,
            degraded_warned: Mutex::new(HashSet::new()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a dense query could plausibly run right now.
    pub fn embeddings_available(&self) -> bool {
        self.embedder.as_ref().is_some_and(|e| e.is_available())
    }

    /// Search the corpus.
    ///
    /// Never propagates pipeline failures unless `options.strict` is set:
    /// the default contract is an empty list plus a telemetry event with
    /// `outcome.success=false` and a populated `error_type`, because
    /// retrieval must not break the workflow that asked for it.
    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>, EngineError> {
        let started = Instant::now();
        let (session_id, session_source) = telemetry::current_session_id();

        let event_id = self.collector.start_event(
            EventType::RecallTriggered,
            json!({
                "trigger_source": "search",
                "session_id": session_id,
                "session_id_source": session_source.as_str(),
                "query": {
                    "raw_query": query,
                    "query_length": query.len(),
                },
                "search_config": {
                    "mode": options.mode.as_str(),
                    "limit": options.effective_limit(),
                    "min_relevance": options.min_relevance,
                    "filters": {
                        "scope": options.filters.scope,
                        "session_substring": options.filters.session_substring,
                        "topics": options.filters.topics,
                    },
                },
            }),
        );

        match self.search_inner(query, options, started, event_id.as_deref()) {
            Ok(results) => Ok(results),
            Err(err) => {
                self.collector.update_event(
                    event_id.as_deref(),
                    json!({
                        "error": err.to_string(),
                        "error_type": err.error_type(),
                    }),
                );
                self.collector.end_event(
                    event_id.as_deref(),
                    Outcome::failure(err.to_string(), err.error_type()),
                );
                if options.strict {
                    Err(err)
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    fn search_inner(
        &self,
        query: &str,
        options: &SearchOptions,
        started: Instant,
        event_id: Option<&str>,
    ) -> Result<Vec<RankedResult>, EngineError> {
        // Corpus snapshot.
        let load_started = Instant::now();
        let snapshot = self.store.load_snapshot()?;
        let index_load_ms = load_started.elapsed().as_secs_f64() * 1000.0;

        // Filters.
        let filter_started = Instant::now();
        let subset = apply_filters(&snapshot, options);
        let filter_ms = filter_started.elapsed().as_secs_f64() * 1000.0;

        // Scoring.
        let search_started = Instant::now();
        let scored = self.score_subset(query, options, &snapshot, &subset, event_id)?;
        let search_ms = search_started.elapsed().as_secs_f64() * 1000.0;
        let ScoredSubset {
            mut results,
            mode_resolved,
            degraded,
            dense_encode_ms,
        } = scored;

        // Order: score descending, recency descending, id ascending.
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.captured_at.cmp(&a.captured_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.retain(|r| r.relevance_score >= options.min_relevance);
        results.truncate(options.effective_limit());

        debug!(
            mode = mode_resolved.as_str(),
            hits = results.len(),
            "search completed"
        );

        // Result + performance annotations, then close the event.
        let scores: Vec<f64> = results.iter().map(|r| r.relevance_score).collect();
        let (top, avg, min) = if scores.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                scores.iter().cloned().fold(f64::MIN, f64::max),
                scores.iter().sum::<f64>() / scores.len() as f64,
                scores.iter().cloned().fold(f64::MAX, f64::min),
            )
        };

        let mut breakdown = json!({
            "index_load_ms": index_load_ms,
            "filter_ms": filter_ms,
            "search_ms": search_ms,
        });
        if let Some(encode_ms) = dense_encode_ms {
            breakdown["dense_encode_ms"] = json!(encode_ms);
        }

        let mut performance = json!({
            "total_latency_ms": started.elapsed().as_secs_f64() * 1000.0,
            "breakdown": breakdown,
        });
        if degraded {
            performance["degraded"] = json!(true);
        }

        self.collector.update_event(
            event_id,
            json!({
                "search_config": { "mode_resolved": mode_resolved.as_str() },
                "results": {
                    "count": results.len(),
                    "retrieved_sessions": results.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
                    "scores": {
                        "top_score": top,
                        "avg_score": avg,
                        "min_score": min,
                        "score_distribution": {
                            "high_0.7+": scores.iter().filter(|s| **s >= 0.7).count(),
                            "medium_0.4-0.7": scores.iter().filter(|s| **s >= 0.4 && **s < 0.7).count(),
                            "low_<0.4": scores.iter().filter(|s| **s < 0.4).count(),
                        },
                    },
                },
                "performance": performance,
                "system_state": {
                    "index_size": snapshot.sessions.len(),
                    "embeddings_available": snapshot.dense.is_some() && self.embeddings_available(),
                },
            }),
        );
        self.collector.end_event(event_id, Outcome::success());

        Ok(results)
    }

    fn score_subset(
        &self,
        query: &str,
        options: &SearchOptions,
        snapshot: &CorpusIndex,
        subset: &[&SessionRecord],
        _event_id: Option<&str>,
    ) -> Result<ScoredSubset, EngineError> {
        let query_tokens = tokenize_words(query);
        let dense_candidate = self.embeddings_available() && snapshot.dense.is_some();

        let resolved = match options.mode {
            SearchMode::Simple => SearchMode::Simple,
            SearchMode::Bm25 => SearchMode::Bm25,
            SearchMode::Semantic => {
                if !dense_candidate {
                    return Err(EngineError::SemanticUnavailable);
                }
                SearchMode::Semantic
            }
            SearchMode::Auto | SearchMode::Hybrid => {
                if dense_candidate {
                    SearchMode::Hybrid
                } else {
                    SearchMode::Bm25
                }
            }
        };

        match resolved {
            SearchMode::Simple => Ok(ScoredSubset {
                results: self.score_simple(&query_tokens, subset),
                mode_resolved: SearchMode::Simple,
                degraded: false,
                dense_encode_ms: None,
            }),
            SearchMode::Bm25 => Ok(ScoredSubset {
                results: self.score_bm25(&query_tokens, snapshot, subset),
                mode_resolved: SearchMode::Bm25,
                degraded: false,
                dense_encode_ms: None,
            }),
            SearchMode::Semantic => match self.dense_scores(query, snapshot, subset) {
                DenseOutcome::Scores(scores, encode_ms) => {
                    let results = subset
                        .iter()
                        .zip(scores)
                        .map(|(record, score)| {
                            let mut r = RankedResult::from_record(record, "semantic");
                            r.relevance_score = score;
                            r.semantic_score = Some(score);
                            r
                        })
                        .collect();
                    Ok(ScoredSubset {
                        results,
                        mode_resolved: SearchMode::Semantic,
                        degraded: false,
                        dense_encode_ms: Some(encode_ms),
                    })
                }
                DenseOutcome::Unusable(_) => Err(EngineError::SemanticUnavailable),
            },
            SearchMode::Hybrid => match self.dense_scores(query, snapshot, subset) {
                DenseOutcome::Scores(dense, encode_ms) => Ok(ScoredSubset {
                    results: self.score_hybrid(&query_tokens, snapshot, subset, &dense),
                    mode_resolved: SearchMode::Hybrid,
                    degraded: false,
                    dense_encode_ms: Some(encode_ms),
                }),
                DenseOutcome::Unusable(_reason) => Ok(ScoredSubset {
                    results: self.score_bm25(&query_tokens, snapshot, subset),
                    mode_resolved: SearchMode::Bm25,
                    degraded: true,
                    dense_encode_ms: None,
                }),
            },
            SearchMode::Auto => unreachable!("auto always resolves"),
        }
    }

    /// BM25 mode: `wb·bm25_n + wt·temporal`; pure temporal ranking when
    /// the query carries no tokens or the corpus has none.
    fn score_bm25(
        &self,
        query_tokens: &[String],
        snapshot: &CorpusIndex,
        subset: &[&SessionRecord],
    ) -> Vec<RankedResult> {
        let now = Utc::now();
        let bm25_n = self.normalized_bm25(query_tokens, snapshot, subset);
        let temporal_only =
            query_tokens.is_empty() || snapshot.bm25.as_ref().map_or(true, |s| s.avgdl <= 0.0);
        let weights = self.config.bm25_temporal;

        subset
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let temporal =
                    temporal_score(record.captured_at, now, self.config.temporal_half_life_days);
                let mut r = RankedResult::from_record(record, "bm25");
                r.bm25_score = Some(bm25_n[i]);
                r.temporal_score = Some(temporal);
                r.relevance_score = if temporal_only {
                    temporal
                } else {
                    weights.bm25_weight * bm25_n[i] + weights.temporal_weight * temporal
                };
                r
            })
            .collect()
    }

    /// Hybrid mode: the lexical/dense mix, blended with temporal decay by
    /// the same weights BM25 mode uses.
    fn score_hybrid(
        &self,
        query_tokens: &[String],
        snapshot: &CorpusIndex,
        subset: &[&SessionRecord],
        dense: &[f64],
    ) -> Vec<RankedResult> {
        let now = Utc::now();
        let bm25_n = self.normalized_bm25(query_tokens, snapshot, subset);
        let hybrid = self.config.hybrid;
        let blend = self.config.bm25_temporal;

        subset
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let temporal =
                    temporal_score(record.captured_at, now, self.config.temporal_half_life_days);
                let mix = hybrid.bm25_weight * bm25_n[i] + hybrid.dense_weight * dense[i];
                let mut r = RankedResult::from_record(record, "hybrid");
                r.bm25_score = Some(bm25_n[i]);
                r.semantic_score = Some(dense[i]);
                r.temporal_score = Some(temporal);
                r.relevance_score = blend.bm25_weight * mix + blend.temporal_weight * temporal;
                r
            })
            .collect()
    }

    fn score_simple(
        &self,
        query_tokens: &[String],
        subset: &[&SessionRecord],
    ) -> Vec<RankedResult> {
        subset
            .iter()
            .map(|record| {
                let mut r = RankedResult::from_record(record, "simple");
                r.relevance_score = simple_relevance_score(query_tokens, record);
                r
            })
            .collect()
    }

    fn normalized_bm25(
        &self,
        query_tokens: &[String],
        snapshot: &CorpusIndex,
        subset: &[&SessionRecord],
    ) -> Vec<f64> {
        let Some(stats) = &snapshot.bm25 else {
            return vec![0.0; subset.len()];
        };
        let scorer = Bm25Scorer::new(stats, self.config.bm25);
        let mut scores = scorer.score(query_tokens, subset);
        normalize_scores(&mut scores);
        scores
    }

    /// Try to produce dense scores for the filtered subset. Any failure
    /// (misaligned slots, unreadable sidecar, encode error) makes the
    /// dense side unusable for this request.
    fn dense_scores(
        &self,
        query: &str,
        snapshot: &CorpusIndex,
        subset: &[&SessionRecord],
    ) -> DenseOutcome {
        let Some(embedder) = &self.embedder else {
            return DenseOutcome::Unusable("embedder_absent");
        };

        if !snapshot.dense_alignment_ok() {
            self.warn_once(
                "dense_row_mismatch",
                "dense matrix does not cover the corpus, skipping semantic scoring",
            );
            return DenseOutcome::Unusable("dense_row_mismatch");
        }

        let matrix = match self.store.load_matrix(snapshot) {
            Ok(matrix) => matrix,
            Err(err) => {
                self.warn_once("dense_sidecar_unreadable", "dense sidecar rejected");
                debug!(%err, "sidecar load failed");
                return DenseOutcome::Unusable("dense_sidecar_unreadable");
            }
        };

        let encode_started = Instant::now();
        let query_vector = match embedder.encode(query) {
            Ok(v) => v,
            Err(err) => {
                self.warn_once("query_encode_failed", "query encoding failed");
                debug!(%err, "encode failed");
                return DenseOutcome::Unusable("query_encode_failed");
            }
        };
        let encode_ms = encode_started.elapsed().as_secs_f64() * 1000.0;

        let slots: Vec<usize> = subset
            .iter()
            .filter_map(|record| record.embedding_slot)
            .collect();
        if slots.len() != subset.len() {
            // Cannot happen after the alignment check; belt for the race
            // where the snapshot changed between checks.
            self.warn_once("dense_row_mismatch", "embedding slots missing on subset");
            return DenseOutcome::Unusable("dense_row_mismatch");
        }

        match cosine_scores(&matrix, &query_vector, &slots, snapshot.sessions.len()) {
            Ok(scores) => DenseOutcome::Scores(scores, encode_ms),
            Err(err) => {
                self.warn_once("dense_score_failed", "dense scoring refused");
                debug!(%err, "dense scoring failed");
                DenseOutcome::Unusable("dense_score_failed")
            }
        }
    }

    fn warn_once(&self, reason: &'static str, message: &str) {
        let mut warned = self.degraded_warned.lock().expect("degraded warn lock");
        if warned.insert(reason) {
            warn!(reason, "{message}");
        }
    }
}

struct ScoredSubset {
    results: Vec<RankedResult>,
    mode_resolved: SearchMode,
    degraded: bool,
    dense_encode_ms: Option<f64>,
}

fn apply_filters<'a>(snapshot: &'a CorpusIndex, options: &SearchOptions) -> Vec<&'a SessionRecord> {
    let filters = &options.filters;
    snapshot
        .sessions
        .iter()
        .filter(|record| {
            if let Some(needle) = &filters.session_substring {
                if !record.id.contains(needle.as_str()) {
                    return false;
                }
            }
            if let Some(topics) = &filters.topics {
                let record_topics: Vec<String> =
                    record.topics.iter().map(|t| t.to_lowercase()).collect();
                if !topics
                    .iter()
                    .any(|t| record_topics.contains(&t.to_lowercase()))
                {
                    return false;
                }
            }
            // `scope` is accepted and recorded but not yet a discriminator.
            true
        })
        .collect()
}
