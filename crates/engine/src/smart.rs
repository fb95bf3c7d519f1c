//! Context-driven recall: analyze a working-context blob, synthesize a
//! query, and search with a relevance floor.

use serde_json::json;
use std::time::Instant;

use analyze::analyze;
use telemetry::{EventType, Outcome};

use crate::search::SearchEngine;
use crate::types::{EngineError, RankedResult, SearchMode, SearchOptions};

/// Options for [`SearchEngine::smart_recall`].
#[derive(Debug, Clone, PartialEq)]
pub struct SmartRecallOptions {
    pub mode: SearchMode,
    /// Final result count; the underlying search fetches twice as many
    /// and the relevance floor trims from there.
    pub limit: usize,
    /// Results below this final score are discarded.
    pub min_relevance: f64,
}

impl Default for SmartRecallOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Auto,
            limit: 3,
            min_relevance: 0.3,
        }
    }
}

impl SearchEngine {
    /// Analyze `context_text` and retrieve the sessions it points at.
    ///
    /// Emits a `context_analyzed` event for the analysis and wraps the
    /// run in a `smart_recall_completed` lifecycle event. An empty
    /// context yields no results and no search.
    pub fn smart_recall(
        &self,
        context_text: &str,
        options: &SmartRecallOptions,
    ) -> Result<Vec<RankedResult>, EngineError> {
        let started = Instant::now();
        let (session_id, session_source) = telemetry::current_session_id();

        if context_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let analysis = analyze(context_text);
        let analysis_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.collector().log_event(json!({
            "event_type": EventType::ContextAnalyzed.as_str(),
            "trigger_source": "smart_recall",
            "session_id": session_id,
            "session_id_source": session_source.as_str(),
            "context": {
                "context_length": context_text.len(),
                "keywords": analysis.keywords.iter().take(5).collect::<Vec<_>>(),
                "technical_terms": analysis.tech_terms.iter().take(5).collect::<Vec<_>>(),
                "search_query": analysis.search_query,
            },
            "performance": { "analysis_time_ms": analysis_ms },
        }));

        let event_id = self.collector().start_event(
            EventType::SmartRecallCompleted,
            json!({
                "trigger_source": "smart_recall",
                "session_id": session_id,
                "session_id_source": session_source.as_str(),
                "query": {
                    "raw_query": analysis.search_query,
                    "extracted_keywords": analysis.keywords.iter().take(5).collect::<Vec<_>>(),
                    "technical_terms": analysis.tech_terms.iter().take(5).collect::<Vec<_>>(),
                },
                "search_config": {
                    "mode": options.mode.as_str(),
                    "limit": options.limit,
                    "min_relevance": options.min_relevance,
                },
            }),
        );

        // Over-fetch, then apply the relevance floor.
        let search_started = Instant::now();
        let search_options = SearchOptions {
            mode: options.mode,
            limit: options.limit.saturating_mul(2).max(1),
            min_relevance: 0.0,
            ..SearchOptions::default()
        };
        let broad = match self.search(&analysis.search_query, &search_options) {
            Ok(results) => results,
            Err(err) => {
                self.collector().end_event(
                    event_id.as_deref(),
                    Outcome::failure(err.to_string(), err.error_type()),
                );
                return Err(err);
            }
        };
        let search_ms = search_started.elapsed().as_secs_f64() * 1000.0;

        let filtered: Vec<RankedResult> = broad
            .iter()
            .filter(|r| r.relevance_score >= options.min_relevance)
            .cloned()
            .collect();
        let results: Vec<RankedResult> = filtered.iter().take(options.limit).cloned().collect();

        self.collector().update_event(
            event_id.as_deref(),
            json!({
                "results": {
                    "count": results.len(),
                    "retrieved_sessions": results.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
                    "filtered_from": broad.len(),
                    "filtered_out": filtered.len().saturating_sub(results.len()),
                },
                "performance": {
                    "total_latency_ms": started.elapsed().as_secs_f64() * 1000.0,
                    "breakdown": {
                        "analysis_ms": analysis_ms,
                        "search_ms": search_ms,
                    },
                },
            }),
        );
        self.collector().end_event(event_id.as_deref(), Outcome::success());

        Ok(results)
    }
}
