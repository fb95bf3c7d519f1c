//! Conversational session recall.
//!
//! This crate ties the retrieval stack together so applications can drive
//! it through a single dependency: a durable session corpus with Okapi
//! BM25 statistics and a dense embedding sidecar, a hybrid search engine
//! with graceful degradation, context-driven smart recall, append-only
//! retrieval telemetry with secret redaction, and a layered configuration
//! resolver.
//!
//! ## Quick start
//!
//! ```no_run
//! use recall::{Recall, RecallConfig, SessionRecord};
//!
//! # fn demo() -> Result<(), recall::EngineError> {
//! let config = RecallConfig::load(Some(".claude/config/recall.json".as_ref()))
//!     .expect("config resolves");
//! let recall = Recall::open(config, ".claude/context/sessions/index.json");
//!
//! // Index a captured session.
//! let mut record = SessionRecord::new("2026-02-15_103000", None);
//! record.summary = "Fixed the JWT refresh race in the auth service".into();
//! record.topics = vec!["auth".into(), "jwt".into()];
//! recall.ingest(record)?;
//!
//! // Ask for it back.
//! let hits = recall.search("jwt refresh race");
//! for hit in hits {
//!     println!("{} {:.2}", hit.id, hit.relevance_score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The search path never breaks the surrounding workflow: pipeline
//! failures come back as an empty list, observable through the telemetry
//! stream (`outcome.success=false` with a machine-readable `error_type`).
//!
//! ## Layout
//!
//! | Crate | Concern |
//! |-------|---------|
//! | `recall-analyze` | tokenization, keyword and tech-term extraction |
//! | `recall-redact` | secret detection and redaction |
//! | `recall-corpus` | durable corpus store + dense sidecar |
//! | `recall-rank` | BM25, cosine, temporal scoring |
//! | `recall-semantic` | embedding gateway (ONNX behind the `onnx` feature) |
//! | `recall-telemetry` | event collector, JSONL logs, correlation |
//! | `recall-engine` | mode resolution, fusion, the search pipeline |

pub mod config;

pub use crate::config::{ConfigError, RecallConfig};

pub use analyze::{analyze, ContextAnalysis};
pub use corpus::{
    Bm25Stats, CorpusError, CorpusIndex, CorpusStore, DenseMatrix, ListFilter, SessionRecord,
};
pub use engine::{
    EngineConfig, EngineError, RankedResult, SearchEngine, SearchFilters, SearchMode,
    SearchOptions, SmartRecallOptions,
};
pub use rank::{Bm25Params, LexicalStats};
pub use redact::{Finding, RedactionReport, SecretRedactor};
pub use semantic::{Embedder, EmbedderConfig};
pub use telemetry::{
    EventChain, EventCorrelator, EventType, Outcome, TelemetryCollector, TelemetryConfig,
    TelemetryEvent,
};

use std::path::{Path, PathBuf};

/// Derivative log filenames expected next to the telemetry log.
const IMPACT_LOG_NAME: &str = "context_impact.jsonl";
const QUALITY_LOG_NAME: &str = "quality_scores.jsonl";

/// Owning facade over the whole retrieval stack.
///
/// Construction wires the ownership chain explicitly: the facade owns the
/// engine, the engine owns its corpus handle, embedder, and collector,
/// and the collector owns its writer. Nothing reaches back into global
/// state after `open` returns.
pub struct Recall {
    engine: SearchEngine,
    config: RecallConfig,
}

impl Recall {
    /// Build the stack from resolved configuration and an index path.
    ///
    /// Capability detection happens here, once: a redactor that cannot be
    /// built leaves telemetry unredacted (with a warning), and the
    /// embedder is always constructed but reports availability honestly,
    /// so retrieval paths branch on presence rather than on errors.
    pub fn open<P: Into<PathBuf>>(config: RecallConfig, index_path: P) -> Self {
        let store = CorpusStore::new(index_path);
        let redactor = config.build_redactor();
        let collector = TelemetryCollector::new(&config.telemetry_config(), redactor);
        let embedder = Embedder::new(config.embedder_config());
        let engine = SearchEngine::new(store, Some(embedder), collector, config.engine_config());
        Self { engine, config }
    }

    /// Search with the configured default mode and limit.
    pub fn search(&self, query: &str) -> Vec<RankedResult> {
        let engine_config = self.engine.config();
        let options = SearchOptions {
            mode: engine_config.default_mode,
            limit: engine_config.default_limit,
            ..SearchOptions::default()
        };
        self.search_with(query, &options)
    }

    /// Search with explicit options. Without `strict` this never fails;
    /// pipeline errors surface as an empty list plus a telemetry event.
    pub fn search_with(&self, query: &str, options: &SearchOptions) -> Vec<RankedResult> {
        self.engine.search(query, options).unwrap_or_default()
    }

    /// Strict-mode search for tests and diagnostics: pipeline errors
    /// propagate instead of collapsing to empty.
    pub fn search_strict(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RankedResult>, EngineError> {
        let options = SearchOptions {
            strict: true,
            ..options.clone()
        };
        self.engine.search(query, &options)
    }

    /// Analyze a context blob and retrieve what it points at.
    pub fn smart_recall(
        &self,
        context_text: &str,
        options: &SmartRecallOptions,
    ) -> Vec<RankedResult> {
        self.engine
            .smart_recall(context_text, options)
            .unwrap_or_default()
    }

    /// Upsert one session record into the corpus.
    pub fn ingest(&self, record: SessionRecord) -> Result<(), EngineError> {
        self.engine.store().ingest(record)?;
        Ok(())
    }

    /// Filtered corpus listing, newest first.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<SessionRecord>, EngineError> {
        Ok(self.engine.store().list(filter)?)
    }

    /// Re-embed every session and attach the fresh matrix.
    ///
    /// Returns the number of rows written. Fails when the embedding
    /// capability is unavailable; lexical search is unaffected either
    /// way.
    pub fn refresh_embeddings(&self) -> Result<usize, EngineError> {
        let embedder = Embedder::new(self.config.embedder_config());
        let snapshot = self.engine.store().load_snapshot()?;
        if snapshot.sessions.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = snapshot
            .sessions
            .iter()
            .map(|s| s.embedding_text())
            .collect();
        let rows = embedder.encode_batch(&texts)?;
        self.engine
            .store()
            .attach_embeddings(&rows, embedder.model_name(), embedder.dim())?;
        Ok(rows.len())
    }

    /// Reconstruct the cross-log chain for one retrieval event.
    pub fn event_chain(&self, event_id: &str) -> EventChain {
        let telemetry_log = PathBuf::from(&self.config.telemetry.log_path);
        let impact_log = sibling(&telemetry_log, IMPACT_LOG_NAME);
        let quality_log = sibling(&telemetry_log, QUALITY_LOG_NAME);
        EventCorrelator::event_chain(
            event_id,
            &telemetry_log,
            Some(impact_log.as_path()),
            Some(quality_log.as_path()),
        )
    }

    /// Push buffered telemetry to disk. Called on orderly shutdown;
    /// drop-paths also flush best-effort.
    pub fn flush_telemetry(&self) {
        self.engine.collector().flush();
    }

    /// The resolved configuration this stack was built from.
    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    /// Direct engine access for callers that need full control.
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(dir: &Path) -> RecallConfig {
        RecallConfig::from_json(&format!(
            r#"{{
                "telemetry": {{
                    "log_path": "{}",
                    "batch_size": 1,
                    "flush_interval_sec": 0.0
                }},
                "embedding": {{ "mode": "stub", "dim": 32 }}
            }}"#,
            dir.join("recall_analytics.jsonl").display()
        ))
        .unwrap()
    }

    #[test]
    fn open_ingest_search_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let recall = Recall::open(stub_config(dir.path()), dir.path().join("index.json"));

        let mut record = SessionRecord::new("2026-02-15_s1", Some(chrono::Utc::now()));
        record.summary = "Fixed JWT refresh race".into();
        record.topics = vec!["auth".into()];
        recall.ingest(record).unwrap();

        let hits = recall.search("jwt refresh");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2026-02-15_s1");
        assert!(hits[0].relevance_score > 0.0);
    }

    #[test]
    fn refresh_embeddings_enables_hybrid() {
        let dir = tempfile::tempdir().unwrap();
        let recall = Recall::open(stub_config(dir.path()), dir.path().join("index.json"));

        let mut record = SessionRecord::new("s1", Some(chrono::Utc::now()));
        record.summary = "auth tokens".into();
        recall.ingest(record).unwrap();

        assert_eq!(recall.refresh_embeddings().unwrap(), 1);
        let hits = recall.search_with(
            "auth tokens",
            &SearchOptions {
                mode: SearchMode::Hybrid,
                ..Default::default()
            },
        );
        assert_eq!(hits[0].search_mode, "hybrid");
        assert!(hits[0].semantic_score.is_some());
    }

    #[test]
    fn refresh_embeddings_on_empty_corpus_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let recall = Recall::open(stub_config(dir.path()), dir.path().join("index.json"));
        assert_eq!(recall.refresh_embeddings().unwrap(), 0);
    }

    #[test]
    fn list_exposes_the_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let recall = Recall::open(stub_config(dir.path()), dir.path().join("index.json"));
        let mut record = SessionRecord::new("s1", Some(chrono::Utc::now()));
        record.topics = vec!["auth".into()];
        recall.ingest(record).unwrap();

        assert_eq!(recall.list(&ListFilter::default()).unwrap().len(), 1);
        let none = recall
            .list(&ListFilter {
                topics: Some(vec!["deploy".into()]),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }
}
