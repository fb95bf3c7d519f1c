//! Hybrid search orchestration for session recall.
//!
//! The engine combines three signals — Okapi BM25 over stored token
//! streams, cosine similarity over the dense sidecar, and exponential
//! temporal decay — under five selectable modes (`auto`, `hybrid`,
//! `bm25`, `semantic`, `simple`). Capability detection happens up front:
//! the engine holds an `Option<Embedder>` and branches on presence, so a
//! missing or broken model degrades the score mix instead of raising.
//!
//! Every search call opens exactly one telemetry event before touching
//! the corpus and closes it on every exit path, success or not.

mod search;
mod simple;
mod smart;
mod types;

pub use crate::search::SearchEngine;
pub use crate::smart::SmartRecallOptions;
pub use crate::types::{
    Bm25TemporalWeights, EngineConfig, EngineError, HybridWeights, RankedResult, SearchFilters,
    SearchMode, SearchOptions, DEFAULT_LIMIT, LIMIT_HARD_CAP,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use corpus::{CorpusStore, SessionRecord};
    use semantic::{Embedder, EmbedderConfig};
    use serde_json::Value;
    use telemetry::{JsonlReader, TelemetryCollector, TelemetryConfig};
    use tempfile::{tempdir, TempDir};

    const DIM: usize = 32;

    fn record(id: &str, tokens: &[&str], age_days: i64) -> SessionRecord {
        let mut r = SessionRecord::new(id, Some(Utc::now() - Duration::days(age_days)));
        r.summary = tokens.join(" ");
        r.token_stream = tokens.iter().map(|t| t.to_string()).collect();
        r
    }

    struct Fixture {
        _dir: TempDir,
        engine: SearchEngine,
        log_path: std::path::PathBuf,
    }

    fn fixture(records: Vec<SessionRecord>, with_embedder: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("index.json"));
        for r in records {
            store.ingest(r).unwrap();
        }

        let embedder = with_embedder.then(|| Embedder::new(EmbedderConfig::stub(DIM)));
        if with_embedder {
            let snapshot = store.load_snapshot().unwrap();
            let texts: Vec<String> = snapshot.sessions.iter().map(|s| s.embedding_text()).collect();
            let rows = Embedder::new(EmbedderConfig::stub(DIM))
                .encode_batch(&texts)
                .unwrap();
            store.attach_embeddings(&rows, "stub", DIM).unwrap();
        }

        let log_path = dir.path().join("recall_analytics.jsonl");
        let collector = TelemetryCollector::new(
            &TelemetryConfig {
                enabled: true,
                log_path: log_path.display().to_string(),
                batch_size: 1,
                flush_interval_sec: 0.0,
                pii_redaction: false,
            },
            None,
        );

        Fixture {
            engine: SearchEngine::new(store, embedder, collector, EngineConfig::default()),
            log_path,
            _dir: dir,
        }
    }

    fn three_sessions() -> Vec<SessionRecord> {
        vec![
            record("2026-02-15_s1", &["auth", "jwt", "bug"], 0),
            record("2026-02-15_s2", &["deploy", "ci"], 40),
            record("2026-02-14_s3", &["auth", "jwt"], 1),
        ]
    }

    fn read_events(fx: &Fixture) -> Vec<Value> {
        fx.engine.collector().flush();
        JsonlReader::read_all(&fx.log_path)
    }

    #[test]
    fn bm25_ranks_matching_sessions_above_non_matching() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "auth jwt",
                &SearchOptions {
                    mode: SearchMode::Bm25,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(results.len(), 3);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids[2], "2026-02-15_s2");
        assert!(results[0].relevance_score > results[2].relevance_score);
        // The non-matching session still carries its temporal component.
        assert!(results[2].relevance_score > 0.0);
        assert_eq!(results[2].bm25_score, Some(0.0));
    }

    #[test]
    fn equal_lexical_matches_rank_by_recency() {
        let fx = fixture(
            vec![
                record("older", &["auth", "jwt"], 5),
                record("newer", &["auth", "jwt"], 0),
            ],
            false,
        );
        let results = fx
            .engine
            .search(
                "auth jwt",
                &SearchOptions {
                    mode: SearchMode::Bm25,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(results[0].id, "newer");
        assert_eq!(results[1].id, "older");
    }

    #[test]
    fn empty_query_in_bm25_mode_ranks_purely_by_recency() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "",
                &SearchOptions {
                    mode: SearchMode::Bm25,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
        assert_eq!(results[0].id, "2026-02-15_s1");
        assert_eq!(results[2].id, "2026-02-15_s2");
        for r in &results {
            assert_eq!(r.relevance_score, r.temporal_score.unwrap());
        }
    }

    #[test]
    fn results_respect_limit_and_score_bounds() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "auth",
                &SearchOptions {
                    limit: 2,
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(results.len() <= 2);
        let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
        for r in &results {
            assert!((0.0..=1.0).contains(&r.relevance_score));
        }
    }

    #[test]
    fn auto_without_embedder_resolves_to_bm25() {
        let fx = fixture(three_sessions(), false);
        fx.engine.search("auth", &SearchOptions::default()).unwrap();

        let events = read_events(&fx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["search_config"]["mode"], "auto");
        assert_eq!(events[0]["search_config"]["mode_resolved"], "bm25");
        assert_eq!(events[0]["outcome"]["success"], true);
    }

    #[test]
    fn auto_with_embeddings_resolves_to_hybrid() {
        let fx = fixture(three_sessions(), true);
        let results = fx.engine.search("auth jwt", &SearchOptions::default()).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].search_mode, "hybrid");
        assert!(results[0].semantic_score.is_some());

        let events = read_events(&fx);
        assert_eq!(events[0]["search_config"]["mode_resolved"], "hybrid");
    }

    #[test]
    fn hybrid_keeps_double_winner_on_top_when_times_are_equal() {
        let stamp = Utc::now();
        let mut winner = SessionRecord::new("winner", Some(stamp));
        winner.summary = "auth jwt refresh".into();
        winner.token_stream = vec!["auth".into(), "jwt".into(), "refresh".into()];
        let mut other = SessionRecord::new("other", Some(stamp));
        other.summary = "deploy pipeline".into();
        other.token_stream = vec!["deploy".into(), "pipeline".into()];

        // Attach dense rows encoding each record's own summary, so the
        // query "auth jwt refresh" is byte-identical to the winner's text
        // and the stub maps it onto the same unit vector (cosine 1.0).
        let dir = tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("index.json"));
        store.ingest(winner).unwrap();
        store.ingest(other).unwrap();
        let embedder = Embedder::new(EmbedderConfig::stub(DIM));
        let rows: Vec<Vec<f32>> = store
            .load_snapshot()
            .unwrap()
            .sessions
            .iter()
            .map(|s| embedder.encode(&s.summary).unwrap())
            .collect();
        store.attach_embeddings(&rows, "stub", DIM).unwrap();

        let engine = SearchEngine::new(
            store,
            Some(embedder),
            TelemetryCollector::disabled(),
            EngineConfig::default(),
        );
        let results = engine
            .search(
                "auth jwt refresh",
                &SearchOptions {
                    mode: SearchMode::Hybrid,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(results[0].id, "winner");
        assert!(results[0].bm25_score.unwrap() > results[1].bm25_score.unwrap());
        assert!(results[0].semantic_score.unwrap() > results[1].semantic_score.unwrap());
    }

    #[test]
    fn hybrid_with_misaligned_matrix_degrades_to_bm25() {
        let fx = fixture(three_sessions(), true);
        // A fresh ingest invalidates the slot alignment: the dense side
        // must refuse and the request must fall back.
        fx.engine
            .store()
            .ingest(record("2026-02-16_s4", &["fresh"], 0))
            .unwrap();

        let degraded = fx
            .engine
            .search(
                "auth jwt",
                &SearchOptions {
                    mode: SearchMode::Hybrid,
                    ..Default::default()
                },
            )
            .unwrap();
        let plain = fx
            .engine
            .search(
                "auth jwt",
                &SearchOptions {
                    mode: SearchMode::Bm25,
                    ..Default::default()
                },
            )
            .unwrap();

        let degraded_ids: Vec<&str> = degraded.iter().map(|r| r.id.as_str()).collect();
        let plain_ids: Vec<&str> = plain.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(degraded_ids, plain_ids);

        let events = read_events(&fx);
        assert_eq!(events[0]["search_config"]["mode_resolved"], "bm25");
        assert_eq!(events[0]["performance"]["degraded"], true);
        assert!(events[1]["performance"].get("degraded").is_none());
    }

    #[test]
    fn semantic_mode_without_embedder_is_an_error_event() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "anything",
                &SearchOptions {
                    mode: SearchMode::Semantic,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(results.is_empty());

        let events = read_events(&fx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["outcome"]["success"], false);
        assert_eq!(events[0]["outcome"]["error_type"], "semantic_unavailable");
    }

    #[test]
    fn semantic_mode_failure_propagates_in_strict_mode() {
        let fx = fixture(three_sessions(), false);
        let err = fx
            .engine
            .search(
                "anything",
                &SearchOptions {
                    mode: SearchMode::Semantic,
                    strict: true,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::SemanticUnavailable));
    }

    #[test]
    fn semantic_mode_omits_temporal_blend() {
        let fx = fixture(three_sessions(), true);
        let results = fx
            .engine
            .search(
                "auth jwt",
                &SearchOptions {
                    mode: SearchMode::Semantic,
                    ..Default::default()
                },
            )
            .unwrap();
        for r in &results {
            assert_eq!(r.search_mode, "semantic");
            assert_eq!(r.relevance_score, r.semantic_score.unwrap());
            assert!(r.temporal_score.is_none());
        }
    }

    #[test]
    fn filter_excluding_everything_is_success_with_zero_results() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "auth",
                &SearchOptions {
                    filters: SearchFilters {
                        topics: Some(vec!["unrelated".into()]),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(results.is_empty());

        let events = read_events(&fx);
        assert_eq!(events[0]["results"]["count"], 0);
        assert_eq!(events[0]["outcome"]["success"], true);
    }

    #[test]
    fn session_substring_filter_narrows_results() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "auth",
                &SearchOptions {
                    filters: SearchFilters {
                        session_substring: Some("02-14".into()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "2026-02-14_s3");
    }

    #[test]
    fn min_relevance_drops_weak_hits() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "auth jwt",
                &SearchOptions {
                    mode: SearchMode::Bm25,
                    min_relevance: 0.5,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!results.is_empty());
        for r in &results {
            assert!(r.relevance_score >= 0.5);
        }
        assert!(!results.iter().any(|r| r.id == "2026-02-15_s2"));
    }

    #[test]
    fn simple_mode_uses_field_weights() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .search(
                "auth",
                &SearchOptions {
                    mode: SearchMode::Simple,
                    ..Default::default()
                },
            )
            .unwrap();
        let top = &results[0];
        assert_eq!(top.search_mode, "simple");
        assert!(top.relevance_score > 0.0);
        assert!(top.summary.contains("auth"));
    }

    #[test]
    fn zero_token_session_is_still_reachable_by_temporal_score() {
        let bare = SessionRecord::new("bare", Some(Utc::now() - Duration::days(2)));
        let fx = fixture(vec![bare], false);

        let results = fx
            .engine
            .search(
                "anything at all",
                &SearchOptions {
                    mode: SearchMode::Bm25,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "bare");
        assert!(results[0].relevance_score > 0.0);
        assert_eq!(results[0].relevance_score, results[0].temporal_score.unwrap());
    }

    #[test]
    fn empty_corpus_returns_empty_with_one_event() {
        let fx = fixture(vec![], false);
        let results = fx.engine.search("auth", &SearchOptions::default()).unwrap();
        assert!(results.is_empty());

        let events = read_events(&fx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["outcome"]["success"], true);
        assert_eq!(events[0]["system_state"]["index_size"], 0);
    }

    #[test]
    fn every_search_appends_exactly_one_event() {
        let fx = fixture(three_sessions(), false);
        for query in ["auth", "deploy", ""] {
            fx.engine.search(query, &SearchOptions::default()).unwrap();
        }
        let events = read_events(&fx);
        assert_eq!(events.len(), 3);
        for event in &events {
            assert!(event["event_id"].is_string());
            assert!(event["timestamp"].is_string());
            assert_eq!(event["event_type"], "recall_triggered");
        }
        let mut ids: Vec<&str> = events
            .iter()
            .map(|e| e["event_id"].as_str().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn performance_breakdown_is_recorded() {
        let fx = fixture(three_sessions(), false);
        fx.engine.search("auth", &SearchOptions::default()).unwrap();
        let events = read_events(&fx);
        let breakdown = &events[0]["performance"]["breakdown"];
        assert!(breakdown["index_load_ms"].is_number());
        assert!(breakdown["filter_ms"].is_number());
        assert!(breakdown["search_ms"].is_number());
        assert!(events[0]["performance"]["total_latency_ms"].is_number());
    }

    #[test]
    fn smart_recall_searches_with_relevance_floor() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .smart_recall(
                "Debugging the JWT auth refresh flow in auth_handler",
                &SmartRecallOptions::default(),
            )
            .unwrap();
        assert!(results.len() <= 3);
        for r in &results {
            assert!(r.relevance_score >= 0.3);
        }

        let events = read_events(&fx);
        let types: Vec<&str> = events
            .iter()
            .map(|e| e["event_type"].as_str().unwrap())
            .collect();
        assert!(types.contains(&"context_analyzed"));
        assert!(types.contains(&"recall_triggered"));
        assert!(types.contains(&"smart_recall_completed"));
    }

    #[test]
    fn smart_recall_with_empty_context_is_a_quiet_no_op() {
        let fx = fixture(three_sessions(), false);
        let results = fx
            .engine
            .smart_recall("   ", &SmartRecallOptions::default())
            .unwrap();
        assert!(results.is_empty());
        assert!(read_events(&fx).is_empty());
    }
}
