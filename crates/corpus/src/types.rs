//! Corpus data model: session records, lexical statistics, dense metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use analyze::tokenize_words;

/// Schema version of the persisted index document.
pub const CORPUS_SCHEMA_VERSION: &str = "1";

/// One past conversation, as stored in the index.
///
/// Created by the external capture path; mutated only by re-ingestion of
/// the same `id`; never destroyed by the retrieval core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Stable, sortable identifier (typically timestamp-derived).
    pub id: String,
    /// Capture instant. Absent or unparseable capture times score a
    /// neutral 0.5 on the temporal axis.
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    /// Short human summary of the session.
    #[serde(default)]
    pub summary: String,
    /// Topic labels; deduplicated on ingest.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Paths touched during the session, in order, deduplicated.
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Opaque issue references.
    #[serde(default)]
    pub issue_refs: Vec<String>,
    /// Lowercased word tokens used for BM25. May be empty; the record is
    /// then searchable by temporal score only.
    #[serde(default)]
    pub token_stream: Vec<String>,
    /// Row index into the dense matrix; when present it equals this
    /// record's position in the stored session order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_slot: Option<usize>,
    /// Source session filename, opaque to scoring.
    #[serde(default)]
    pub file: String,
    /// Capture status label, opaque to scoring.
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub tokens_approx: usize,
    /// Embedding refresh bookkeeping, flipped by ingest and
    /// `attach_embeddings`.
    #[serde(default)]
    pub needs_embedding: bool,
    #[serde(default)]
    pub has_embedding: bool,
}

fn default_status() -> String {
    "captured".to_string()
}

impl SessionRecord {
    /// Minimal record for a known id and capture time.
    pub fn new(id: impl Into<String>, captured_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            captured_at,
            summary: String::new(),
            topics: Vec::new(),
            files_modified: Vec::new(),
            issue_refs: Vec::new(),
            token_stream: Vec::new(),
            embedding_slot: None,
            file: String::new(),
            status: default_status(),
            message_count: 0,
            tokens_approx: 0,
            needs_embedding: true,
            has_embedding: false,
        }
    }

    /// Searchable text with field weighting: summary counts three times,
    /// topics twice, files and issue refs once.
    pub fn weighted_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.summary.is_empty() {
            for _ in 0..3 {
                parts.push(&self.summary);
            }
        }
        for topic in &self.topics {
            parts.push(topic);
            parts.push(topic);
        }
        for file in &self.files_modified {
            parts.push(file);
        }
        for issue in &self.issue_refs {
            parts.push(issue);
        }
        parts.join(" ")
    }

    /// Tokenize the weighted text into a BM25 token stream.
    pub fn build_token_stream(&self) -> Vec<String> {
        tokenize_words(&self.weighted_text())
    }

    /// Text handed to the embedder: summary doubled, then topics, then
    /// file names (not full paths), then issue refs.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.summary.is_empty() {
            parts.push(self.summary.clone());
            parts.push(self.summary.clone());
        }
        if !self.topics.is_empty() {
            parts.push(self.topics.join(" "));
        }
        if !self.files_modified.is_empty() {
            let names: Vec<&str> = self
                .files_modified
                .iter()
                .take(10)
                .map(|f| f.rsplit('/').next().unwrap_or(f.as_str()))
                .collect();
            parts.push(names.join(" "));
        }
        if !self.issue_refs.is_empty() {
            let refs: Vec<&str> = self.issue_refs.iter().take(5).map(String::as_str).collect();
            parts.push(refs.join(" "));
        }
        parts.join(" ")
    }
}

/// Lexical statistics for the whole corpus, aligned with session order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Bm25Stats {
    /// Token count of each session, in stored order.
    pub doc_len: Vec<usize>,
    /// Mean token count over non-empty sessions; 0.0 when every session
    /// is empty.
    pub avgdl: f64,
    /// Number of sessions containing each token.
    pub doc_freq: BTreeMap<String, usize>,
    /// Okapi inverse document frequency per token with `doc_freq > 0`.
    pub idf: BTreeMap<String, f64>,
}

impl Bm25Stats {
    /// Build statistics from scratch over `sessions`.
    ///
    /// `N` for the idf formulation is the number of non-empty sessions;
    /// `idf(t) = ln(1 + (N − df + 0.5)/(df + 0.5))`, which is non-negative
    /// for every observed term.
    pub fn rebuild(sessions: &[SessionRecord]) -> Self {
        let doc_len: Vec<usize> = sessions.iter().map(|s| s.token_stream.len()).collect();

        let non_empty: Vec<&SessionRecord> =
            sessions.iter().filter(|s| !s.token_stream.is_empty()).collect();
        let avgdl = if non_empty.is_empty() {
            0.0
        } else {
            non_empty.iter().map(|s| s.token_stream.len()).sum::<usize>() as f64
                / non_empty.len() as f64
        };

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for session in &non_empty {
            let mut seen: Vec<&str> = Vec::new();
            for token in &session.token_stream {
                if !seen.contains(&token.as_str()) {
                    seen.push(token);
                    *doc_freq.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        let n = non_empty.len() as f64;
        let idf: BTreeMap<String, f64> = doc_freq
            .iter()
            .map(|(token, &df)| {
                let df = df as f64;
                (token.clone(), (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        Self {
            doc_len,
            avgdl,
            doc_freq,
            idf,
        }
    }

    /// Distinct indexed terms.
    pub fn vocab_size(&self) -> usize {
        self.doc_freq.len()
    }
}

/// Dense-side metadata stored in the index document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseMeta {
    /// Embedding model label.
    pub model: String,
    /// Vector dimension.
    pub dim: usize,
    /// Row count; must equal the session count for scoring to run.
    pub count: usize,
    /// Sidecar filename, resolved relative to the index document.
    pub path: String,
}

/// The persistent aggregate: every session plus derived statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusIndex {
    pub version: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub bm25: Option<Bm25Stats>,
    #[serde(default)]
    pub dense: Option<DenseMeta>,
}

impl Default for CorpusIndex {
    fn default() -> Self {
        Self {
            version: CORPUS_SCHEMA_VERSION.to_string(),
            last_updated: None,
            sessions: Vec::new(),
            bm25: None,
            dense: None,
        }
    }
}

impl CorpusIndex {
    /// Whether the dense side is usable: metadata present, every record
    /// has a slot equal to its position, and the advertised row count
    /// matches the session count. All-or-none by design; partial coverage
    /// degrades to lexical-only scoring.
    pub fn dense_alignment_ok(&self) -> bool {
        let Some(dense) = &self.dense else {
            return false;
        };
        dense.count == self.sessions.len()
            && self
                .sessions
                .iter()
                .enumerate()
                .all(|(i, s)| s.embedding_slot == Some(i))
    }
}

/// Filter for [`CorpusStore::list`](crate::CorpusStore::list).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListFilter {
    /// Keep sessions whose id contains this substring.
    #[serde(default)]
    pub id_substring: Option<String>,
    /// Keep sessions sharing at least one topic (case-insensitive).
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

impl ListFilter {
    pub fn matches(&self, record: &SessionRecord) -> bool {
        if let Some(needle) = &self.id_substring {
            if !record.id.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(topics) = &self.topics {
            let record_topics: Vec<String> =
                record.topics.iter().map(|t| t.to_lowercase()).collect();
            let hit = topics
                .iter()
                .any(|t| record_topics.contains(&t.to_lowercase()));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, tokens: &[&str]) -> SessionRecord {
        let mut r = SessionRecord::new(id, Some(Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap()));
        r.token_stream = tokens.iter().map(|t| t.to_string()).collect();
        r
    }

    #[test]
    fn weighted_text_repeats_fields() {
        let mut r = SessionRecord::new("s1", None);
        r.summary = "auth fix".into();
        r.topics = vec!["jwt".into()];
        r.files_modified = vec!["src/auth.rs".into()];
        let text = r.weighted_text();
        assert_eq!(text.matches("auth fix").count(), 3);
        assert_eq!(text.matches("jwt").count(), 2);
        assert_eq!(text.matches("src/auth.rs").count(), 1);
    }

    #[test]
    fn token_stream_comes_from_weighted_text() {
        let mut r = SessionRecord::new("s1", None);
        r.summary = "JWT bug".into();
        let tokens = r.build_token_stream();
        assert_eq!(tokens.iter().filter(|t| t.as_str() == "jwt").count(), 3);
    }

    #[test]
    fn embedding_text_uses_file_names_not_paths() {
        let mut r = SessionRecord::new("s1", None);
        r.summary = "fix".into();
        r.files_modified = vec!["deep/path/to/handler.rs".into()];
        let text = r.embedding_text();
        assert!(text.contains("handler.rs"));
        assert!(!text.contains("deep/path"));
    }

    #[test]
    fn stats_rebuild_counts_documents_once_per_term() {
        let sessions = vec![
            record("a", &["auth", "auth", "jwt"]),
            record("b", &["auth"]),
            record("c", &[]),
        ];
        let stats = Bm25Stats::rebuild(&sessions);
        assert_eq!(stats.doc_len, vec![3, 1, 0]);
        assert_eq!(stats.doc_freq["auth"], 2);
        assert_eq!(stats.doc_freq["jwt"], 1);
        assert!((stats.avgdl - 2.0).abs() < f64::EPSILON);
        assert_eq!(stats.vocab_size(), 2);
    }

    #[test]
    fn stats_idf_is_positive_and_rarer_terms_score_higher() {
        let sessions = vec![
            record("a", &["common", "rare"]),
            record("b", &["common"]),
            record("c", &["common"]),
        ];
        let stats = Bm25Stats::rebuild(&sessions);
        assert!(stats.idf["rare"] > stats.idf["common"]);
        assert!(stats.idf["common"] > 0.0);
    }

    #[test]
    fn stats_rebuild_is_reproducible() {
        let sessions = vec![record("a", &["x", "y"]), record("b", &["y"])];
        let once = Bm25Stats::rebuild(&sessions);
        let twice = Bm25Stats::rebuild(&sessions);
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn empty_corpus_stats_are_zeroed() {
        let stats = Bm25Stats::rebuild(&[]);
        assert!(stats.doc_len.is_empty());
        assert_eq!(stats.avgdl, 0.0);
        assert_eq!(stats.vocab_size(), 0);
    }

    #[test]
    fn dense_alignment_requires_full_coverage() {
        let mut index = CorpusIndex::default();
        index.sessions = vec![record("a", &[]), record("b", &[])];
        index.dense = Some(DenseMeta {
            model: "stub".into(),
            dim: 4,
            count: 2,
            path: "embeddings.bin".into(),
        });
        assert!(!index.dense_alignment_ok());

        index.sessions[0].embedding_slot = Some(0);
        index.sessions[1].embedding_slot = Some(1);
        assert!(index.dense_alignment_ok());

        index.dense.as_mut().unwrap().count = 1;
        assert!(!index.dense_alignment_ok());
    }

    #[test]
    fn list_filter_by_substring_and_topics() {
        let mut r = record("2026-02-15_s1", &[]);
        r.topics = vec!["Auth".into()];

        assert!(ListFilter::default().matches(&r));
        assert!(ListFilter {
            id_substring: Some("02-15".into()),
            ..Default::default()
        }
        .matches(&r));
        assert!(!ListFilter {
            id_substring: Some("02-16".into()),
            ..Default::default()
        }
        .matches(&r));
        assert!(ListFilter {
            topics: Some(vec!["auth".into()]),
            ..Default::default()
        }
        .matches(&r));
        assert!(!ListFilter {
            topics: Some(vec!["deploy".into()]),
            ..Default::default()
        }
        .matches(&r));
    }
}
