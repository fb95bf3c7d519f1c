//! Cross-log event correlation.
//!
//! Derivative subsystems (impact analysis, quality scoring) reference a
//! retrieval event via `recall_event_id`. Given an event id, walk the
//! primary and derivative logs and reassemble the chain. Read-only and
//! best-effort: missing logs and malformed lines are skipped.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::jsonl::JsonlReader;

/// Annotation key added to timeline entries naming the source log.
pub const SOURCE_LOG_KEY: &str = "_source_log";

/// Complete chain for one retrieval event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChain {
    pub telemetry: Option<Value>,
    pub impact: Option<Value>,
    pub quality: Option<Value>,
}

/// Correlates events across telemetry and derivative logs.
pub struct EventCorrelator;

impl EventCorrelator {
    fn matches_event(entry: &Value, event_id: &str) -> bool {
        entry.get("event_id").and_then(Value::as_str) == Some(event_id)
            || entry.get("recall_event_id").and_then(Value::as_str) == Some(event_id)
    }

    /// All events matching `event_id` (directly or via `recall_event_id`)
    /// in each of `log_paths`, keyed by log file stem.
    pub fn find_related_events(
        event_id: &str,
        log_paths: &[PathBuf],
    ) -> BTreeMap<String, Vec<Value>> {
        let mut related = BTreeMap::new();
        for path in log_paths {
            let events = JsonlReader::read_log(path, None, |e| Self::matches_event(e, event_id));
            if !events.is_empty() {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                related.insert(name, events);
            }
        }
        related
    }

    /// Chronologically sorted timeline of every related event, each
    /// annotated with its source log name.
    pub fn build_event_timeline(event_id: &str, logs: &[(String, PathBuf)]) -> Vec<Value> {
        let mut all_events = Vec::new();
        for (name, path) in logs {
            for mut event in
                JsonlReader::read_log(path, None, |e| Self::matches_event(e, event_id))
            {
                if let Value::Object(map) = &mut event {
                    map.insert(SOURCE_LOG_KEY.to_string(), Value::String(name.clone()));
                }
                all_events.push(event);
            }
        }

        all_events.sort_by(|a, b| {
            let stamp = |e: &Value| {
                e.get("timestamp")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string()
            };
            stamp(a).cmp(&stamp(b))
        });
        all_events
    }

    /// The canonical chain: telemetry record, then impact and quality
    /// derivatives when the respective logs exist.
    pub fn event_chain(
        event_id: &str,
        telemetry_log: &Path,
        impact_log: Option<&Path>,
        quality_log: Option<&Path>,
    ) -> EventChain {
        let mut chain = EventChain::default();

        chain.telemetry = JsonlReader::read_log(telemetry_log, None, |e| {
            e.get("event_id").and_then(Value::as_str) == Some(event_id)
        })
        .into_iter()
        .next();

        if let Some(impact_log) = impact_log {
            chain.impact = JsonlReader::read_log(impact_log, None, |e| {
                e.get("recall_event_id").and_then(Value::as_str) == Some(event_id)
            })
            .into_iter()
            .next();
        }

        if let Some(quality_log) = quality_log {
            chain.quality = JsonlReader::read_log(quality_log, None, |e| {
                e.get("recall_event_id").and_then(Value::as_str) == Some(event_id)
            })
            .into_iter()
            .next();
        }

        chain
    }

    /// Every telemetry event for a given session id.
    pub fn find_session_events(session_id: &str, telemetry_log: &Path) -> Vec<Value> {
        JsonlReader::read_log(telemetry_log, None, |e| {
            e.get("session_id").and_then(Value::as_str) == Some(session_id)
        })
    }

    /// Count events by `event_type` in one log.
    pub fn event_count_by_type(log_path: &Path) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for event in JsonlReader::read_all(log_path) {
            let event_type = event
                .get("event_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            *counts.entry(event_type).or_insert(0) += 1;
        }
        counts
    }
}
