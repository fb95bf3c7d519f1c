//! Event lifecycle collector.
//!
//! One collector per process, owned by whoever constructed the engine.
//! In-flight events are JSON values so updates can deep-merge arbitrary
//! structured patches; the typed [`schema`](crate::schema) structs build
//! and parse those values at the edges.
//!
//! Disabled telemetry is not an error state: every operation becomes a
//! no-op and `start_event` returns `None`, which callers carry around
//! without checking whether telemetry is on.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use redact::SecretRedactor;
use serde::{Deserialize, Serialize};

use crate::jsonl::BatchedJsonlWriter;
use crate::schema::{EventType, Outcome};

/// Collector configuration, resolved by the configuration layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub log_path: String,
    pub batch_size: usize,
    pub flush_interval_sec: f64,
    pub pii_redaction: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: ".claude/context/sessions/recall_analytics.jsonl".to_string(),
            batch_size: 10,
            flush_interval_sec: 5.0,
            pii_redaction: true,
        }
    }
}

/// Buffered, redacting event collector.
pub struct TelemetryCollector {
    writer: Option<BatchedJsonlWriter>,
    redactor: Option<SecretRedactor>,
    in_flight: Mutex<HashMap<String, Value>>,
}

impl TelemetryCollector {
    /// Build a collector. The redactor is constructed once by the caller
    /// and handed in; `None` means events flow unredacted (the capability
    /// was unavailable) or redaction was disabled.
    pub fn new(config: &TelemetryConfig, redactor: Option<SecretRedactor>) -> Self {
        let writer = config.enabled.then(|| {
            BatchedJsonlWriter::new(
                &config.log_path,
                config.batch_size,
                config.flush_interval_sec,
            )
        });
        Self {
            writer,
            redactor: if config.pii_redaction { redactor } else { None },
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// A collector that drops everything. Useful for tests and for callers
    /// that must hand an engine *something*.
    pub fn disabled() -> Self {
        Self {
            writer: None,
            redactor: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Register an in-flight event. Query text inside `context` is
    /// redacted on the way in. Returns `None` when telemetry is disabled.
    pub fn start_event(&self, event_type: EventType, context: Value) -> Option<String> {
        self.writer.as_ref()?;

        let event_id = Uuid::new_v4().to_string();
        let mut event = json!({
            "event_id": event_id,
            "timestamp": chrono::Utc::now(),
            "event_type": event_type.as_str(),
        });
        deep_merge(&mut event, context);
        self.redact_query_fields(&mut event);

        self.in_flight
            .lock()
            .expect("telemetry in-flight lock")
            .insert(event_id.clone(), event);
        Some(event_id)
    }

    /// Deep-merge `patch` into an in-flight event. Unknown ids and `None`
    /// are ignored.
    pub fn update_event(&self, event_id: Option<&str>, patch: Value) {
        let Some(event_id) = event_id else { return };
        if self.writer.is_none() {
            return;
        }
        let mut in_flight = self.in_flight.lock().expect("telemetry in-flight lock");
        if let Some(event) = in_flight.get_mut(event_id) {
            deep_merge(event, patch);
        }
    }

    /// Attach the outcome, move the event to the write buffer, and drop it
    /// from the in-flight map.
    pub fn end_event(&self, event_id: Option<&str>, outcome: Outcome) {
        let Some(event_id) = event_id else { return };
        let Some(writer) = &self.writer else { return };

        let event = {
            let mut in_flight = self.in_flight.lock().expect("telemetry in-flight lock");
            in_flight.remove(event_id)
        };
        let Some(mut event) = event else { return };

        if let Value::Object(map) = &mut event {
            map.insert(
                "outcome".to_string(),
                serde_json::to_value(&outcome).unwrap_or(Value::Null),
            );
        }

        if let Err(err) = writer.append(event) {
            warn!(%err, "failed to buffer telemetry event");
        }
    }

    /// Synchronous one-shot write for events with no lifecycle. Fills in
    /// `event_id` and `timestamp` when absent; redacts query fields.
    pub fn log_event(&self, mut event: Value) {
        let Some(writer) = &self.writer else { return };

        if let Value::Object(map) = &mut event {
            let needs_id = !matches!(map.get("event_id"), Some(Value::String(s)) if !s.is_empty());
            if needs_id {
                map.insert(
                    "event_id".to_string(),
                    Value::String(Uuid::new_v4().to_string()),
                );
            }
            let needs_stamp =
                !matches!(map.get("timestamp"), Some(Value::String(s)) if !s.is_empty());
            if needs_stamp {
                map.insert(
                    "timestamp".to_string(),
                    serde_json::to_value(chrono::Utc::now()).unwrap_or(Value::Null),
                );
            }
        }
        self.redact_query_fields(&mut event);

        if let Err(err) = writer.append(event) {
            warn!(%err, "failed to buffer telemetry event");
        }
    }

    /// Push buffered events to disk. Best-effort on shutdown paths.
    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            if let Err(err) = writer.flush() {
                warn!(%err, "failed to flush telemetry");
            }
        }
    }

    /// Number of in-flight (started, unended) events.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().expect("telemetry in-flight lock").len()
    }

    fn redact_query_fields(&self, event: &mut Value) {
        let Some(redactor) = &self.redactor else { return };
        let Some(query) = event.get_mut("query") else {
            return;
        };
        match query {
            Value::String(raw) => {
                let (clean, _) = redactor.redact(raw);
                *raw = clean;
            }
            Value::Object(map) => {
                if let Some(Value::String(raw)) = map.get_mut("raw_query") {
                    let (clean, _) = redactor.redact(raw);
                    *raw = clean;
                }
            }
            _ => {}
        }
    }
}

impl Drop for TelemetryCollector {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Merge `source` into `target`: objects merge recursively, everything
/// else replaces.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source) => *target_slot = source,
    }
}

/// Helper for building patch objects without stringly-typed nesting
/// mistakes in call sites.
pub fn patch(entries: Vec<(&str, Value)>) -> Value {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonl::JsonlReader;
    use redact::{PatternCatalog, SecretRedactor};
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            log_path: dir.join("log.jsonl").display().to_string(),
            batch_size: 1,
            flush_interval_sec: 0.0,
            pii_redaction: true,
        }
    }

    fn redactor() -> SecretRedactor {
        SecretRedactor::new(
            PatternCatalog::from_json(
                r#"{"patterns": [{"name": "API Key", "regex": "sk-[A-Za-z0-9-]{20,}", "confidence": "high", "category": "api_key"}]}"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn lifecycle_writes_exactly_one_record() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let collector = TelemetryCollector::new(&cfg, None);

        let id = collector
            .start_event(EventType::RecallTriggered, json!({"query": {"raw_query": "q"}}))
            .unwrap();
        collector.update_event(Some(&id), json!({"results": {"count": 2}}));
        collector.end_event(Some(&id), Outcome::success());
        collector.flush();

        let entries = JsonlReader::read_all(std::path::Path::new(&cfg.log_path));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["event_id"].as_str().unwrap(), id);
        assert_eq!(entries[0]["results"]["count"], 2);
        assert_eq!(entries[0]["outcome"]["success"], true);
        assert_eq!(collector.in_flight_count(), 0);
    }

    #[test]
    fn update_deep_merges_nested_objects() {
        let dir = tempdir().unwrap();
        let collector = TelemetryCollector::new(&config(dir.path()), None);

        let id = collector
            .start_event(
                EventType::RecallTriggered,
                json!({"search_config": {"mode": "auto", "limit": 5}}),
            )
            .unwrap();
        collector.update_event(Some(&id), json!({"search_config": {"mode_resolved": "bm25"}}));
        collector.end_event(Some(&id), Outcome::success());
        collector.flush();

        let entries = JsonlReader::read_all(collector.writer.as_ref().unwrap().path());
        assert_eq!(entries[0]["search_config"]["mode"], "auto");
        assert_eq!(entries[0]["search_config"]["limit"], 5);
        assert_eq!(entries[0]["search_config"]["mode_resolved"], "bm25");
    }

    #[test]
    fn disabled_collector_returns_none_and_writes_nothing() {
        let collector = TelemetryCollector::disabled();
        let id = collector.start_event(EventType::RecallTriggered, json!({}));
        assert!(id.is_none());
        collector.update_event(id.as_deref(), json!({"x": 1}));
        collector.end_event(id.as_deref(), Outcome::success());
        collector.log_event(json!({"event_type": "search_completed"}));
        collector.flush();
        assert!(!collector.is_enabled());
    }

    #[test]
    fn raw_query_is_redacted_on_start() {
        let dir = tempdir().unwrap();
        let collector = TelemetryCollector::new(&config(dir.path()), Some(redactor()));
        let secret = "sk-proj-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

        let id = collector
            .start_event(
                EventType::RecallTriggered,
                json!({"query": {"raw_query": format!("use {secret} now")}}),
            )
            .unwrap();
        collector.end_event(Some(&id), Outcome::success());
        collector.flush();

        let text = std::fs::read_to_string(collector.writer.as_ref().unwrap().path()).unwrap();
        assert!(!text.contains(secret));
        assert!(text.contains("[REDACTED:API Key]"));
    }

    #[test]
    fn bare_string_query_is_redacted_in_log_event() {
        let dir = tempdir().unwrap();
        let collector = TelemetryCollector::new(&config(dir.path()), Some(redactor()));
        let secret = "sk-proj-AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

        collector.log_event(json!({
            "event_type": "context_analyzed",
            "query": secret,
        }));
        collector.flush();

        let entries = JsonlReader::read_all(collector.writer.as_ref().unwrap().path());
        assert!(entries[0]["query"].as_str().unwrap().contains("[REDACTED:"));
        assert!(entries[0]["event_id"].is_string());
        assert!(entries[0]["timestamp"].is_string());
    }

    #[test]
    fn end_event_with_unknown_id_is_ignored() {
        let dir = tempdir().unwrap();
        let collector = TelemetryCollector::new(&config(dir.path()), None);
        collector.end_event(Some("no-such-id"), Outcome::success());
        collector.flush();
        assert!(JsonlReader::read_all(collector.writer.as_ref().unwrap().path()).is_empty());
    }

    #[test]
    fn deep_merge_replaces_scalars_and_merges_maps() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": 3});
        deep_merge(&mut target, json!({"a": {"b": 9}, "d": 4, "e": 5}));
        assert_eq!(target, json!({"a": {"b": 9, "c": 2}, "d": 4, "e": 5}));
    }

    #[test]
    fn patch_builder_produces_object() {
        let p = patch(vec![("x", json!(1)), ("y", json!({"z": 2}))]);
        assert_eq!(p, json!({"x": 1, "y": {"z": 2}}));
    }
}
