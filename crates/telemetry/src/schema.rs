//! Wire-level event schema.
//!
//! Consumers tail the log and must tolerate unknown fields; we return the
//! favor by round-tripping fields we don't recognize through the flattened
//! `extra` map instead of dropping them. Everything optional serializes
//! only when present, keeping log lines small.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Enumerated event kinds. The string forms are the wire contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RecallTriggered,
    ContextAnalyzed,
    SmartRecallCompleted,
    SearchCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RecallTriggered => "recall_triggered",
            EventType::ContextAnalyzed => "context_analyzed",
            EventType::SmartRecallCompleted => "smart_recall_completed",
            EventType::SearchCompleted => "search_completed",
        }
    }
}

/// Query information carried by a retrieval event. `raw_query` is always
/// redacted before it reaches this struct's serialized form in a log.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QueryData {
    pub raw_query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technical_terms: Vec<String>,
    #[serde(default)]
    pub query_length: usize,
}

/// Requested versus resolved search configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchConfigData {
    pub mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode_resolved: String,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub min_relevance: f64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub filters: Value,
}

/// Score summary over returned results.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScoreStats {
    pub top_score: f64,
    pub avg_score: f64,
    pub min_score: f64,
    /// Bucketed distribution at the 0.7 and 0.4 cutoffs.
    pub score_distribution: ScoreDistribution,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ScoreDistribution {
    #[serde(rename = "high_0.7+")]
    pub high: usize,
    #[serde(rename = "medium_0.4-0.7")]
    pub medium: usize,
    #[serde(rename = "low_<0.4")]
    pub low: usize,
}

/// Result summary for a retrieval event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResultData {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_sessions: Vec<String>,
    #[serde(default)]
    pub scores: ScoreStats,
}

/// Latency breakdown. All values are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PerformanceData {
    pub total_latency_ms: f64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub breakdown: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// Coarse system snapshot at event time.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SystemState {
    pub index_size: usize,
    pub embeddings_available: bool,
}

/// Terminal outcome of an event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
            error_type: None,
        }
    }

    pub fn failure(error: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_type: Some(error_type.into()),
        }
    }
}

/// One structured event as written to (or read from) the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// `"environment"` or `"pid_fallback"`; analyses exclude the latter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_config: Option<SearchConfigData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_state: Option<SystemState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Fields this build does not know about; preserved across
    /// round-trips for forward compatibility.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            session_id: None,
            session_id_source: None,
            trigger_source: None,
            query: None,
            search_config: None,
            results: None,
            performance: None,
            system_state: None,
            outcome: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_strings() {
        assert_eq!(
            serde_json::to_string(&EventType::RecallTriggered).unwrap(),
            "\"recall_triggered\""
        );
        assert_eq!(EventType::SmartRecallCompleted.as_str(), "smart_recall_completed");
    }

    #[test]
    fn new_event_has_uuid_and_timestamp() {
        let event = TelemetryEvent::new(EventType::SearchCompleted);
        assert_eq!(event.event_id.len(), 36);
        let other = TelemetryEvent::new(EventType::SearchCompleted);
        assert_ne!(event.event_id, other.event_id);
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let event = TelemetryEvent::new(EventType::RecallTriggered);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("results"));
        assert!(!json.contains("outcome"));
        assert!(!json.contains("session_id"));
    }

    #[test]
    fn unknown_fields_round_trip_through_extra() {
        let line = r#"{
            "event_id": "00000000-0000-4000-8000-000000000000",
            "timestamp": "2026-02-15T12:00:00Z",
            "event_type": "recall_triggered",
            "future_field": {"nested": true}
        }"#;
        let event: TelemetryEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.extra["future_field"]["nested"], true);

        let out = serde_json::to_value(&event).unwrap();
        assert_eq!(out["future_field"]["nested"], true);
    }

    #[test]
    fn score_distribution_bucket_names() {
        let stats = ScoreStats {
            top_score: 0.9,
            avg_score: 0.5,
            min_score: 0.2,
            score_distribution: ScoreDistribution {
                high: 1,
                medium: 1,
                low: 1,
            },
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["score_distribution"]["high_0.7+"], 1);
        assert_eq!(json["score_distribution"]["medium_0.4-0.7"], 1);
        assert_eq!(json["score_distribution"]["low_<0.4"], 1);
    }

    #[test]
    fn outcome_constructors() {
        assert!(Outcome::success().success);
        let failure = Outcome::failure("boom", "TestError");
        assert!(!failure.success);
        assert_eq!(failure.error_type.as_deref(), Some("TestError"));
    }

    #[test]
    fn timestamp_serializes_rfc3339_utc() {
        let mut event = TelemetryEvent::new(EventType::ContextAnalyzed);
        event.timestamp = "2026-02-15T12:00:00Z".parse().unwrap();
        let json = serde_json::to_value(&event).unwrap();
        let stamp = json["timestamp"].as_str().unwrap();
        assert!(stamp.starts_with("2026-02-15T12:00:00"));
    }
}
