//! Retrieval telemetry: append-only structured logging with at-most-once
//! semantics, bounded buffering, and secret redaction on ingress.
//!
//! The collector tracks event lifecycles (start → update → end), buffers
//! finished events, and appends them as JSONL under an exclusive file
//! lock so concurrent processes never interleave inside a record. Query
//! text is redacted before it ever sits in memory as part of an event.
//! When telemetry is disabled by configuration, every operation is a
//! no-op and identifiers come back as `None`.
//!
//! The correlator walks the logs backwards: given an `event_id`, it
//! reassembles the chain of derivative records (impact analysis, quality
//! scores) that reference it.

mod collector;
mod context;
mod correlate;
mod error;
mod jsonl;
mod schema;

pub use crate::collector::{deep_merge, patch, TelemetryCollector, TelemetryConfig};
pub use crate::context::{
    current_session_id, is_hook_triggered, SessionIdSource, SESSION_ID_ENV,
};
pub use crate::correlate::{EventChain, EventCorrelator, SOURCE_LOG_KEY};
pub use crate::error::TelemetryError;
pub use crate::jsonl::{BatchedJsonlWriter, JsonlReader, JsonlWriter};
pub use crate::schema::{
    EventType, Outcome, PerformanceData, QueryData, ResultData, ScoreDistribution, ScoreStats,
    SearchConfigData, SystemState, TelemetryEvent,
};
