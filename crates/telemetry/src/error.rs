use std::io;
use thiserror::Error;

/// Errors surfaced by telemetry I/O. The collector itself swallows these
/// (telemetry must never break retrieval); they are visible to callers
/// that drive the writers and readers directly.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
