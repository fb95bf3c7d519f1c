use std::io;
use thiserror::Error;

/// Errors surfaced by the corpus store.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The on-disk index document exists but cannot be parsed. Retrieval
    /// treats this as fatal for the request; no automatic repair.
    #[error("malformed corpus index: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The dense sidecar is missing, truncated, or has the wrong shape.
    #[error("dense sidecar rejected: {0}")]
    Sidecar(String),
    /// Filesystem failures while reading or staging the index.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
