use std::io;
use thiserror::Error;

/// Errors surfaced by the embedder gateway.
#[derive(Debug, Error)]
pub enum SemanticError {
    /// The model file could not be located.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// The tokenizer JSON is missing.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// The embedding capability is disabled or failed earlier in this
    /// process; callers should degrade rather than retry.
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),
    /// Configuration is inconsistent.
    #[error("invalid embedder config: {0}")]
    InvalidConfig(String),
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Runtime, tokenizer, or shape errors during inference.
    #[error("inference failure: {0}")]
    Inference(String),
}
