use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the embedder gateway.
///
/// # Example
/// ```
/// use semantic::EmbedderConfig;
///
/// let cfg = EmbedderConfig {
///     mode: "stub".into(),
///     dim: 384,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedderConfig {
    /// `"model"` runs the local ONNX sentence-embedding model; `"stub"`
    /// produces deterministic hash-derived vectors (tests, benchmarks, and
    /// machines without model assets).
    pub mode: String,
    /// Friendly model label recorded in corpus metadata.
    pub model_name: String,
    /// Local path of the ONNX model file.
    pub model_path: PathBuf,
    /// Path to `tokenizer.json`. When absent, inferred as a sibling of the
    /// model file.
    pub tokenizer_path: Option<PathBuf>,
    /// Output embedding dimension. Model outputs are pooled to this width;
    /// the stub generates it directly.
    pub dim: usize,
    /// Token budget per encoded input; longer inputs are truncated.
    pub max_sequence_length: usize,
    /// Capacity of the query-encoding LRU cache. Zero disables caching.
    pub cache_size: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            mode: "model".into(),
            model_name: "all-MiniLM-L6-v2".into(),
            model_path: PathBuf::from("./models/all-MiniLM-L6-v2/onnx/model.onnx"),
            tokenizer_path: Some(PathBuf::from("./models/all-MiniLM-L6-v2/tokenizer.json")),
            dim: 384,
            max_sequence_length: 256,
            cache_size: 128,
        }
    }
}

impl EmbedderConfig {
    /// Convenience constructor for the deterministic stub.
    pub fn stub(dim: usize) -> Self {
        Self {
            mode: "stub".into(),
            model_name: "stub".into(),
            dim,
            ..Self::default()
        }
    }

    /// Effective tokenizer path: explicit, or `tokenizer.json` next to the
    /// model file's parent directory.
    pub fn resolved_tokenizer_path(&self) -> PathBuf {
        self.tokenizer_path.clone().unwrap_or_else(|| {
            self.model_path
                .parent()
                .map(|p| p.join("tokenizer.json"))
                .unwrap_or_else(|| PathBuf::from("tokenizer.json"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_model_mode() {
        let cfg = EmbedderConfig::default();
        assert_eq!(cfg.mode, "model");
        assert_eq!(cfg.dim, 384);
    }

    #[test]
    fn stub_constructor() {
        let cfg = EmbedderConfig::stub(256);
        assert_eq!(cfg.mode, "stub");
        assert_eq!(cfg.dim, 256);
    }

    #[test]
    fn tokenizer_path_falls_back_next_to_model() {
        let cfg = EmbedderConfig {
            tokenizer_path: None,
            model_path: PathBuf::from("/models/x/model.onnx"),
            ..Default::default()
        };
        assert_eq!(
            cfg.resolved_tokenizer_path(),
            PathBuf::from("/models/x/tokenizer.json")
        );
    }
}
