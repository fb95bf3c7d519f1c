//! Layered configuration for the recall pipeline.
//!
//! Resolution order: built-in defaults ← JSON file ← environment. The
//! resolved document supports dotted lookups (`telemetry.batch_size`) and
//! fail-closed feature gates, and produces the typed per-crate configs
//! that get threaded through constructors — library code never reads
//! process-global state after startup.
//!
//! ## Example document
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "telemetry": {
//!     "enabled": true,
//!     "log_path": ".claude/context/sessions/recall_analytics.jsonl",
//!     "batch_size": 10,
//!     "flush_interval_sec": 5.0,
//!     "pii_redaction": true
//!   },
//!   "retrieval": {
//!     "default_mode": "auto",
//!     "default_limit": 5,
//!     "temporal_half_life_days": 30.0,
//!     "bm25": { "k1": 1.5, "b": 0.75 },
//!     "hybrid": { "bm25_weight": 0.5, "dense_weight": 0.5 },
//!     "bm25_temporal": { "bm25_weight": 0.7, "temporal_weight": 0.3 }
//!   },
//!   "embedding": { "mode": "model", "dim": 384 },
//!   "redaction": {
//!     "entropy": { "enabled": true, "min_length": 16, "threshold": 4.5 },
//!     "patterns_path": ".claude/config/secret_patterns.json"
//!   }
//! }
//! ```
//!
//! Environment variables override single keys; booleans accept
//! `true|1|yes` case-insensitively:
//!
//! ```text
//! RECALL_TELEMETRY_ENABLED=no
//! RECALL_RETRIEVAL_DEFAULT_MODE=bm25
//! RECALL_EMBEDDING_MODEL_PATH=/models/model.onnx
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use engine::{Bm25TemporalWeights, EngineConfig, HybridWeights, SearchMode};
use rank::Bm25Params;
use redact::{CatalogDocument, PatternCatalog, SecretRedactor};
use semantic::EmbedderConfig;
use telemetry::TelemetryConfig;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    #[serde(default = "true_value")]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_sec: f64,
    #[serde(default = "true_value")]
    pub pii_redaction: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_log_path(),
            batch_size: default_batch_size(),
            flush_interval_sec: default_flush_interval(),
            pii_redaction: true,
        }
    }
}

impl TelemetrySection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "telemetry.batch_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// BM25 parameter subsection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bm25Section {
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
}

impl Default for Bm25Section {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

/// Weight pair subsections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HybridSection {
    #[serde(default = "default_half")]
    pub bm25_weight: f64,
    #[serde(default = "default_half")]
    pub dense_weight: f64,
}

impl Default for HybridSection {
    fn default() -> Self {
        Self {
            bm25_weight: 0.5,
            dense_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bm25TemporalSection {
    #[serde(default = "default_bm25_temporal_bm25")]
    pub bm25_weight: f64,
    #[serde(default = "default_bm25_temporal_temporal")]
    pub temporal_weight: f64,
}

impl Default for Bm25TemporalSection {
    fn default() -> Self {
        Self {
            bm25_weight: 0.7,
            temporal_weight: 0.3,
        }
    }
}

/// Retrieval section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalSection {
    #[serde(default = "default_mode_name")]
    pub default_mode: String,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_half_life")]
    pub temporal_half_life_days: f64,
    #[serde(default)]
    pub bm25: Bm25Section,
    #[serde(default)]
    pub hybrid: HybridSection,
    #[serde(default)]
    pub bm25_temporal: Bm25TemporalSection,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            default_mode: default_mode_name(),
            default_limit: default_limit(),
            temporal_half_life_days: default_half_life(),
            bm25: Bm25Section::default(),
            hybrid: HybridSection::default(),
            bm25_temporal: Bm25TemporalSection::default(),
        }
    }
}

impl RetrievalSection {
    fn validate(&self) -> Result<(), ConfigError> {
        SearchMode::parse(&self.default_mode).map_err(|_| {
            ConfigError::Validation(format!(
                "retrieval.default_mode '{}' is not a known mode",
                self.default_mode
            ))
        })?;
        if self.default_limit == 0 {
            return Err(ConfigError::Validation(
                "retrieval.default_limit must be >= 1".to_string(),
            ));
        }
        if self.temporal_half_life_days <= 0.0 {
            return Err(ConfigError::Validation(
                "retrieval.temporal_half_life_days must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("retrieval.hybrid.bm25_weight", self.hybrid.bm25_weight),
            ("retrieval.hybrid.dense_weight", self.hybrid.dense_weight),
            (
                "retrieval.bm25_temporal.bm25_weight",
                self.bm25_temporal.bm25_weight,
            ),
            (
                "retrieval.bm25_temporal.temporal_weight",
                self.bm25_temporal.temporal_weight,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }
        Ok(())
    }
}

/// Embedding section, mapped onto the embedder gateway config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSection {
    #[serde(default = "default_embed_mode")]
    pub mode: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub tokenizer_path: Option<String>,
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_max_seq")]
    pub max_sequence_length: usize,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            mode: default_embed_mode(),
            model_name: default_model_name(),
            model_path: None,
            tokenizer_path: None,
            dim: default_dim(),
            max_sequence_length: default_max_seq(),
            cache_size: default_cache_size(),
        }
    }
}

impl EmbeddingSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if !["model", "stub"].contains(&self.mode.as_str()) {
            return Err(ConfigError::Validation(format!(
                "embedding.mode '{}' must be \"model\" or \"stub\"",
                self.mode
            )));
        }
        if self.dim == 0 {
            return Err(ConfigError::Validation(
                "embedding.dim must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entropy subsection of the redaction section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntropySection {
    #[serde(default = "true_value")]
    pub enabled: bool,
    #[serde(default = "default_entropy_min_length")]
    pub min_length: usize,
    #[serde(default = "default_entropy_threshold")]
    pub threshold: f64,
}

impl Default for EntropySection {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: default_entropy_min_length(),
            threshold: default_entropy_threshold(),
        }
    }
}

/// Redaction section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RedactionSection {
    #[serde(default)]
    pub entropy: EntropySection,
    /// Path of the pattern catalog JSON. Absent means no redactor can be
    /// built; downstream writes proceed unredacted.
    #[serde(default)]
    pub patterns_path: Option<String>,
    /// Optional extra whitelist document merged over the catalog's own.
    #[serde(default)]
    pub whitelist_path: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecallConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
    #[serde(default)]
    pub redaction: RedactionSection,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            telemetry: TelemetrySection::default(),
            retrieval: RetrievalSection::default(),
            embedding: EmbeddingSection::default(),
            redaction: RedactionSection::default(),
        }
    }
}

impl RecallConfig {
    /// Resolve from defaults, an optional JSON file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut value =
            serde_json::to_value(RecallConfig::default()).expect("default config serializes");

        if let Some(path) = path {
            if path.exists() {
                let text = fs::read_to_string(path)?;
                let file_value: Value = serde_json::from_str(&text)?;
                telemetry::deep_merge(&mut value, file_value);
            }
        }

        apply_env_overrides(&mut value);

        let config: RecallConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config document from a JSON string (defaults applied for
    /// absent keys; no environment pass).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut value =
            serde_json::to_value(RecallConfig::default()).expect("default config serializes");
        telemetry::deep_merge(&mut value, serde_json::from_str(json)?);
        let config: RecallConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.version.as_str() {
            "1" | "1.0" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unsupported config version: {other}"
                )))
            }
        }
        self.telemetry.validate()?;
        self.retrieval.validate()?;
        self.embedding.validate()?;
        Ok(())
    }

    /// Dotted lookup into the resolved document, e.g.
    /// `lookup("telemetry.batch_size")`.
    pub fn lookup(&self, dotted_key: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for part in dotted_key.split('.') {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    /// Feature gate: `is_enabled("telemetry")` reads
    /// `telemetry.enabled`, and anything absent is disabled.
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.lookup(&format!("{feature}.enabled"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Typed collector configuration.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            enabled: self.telemetry.enabled,
            log_path: self.telemetry.log_path.clone(),
            batch_size: self.telemetry.batch_size,
            flush_interval_sec: self.telemetry.flush_interval_sec,
            pii_redaction: self.telemetry.pii_redaction,
        }
    }

    /// Typed engine configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_mode: SearchMode::parse(&self.retrieval.default_mode)
                .unwrap_or(SearchMode::Auto),
            default_limit: self.retrieval.default_limit,
            temporal_half_life_days: self.retrieval.temporal_half_life_days,
            bm25: Bm25Params {
                k1: self.retrieval.bm25.k1,
                b: self.retrieval.bm25.b,
            },
            hybrid: HybridWeights {
                bm25_weight: self.retrieval.hybrid.bm25_weight,
                dense_weight: self.retrieval.hybrid.dense_weight,
            },
            bm25_temporal: Bm25TemporalWeights {
                bm25_weight: self.retrieval.bm25_temporal.bm25_weight,
                temporal_weight: self.retrieval.bm25_temporal.temporal_weight,
            },
        }
    }

    /// Typed embedder configuration.
    pub fn embedder_config(&self) -> EmbedderConfig {
        let defaults = EmbedderConfig::default();
        EmbedderConfig {
            mode: self.embedding.mode.clone(),
            model_name: self.embedding.model_name.clone(),
            model_path: self
                .embedding
                .model_path
                .as_ref()
                .map(Into::into)
                .unwrap_or(defaults.model_path),
            tokenizer_path: self.embedding.tokenizer_path.as_ref().map(Into::into),
            dim: self.embedding.dim,
            max_sequence_length: self.embedding.max_sequence_length,
            cache_size: self.embedding.cache_size,
        }
    }

    /// Build the secret redactor from the configured catalog, applying
    /// the entropy settings and optional extra whitelist on top.
    ///
    /// Returns `None` (with a warning) when no catalog is configured or
    /// it cannot be loaded — callers proceed without redaction.
    pub fn build_redactor(&self) -> Option<SecretRedactor> {
        let patterns_path = self.redaction.patterns_path.as_ref()?;
        let text = match fs::read_to_string(patterns_path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %patterns_path, %err, "secret pattern catalog unreadable, redaction disabled");
                return None;
            }
        };
        let mut doc: CatalogDocument = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %patterns_path, %err, "secret pattern catalog malformed, redaction disabled");
                return None;
            }
        };

        if let Some(whitelist_path) = &self.redaction.whitelist_path {
            match fs::read_to_string(whitelist_path)
                .map_err(|e| e.to_string())
                .and_then(|t| {
                    serde_json::from_str::<CatalogDocument>(&t).map_err(|e| e.to_string())
                }) {
                Ok(mut extra) => doc.whitelist.append(&mut extra.whitelist),
                Err(err) => {
                    warn!(path = %whitelist_path, %err, "extra whitelist unreadable, ignoring");
                }
            }
        }

        doc.entropy.enabled = self.redaction.entropy.enabled;
        doc.entropy.min_length = self.redaction.entropy.min_length;
        doc.entropy.threshold = self.redaction.entropy.threshold;

        Some(SecretRedactor::new(PatternCatalog::compile(doc)))
    }
}

/// Known environment overrides, mapped onto dotted keys.
const ENV_OVERRIDES: &[(&str, &str, EnvKind)] = &[
    ("RECALL_TELEMETRY_ENABLED", "telemetry.enabled", EnvKind::Bool),
    ("RECALL_TELEMETRY_LOG_PATH", "telemetry.log_path", EnvKind::Str),
    ("RECALL_TELEMETRY_BATCH_SIZE", "telemetry.batch_size", EnvKind::Int),
    (
        "RECALL_TELEMETRY_FLUSH_INTERVAL_SEC",
        "telemetry.flush_interval_sec",
        EnvKind::Float,
    ),
    (
        "RECALL_TELEMETRY_PII_REDACTION",
        "telemetry.pii_redaction",
        EnvKind::Bool,
    ),
    (
        "RECALL_RETRIEVAL_DEFAULT_MODE",
        "retrieval.default_mode",
        EnvKind::Str,
    ),
    (
        "RECALL_RETRIEVAL_DEFAULT_LIMIT",
        "retrieval.default_limit",
        EnvKind::Int,
    ),
    (
        "RECALL_RETRIEVAL_TEMPORAL_HALF_LIFE_DAYS",
        "retrieval.temporal_half_life_days",
        EnvKind::Float,
    ),
    ("RECALL_EMBEDDING_MODE", "embedding.mode", EnvKind::Str),
    ("RECALL_EMBEDDING_MODEL_PATH", "embedding.model_path", EnvKind::Str),
    (
        "RECALL_EMBEDDING_TOKENIZER_PATH",
        "embedding.tokenizer_path",
        EnvKind::Str,
    ),
    ("RECALL_EMBEDDING_DIM", "embedding.dim", EnvKind::Int),
    (
        "RECALL_REDACTION_ENTROPY_ENABLED",
        "redaction.entropy.enabled",
        EnvKind::Bool,
    ),
    (
        "RECALL_REDACTION_PATTERNS_PATH",
        "redaction.patterns_path",
        EnvKind::Str,
    ),
    (
        "RECALL_REDACTION_WHITELIST_PATH",
        "redaction.whitelist_path",
        EnvKind::Str,
    ),
];

#[derive(Clone, Copy)]
enum EnvKind {
    Bool,
    Int,
    Float,
    Str,
}

fn apply_env_overrides(value: &mut Value) {
    for (var, dotted, kind) in ENV_OVERRIDES {
        let Ok(raw) = env::var(var) else { continue };
        let parsed = match kind {
            EnvKind::Bool => Value::Bool(parse_bool(&raw)),
            EnvKind::Int => match raw.parse::<u64>() {
                Ok(n) => Value::from(n),
                Err(_) => {
                    warn!(var, raw, "ignoring non-integer environment override");
                    continue;
                }
            },
            EnvKind::Float => match raw.parse::<f64>() {
                Ok(n) => Value::from(n),
                Err(_) => {
                    warn!(var, raw, "ignoring non-numeric environment override");
                    continue;
                }
            },
            EnvKind::Str => Value::String(raw),
        };
        set_dotted(value, dotted, parsed);
    }
}

/// `true|1|yes` (case-insensitive) are true; everything else is false.
fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn set_dotted(root: &mut Value, dotted: &str, new_value: Value) {
    let mut current = root;
    let parts: Vec<&str> = dotted.split('.').collect();
    for part in &parts[..parts.len() - 1] {
        let Value::Object(map) = current else { return };
        let slot = map
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !slot.is_object() {
            *slot = Value::Object(Default::default());
        }
        current = slot;
    }
    if let Value::Object(map) = current {
        map.insert(parts[parts.len() - 1].to_string(), new_value);
    }
}

fn default_version() -> String {
    "1.0".to_string()
}
fn true_value() -> bool {
    true
}
fn default_log_path() -> String {
    ".claude/context/sessions/recall_analytics.jsonl".to_string()
}
fn default_batch_size() -> usize {
    10
}
fn default_flush_interval() -> f64 {
    5.0
}
fn default_k1() -> f64 {
    1.5
}
fn default_b() -> f64 {
    0.75
}
fn default_half() -> f64 {
    0.5
}
fn default_bm25_temporal_bm25() -> f64 {
    0.7
}
fn default_bm25_temporal_temporal() -> f64 {
    0.3
}
fn default_mode_name() -> String {
    "auto".to_string()
}
fn default_limit() -> usize {
    5
}
fn default_half_life() -> f64 {
    30.0
}
fn default_embed_mode() -> String {
    "model".to_string()
}
fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_dim() -> usize {
    384
}
fn default_max_seq() -> usize {
    256
}
fn default_cache_size() -> usize {
    128
}
fn default_entropy_min_length() -> usize {
    16
}
fn default_entropy_threshold() -> f64 {
    4.5
}
