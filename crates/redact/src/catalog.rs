//! Pattern catalog loading and compilation.
//!
//! The catalog is an externally owned JSON document listing detection
//! patterns, whitelist patterns, and entropy-scan settings. A missing or
//! unparsable catalog fails construction; a single bad rule inside an
//! otherwise valid catalog is skipped with a warning so one typo cannot
//! disable redaction wholesale.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::RedactError;

/// Confidence level attached to a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

/// Raw catalog document as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogDocument {
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
    #[serde(default)]
    pub whitelist: Vec<WhitelistSpec>,
    #[serde(default)]
    pub entropy: EntropyConfig,
}

/// One detection rule as written in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub regex: String,
    #[serde(default = "default_confidence")]
    pub confidence: Confidence,
    #[serde(default = "default_category")]
    pub category: String,
}

/// One whitelist rule; anything it matches is a known false positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistSpec {
    pub name: String,
    pub regex: String,
    #[serde(default)]
    pub description: String,
}

/// Entropy-scan settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntropyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: default_min_length(),
            threshold: default_threshold(),
        }
    }
}

fn default_confidence() -> Confidence {
    Confidence::Medium
}

fn default_category() -> String {
    "unknown".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_length() -> usize {
    16
}

fn default_threshold() -> f64 {
    4.5
}

/// A detection rule with its regex compiled.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    pub name: String,
    pub regex: Regex,
    pub confidence: Confidence,
    pub category: String,
}

/// A whitelist rule with its regex compiled.
#[derive(Debug, Clone)]
pub(crate) struct CompiledWhitelist {
    pub regex: Regex,
}

/// Compiled catalog ready for scanning.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    pub(crate) patterns: Vec<CompiledPattern>,
    pub(crate) whitelist: Vec<CompiledWhitelist>,
    pub(crate) entropy: EntropyConfig,
}

impl PatternCatalog {
    /// Compile a catalog document. Individually invalid rules are skipped
    /// with a warning; an empty pattern list is permitted (entropy scanning
    /// still applies).
    pub fn compile(doc: CatalogDocument) -> Self {
        let mut patterns = Vec::with_capacity(doc.patterns.len());
        for spec in doc.patterns {
            match Regex::new(&spec.regex) {
                Ok(regex) => patterns.push(CompiledPattern {
                    name: spec.name,
                    regex,
                    confidence: spec.confidence,
                    category: spec.category,
                }),
                Err(err) => warn!(pattern = %spec.name, %err, "skipping invalid secret pattern"),
            }
        }

        let mut whitelist = Vec::with_capacity(doc.whitelist.len());
        for spec in doc.whitelist {
            match Regex::new(&spec.regex) {
                Ok(regex) => whitelist.push(CompiledWhitelist { regex }),
                Err(err) => warn!(pattern = %spec.name, %err, "skipping invalid whitelist pattern"),
            }
        }

        Self {
            patterns,
            whitelist,
            entropy: doc.entropy,
        }
    }

    /// Parse and compile a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self, RedactError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        Ok(Self::compile(doc))
    }

    /// Load and compile a catalog from a JSON file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RedactError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| RedactError::CatalogMissing(path.display().to_string(), err))?;
        Self::from_json(&text)
    }

    /// True when `candidate` matches any whitelist rule.
    pub(crate) fn is_whitelisted(&self, candidate: &str) -> bool {
        self.whitelist.iter().any(|w| w.regex.is_match(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "patterns": [
            {"name": "Test Key", "regex": "tk-[a-z0-9]{8}", "confidence": "high", "category": "api_key"}
        ],
        "whitelist": [
            {"name": "Placeholder", "regex": "^tk-00000000$"}
        ],
        "entropy": {"enabled": true, "min_length": 16, "threshold": 4.5}
    }"#;

    #[test]
    fn catalog_compiles_from_json() {
        let catalog = PatternCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.patterns.len(), 1);
        assert_eq!(catalog.whitelist.len(), 1);
        assert!(catalog.entropy.enabled);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(PatternCatalog::from_json("not json").is_err());
    }

    #[test]
    fn invalid_rule_is_skipped_not_fatal() {
        let json = r#"{
            "patterns": [
                {"name": "Broken", "regex": "([unclosed"},
                {"name": "Good", "regex": "ok-[0-9]+"}
            ]
        }"#;
        let catalog = PatternCatalog::from_json(json).unwrap();
        assert_eq!(catalog.patterns.len(), 1);
        assert_eq!(catalog.patterns[0].name, "Good");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = PatternCatalog::from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("not/here.json"));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let json = r#"{"patterns": [{"name": "Bare", "regex": "x{20}"}]}"#;
        let catalog = PatternCatalog::from_json(json).unwrap();
        assert_eq!(catalog.patterns[0].confidence, Confidence::Medium);
        assert_eq!(catalog.patterns[0].category, "unknown");
        assert_eq!(catalog.entropy, EntropyConfig::default());
    }

    #[test]
    fn whitelist_matching() {
        let catalog = PatternCatalog::from_json(CATALOG).unwrap();
        assert!(catalog.is_whitelisted("tk-00000000"));
        assert!(!catalog.is_whitelisted("tk-abc12345"));
    }
}
