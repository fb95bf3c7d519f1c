//! Embedder gateway: turn text into unit-norm vectors, or admit you can't.
//!
//! Retrieval quality is nice; retrieval *availability* is mandatory. The
//! gateway therefore never takes the search path down with it: callers ask
//! [`Embedder::is_available`] before planning a dense query, and any load
//! failure flips availability to a sticky false for the rest of the process
//! so one broken model file doesn't get retried on every search.
//!
//! Two modes:
//!
//! - **model** — a local ONNX sentence-embedding model (behind the `onnx`
//!   feature), lazily loaded on the first encode and cached for the process
//!   lifetime. Cold start is a one-time multi-second hit paid by the first
//!   semantic query, deliberately not by plain BM25 callers.
//! - **stub** — deterministic hash-derived vectors. Used by tests and as an
//!   explicit opt-in where model assets don't exist.
//!
//! Every vector leaving this crate is L2-normalized, which is what lets the
//! dense scorer compute cosine similarity as a plain dot product.
//!
//! ```
//! use semantic::{Embedder, EmbedderConfig};
//!
//! let embedder = Embedder::new(EmbedderConfig::stub(384));
//! assert!(embedder.is_available());
//! let v = embedder.encode("fix jwt refresh race").unwrap();
//! assert_eq!(v.len(), 384);
//! ```

mod config;
mod error;
mod normalize;
mod stub;

#[cfg(feature = "onnx")]
mod cache;
#[cfg(feature = "onnx")]
mod onnx;

pub use crate::config::EmbedderConfig;
pub use crate::error::SemanticError;

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::warn;

use crate::normalize::l2_normalize_in_place;
use crate::stub::make_stub_vector;

/// Lazily loading embedding gateway. One instance per process, owned by the
/// engine that uses it.
pub struct Embedder {
    cfg: EmbedderConfig,
    /// Set on the first unrecoverable load/inference failure; never cleared.
    failed: AtomicBool,
    /// Whether the failure warning has been emitted yet.
    warned: AtomicBool,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl Embedder {
    pub fn new(cfg: EmbedderConfig) -> Self {
        let cache = NonZeroUsize::new(cfg.cache_size).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            cfg,
            failed: AtomicBool::new(false),
            warned: AtomicBool::new(false),
            cache,
        }
    }

    /// Embedding dimension this gateway produces.
    pub fn dim(&self) -> usize {
        self.cfg.dim
    }

    /// Model label recorded in corpus metadata.
    pub fn model_name(&self) -> &str {
        &self.cfg.model_name
    }

    /// Whether encoding can be expected to succeed.
    ///
    /// Sticky-false after any load failure. In model mode this also probes
    /// for the asset files so a missing model is reported before anyone
    /// pays for a load attempt.
    pub fn is_available(&self) -> bool {
        if self.failed.load(Ordering::Relaxed) {
            return false;
        }
        match self.cfg.mode.as_str() {
            "stub" => true,
            _ => self.model_assets_present(),
        }
    }

    /// Encode `text` into a unit-norm vector of [`dim`](Self::dim) floats.
    pub fn encode(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        if self.failed.load(Ordering::Relaxed) {
            return Err(SemanticError::Unavailable(
                "embedding disabled after earlier failure".into(),
            ));
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().expect("embed cache lock").get(text) {
                return Ok(hit.clone());
            }
        }

        let mut vector = match self.cfg.mode.as_str() {
            "stub" => make_stub_vector(text, &self.cfg),
            _ => self.encode_with_model(text).inspect_err(|err| self.mark_failed(err))?,
        };
        l2_normalize_in_place(&mut vector);

        if let Some(cache) = &self.cache {
            cache
                .lock()
                .expect("embed cache lock")
                .put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    /// Encode a batch of texts, preserving order. Used when regenerating
    /// the corpus matrix; shares the cached model session.
    pub fn encode_batch<T: AsRef<str>>(&self, texts: &[T]) -> Result<Vec<Vec<f32>>, SemanticError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if self.failed.load(Ordering::Relaxed) {
            return Err(SemanticError::Unavailable(
                "embedding disabled after earlier failure".into(),
            ));
        }

        match self.cfg.mode.as_str() {
            "stub" => Ok(texts
                .iter()
                .map(|t| {
                    let mut v = make_stub_vector(t.as_ref(), &self.cfg);
                    l2_normalize_in_place(&mut v);
                    v
                })
                .collect()),
            _ => {
                let mut vectors = self
                    .encode_batch_with_model(texts)
                    .inspect_err(|err| self.mark_failed(err))?;
                for v in &mut vectors {
                    l2_normalize_in_place(v);
                }
                Ok(vectors)
            }
        }
    }

    fn mark_failed(&self, err: &SemanticError) {
        self.failed.store(true, Ordering::Relaxed);
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(%err, "embedding model unavailable, semantic scoring disabled for this process");
        }
    }

    #[cfg(feature = "onnx")]
    fn model_assets_present(&self) -> bool {
        self.cfg.model_path.exists() && self.cfg.resolved_tokenizer_path().exists()
    }

    #[cfg(not(feature = "onnx"))]
    fn model_assets_present(&self) -> bool {
        false
    }

    #[cfg(feature = "onnx")]
    fn encode_with_model(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let handle = cache::get_or_load(&self.cfg)?;
        let mut vectors = onnx::embed_texts(
            handle.as_ref(),
            &[text],
            self.cfg.max_sequence_length,
            self.cfg.dim,
        )?;
        vectors
            .pop()
            .ok_or_else(|| SemanticError::Inference("model produced no vector".into()))
    }

    #[cfg(not(feature = "onnx"))]
    fn encode_with_model(&self, _text: &str) -> Result<Vec<f32>, SemanticError> {
        Err(SemanticError::Unavailable(
            "built without the `onnx` feature".into(),
        ))
    }

    #[cfg(feature = "onnx")]
    fn encode_batch_with_model<T: AsRef<str>>(
        &self,
        texts: &[T],
    ) -> Result<Vec<Vec<f32>>, SemanticError> {
        let handle = cache::get_or_load(&self.cfg)?;
        let vectors = onnx::embed_texts(
            handle.as_ref(),
            texts,
            self.cfg.max_sequence_length,
            self.cfg.dim,
        )?;
        if vectors.len() != texts.len() {
            return Err(SemanticError::Inference(format!(
                "model produced {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    #[cfg(not(feature = "onnx"))]
    fn encode_batch_with_model<T: AsRef<str>>(
        &self,
        _texts: &[T],
    ) -> Result<Vec<Vec<f32>>, SemanticError> {
        Err(SemanticError::Unavailable(
            "built without the `onnx` feature".into(),
        ))
    }
}
