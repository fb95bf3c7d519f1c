//! Model loading and process-lifetime caching.
//!
//! A `Session` is not `Sync`, so loaded models cache per thread; the
//! runtime environment itself is built once per process behind a
//! one-shot initializer. The first semantic query on a thread pays the
//! load cost, every later one reuses the handle.

use once_cell::sync::OnceCell;
use onnxruntime::{environment::Environment, session::Session};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tokenizers::Tokenizer;

use crate::{EmbedderConfig, SemanticError};

static RUNTIME_ENV: OnceCell<Environment> = OnceCell::new();

thread_local! {
    static LOADED: RefCell<HashMap<PathBuf, Rc<LoadedModel>>> = RefCell::new(HashMap::new());
}

/// A tokenizer + session pair ready to serve encodes on this thread.
pub(crate) struct LoadedModel {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) session: RefCell<Session<'static>>,
}

/// Fetch the model for `cfg`, loading it on first touch. The cache keys
/// on the model path; the paired tokenizer always comes from the same
/// configuration.
pub(crate) fn get_or_load(cfg: &EmbedderConfig) -> Result<Rc<LoadedModel>, SemanticError> {
    LOADED.with(|cache| {
        if let Some(model) = cache.borrow().get(&cfg.model_path) {
            return Ok(model.clone());
        }
        let model = Rc::new(load_model(cfg)?);
        cache
            .borrow_mut()
            .insert(cfg.model_path.clone(), model.clone());
        Ok(model)
    })
}

fn load_model(cfg: &EmbedderConfig) -> Result<LoadedModel, SemanticError> {
    if !cfg.model_path.exists() {
        return Err(SemanticError::ModelNotFound(
            cfg.model_path.display().to_string(),
        ));
    }
    let tokenizer_path = cfg.resolved_tokenizer_path();
    if !tokenizer_path.exists() {
        return Err(SemanticError::TokenizerMissing(
            tokenizer_path.display().to_string(),
        ));
    }

    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| SemanticError::Inference(format!("tokenizer failed to load: {e}")))?;

    let environment = RUNTIME_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("recall")
            .build()
            .map_err(|e| SemanticError::Inference(format!("runtime init failed: {e}")))
    })?;
    let session = environment
        .new_session_builder()
        .map_err(|e| SemanticError::Inference(format!("session builder failed: {e}")))?
        .with_model_from_file(cfg.model_path.clone())
        .map_err(|e| SemanticError::Inference(format!("model failed to load: {e}")))?;

    Ok(LoadedModel {
        tokenizer,
        session: RefCell::new(session),
    })
}
