//! Local model inference over session text.
//!
//! Session summaries and synthesized queries are short by construction,
//! so the whole batch is tokenized into one fixed-width buffer and run
//! through the session in a single call. The output is collapsed by
//! shape: a model that emits pooled sentence vectors passes through,
//! while per-token hidden states are mean-pooled under the attention
//! mask so padding never leaks into the embedding.

use onnxruntime::ndarray::{Array, Array2};

use crate::cache::LoadedModel;
use crate::SemanticError;

/// A tokenized batch, padded to a common width. The mask is kept past
/// inference because pooling needs to know which positions are real.
struct PaddedBatch {
    ids: Array2<i64>,
    mask: Array2<i64>,
}

/// Embed `texts`, returning one `dim`-wide vector per input in order.
pub(crate) fn embed_texts<T: AsRef<str>>(
    handle: &LoadedModel,
    texts: &[T],
    max_sequence_length: usize,
    dim: usize,
) -> Result<Vec<Vec<f32>>, SemanticError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    if dim == 0 {
        return Err(SemanticError::InvalidConfig("dim must be >= 1".into()));
    }

    let batch = tokenize_batch(handle, texts, max_sequence_length)?;
    let flat = run_session(handle, &batch)?;
    collapse_outputs(&flat, &batch, dim)
}

/// Tokenize every text, cap each at `max_sequence_length` tokens, and
/// lay the ids and attention masks out as rectangular arrays padded
/// with zeros on the right.
fn tokenize_batch<T: AsRef<str>>(
    handle: &LoadedModel,
    texts: &[T],
    max_sequence_length: usize,
) -> Result<PaddedBatch, SemanticError> {
    let cap = max_sequence_length.max(1);
    let mut docs: Vec<(Vec<i64>, Vec<i64>)> = Vec::with_capacity(texts.len());
    let mut width = 1usize;

    for text in texts {
        let encoding = handle
            .tokenizer
            .encode(text.as_ref(), true)
            .map_err(|e| SemanticError::Inference(format!("tokenizer rejected input: {e}")))?;
        let take = encoding.get_ids().len().min(cap);
        let ids: Vec<i64> = encoding.get_ids()[..take]
            .iter()
            .map(|&t| i64::from(t))
            .collect();
        let mask: Vec<i64> = encoding.get_attention_mask()[..take]
            .iter()
            .map(|&m| i64::from(m))
            .collect();
        width = width.max(ids.len());
        docs.push((ids, mask));
    }

    let mut ids = Array2::<i64>::zeros((docs.len(), width));
    let mut mask = Array2::<i64>::zeros((docs.len(), width));
    for (row, (doc_ids, doc_mask)) in docs.iter().enumerate() {
        for (col, &id) in doc_ids.iter().enumerate() {
            ids[[row, col]] = id;
        }
        for (col, &m) in doc_mask.iter().enumerate() {
            mask[[row, col]] = m;
        }
    }

    Ok(PaddedBatch { ids, mask })
}

/// Feed the batch to the session, one tensor per input the model
/// declares, and return the first output flattened.
fn run_session(handle: &LoadedModel, batch: &PaddedBatch) -> Result<Vec<f32>, SemanticError> {
    let (rows, cols) = batch.ids.dim();
    let mut session = handle.session.borrow_mut();

    let declared: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
    if declared.is_empty() {
        return Err(SemanticError::Inference("model declares no inputs".into()));
    }

    let mut feeds = Vec::with_capacity(declared.len());
    for name in &declared {
        let tensor = match name.as_str() {
            "input_ids" => batch.ids.clone().into_dyn(),
            "attention_mask" => batch.mask.clone().into_dyn(),
            "token_type_ids" => Array::from_elem((rows, cols), 0_i64).into_dyn(),
            other => {
                return Err(SemanticError::Inference(format!(
                    "model declares an input this gateway cannot feed: '{other}'"
                )))
            }
        };
        feeds.push(tensor);
    }

    let outputs = session
        .run::<i64, f32, _>(feeds)
        .map_err(|e| SemanticError::Inference(format!("session run failed: {e}")))?;
    let first = outputs
        .into_iter()
        .next()
        .ok_or_else(|| SemanticError::Inference("model produced no outputs".into()))?;

    Ok(first.iter().copied().collect())
}

/// Collapse the flat model output to one `dim`-wide vector per row.
///
/// Two shapes are accepted: `rows × dim` (the model pooled already) and
/// `rows × cols × dim` (per-token hidden states, averaged over the
/// positions the attention mask marks as real). Anything else is a
/// shape error rather than a guess.
fn collapse_outputs(
    flat: &[f32],
    batch: &PaddedBatch,
    dim: usize,
) -> Result<Vec<Vec<f32>>, SemanticError> {
    let (rows, cols) = batch.ids.dim();

    if flat.len() == rows * dim {
        return Ok(flat.chunks(dim).map(<[f32]>::to_vec).collect());
    }

    if flat.len() == rows * cols * dim {
        let mut vectors = Vec::with_capacity(rows);
        for row in 0..rows {
            let mut pooled = vec![0.0f32; dim];
            let mut kept = 0.0f32;
            for col in 0..cols {
                if batch.mask[[row, col]] == 0 {
                    continue;
                }
                kept += 1.0;
                let start = (row * cols + col) * dim;
                for (acc, &val) in pooled.iter_mut().zip(&flat[start..start + dim]) {
                    *acc += val;
                }
            }
            if kept > 0.0 {
                for val in &mut pooled {
                    *val /= kept;
                }
            }
            vectors.push(pooled);
        }
        return Ok(vectors);
    }

    Err(SemanticError::Inference(format!(
        "cannot map {} output values onto {rows} inputs at dimension {dim}",
        flat.len()
    )))
}
