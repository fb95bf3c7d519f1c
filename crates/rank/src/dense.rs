//! Dense cosine scoring over the sidecar matrix.

use corpus::DenseMatrix;
use thiserror::Error;

/// Reasons the dense scorer refuses to produce scores. Callers degrade to
/// lexical scoring instead of failing the request.
#[derive(Debug, Error)]
pub enum DenseScoreError {
    /// The matrix row count disagrees with the corpus row count.
    #[error("dense matrix has {actual} rows, corpus has {expected}")]
    RowCountMismatch { actual: usize, expected: usize },
    /// The query vector width disagrees with the matrix dimension.
    #[error("query vector has {actual} values, matrix dimension is {expected}")]
    DimensionMismatch { actual: usize, expected: usize },
    /// A subset slot points past the end of the matrix.
    #[error("embedding slot {slot} out of range for {rows} rows")]
    SlotOutOfRange { slot: usize, rows: usize },
}

/// Cosine similarity of `query` against the matrix rows named by `slots`,
/// linearly mapped from [−1, 1] to [0, 1].
///
/// All vectors are unit-norm by construction, so cosine is a plain dot
/// product. `expected_rows` is the corpus session count; a mismatch is a
/// refusal, not a partial answer.
pub fn cosine_scores(
    matrix: &DenseMatrix,
    query: &[f32],
    slots: &[usize],
    expected_rows: usize,
) -> Result<Vec<f64>, DenseScoreError> {
    if matrix.count != expected_rows {
        return Err(DenseScoreError::RowCountMismatch {
            actual: matrix.count,
            expected: expected_rows,
        });
    }
    if query.len() != matrix.dim {
        return Err(DenseScoreError::DimensionMismatch {
            actual: query.len(),
            expected: matrix.dim,
        });
    }

    let mut scores = Vec::with_capacity(slots.len());
    for &slot in slots {
        let row = matrix.row(slot).ok_or(DenseScoreError::SlotOutOfRange {
            slot,
            rows: matrix.count,
        })?;
        let dot: f32 = row.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
        let mapped = (f64::from(dot) + 1.0) / 2.0;
        scores.push(mapped.clamp(0.0, 1.0));
    }
    Ok(scores)
}
