//! Dense sidecar codec.
//!
//! The matrix lives next to the index document as a compact binary blob:
//! a fixed header (`RCLV` magic, format version, dimension, row count)
//! followed by `count × dim` little-endian f32 values. The header exists so
//! readers can reject a mismatched shape without touching the payload.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::CorpusError;

const MAGIC: &[u8; 4] = b"RCLV";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 2 + 4;

/// An N×d matrix of unit-norm rows, stored row-contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    pub dim: usize,
    pub count: usize,
    values: Vec<f32>,
}

impl DenseMatrix {
    /// Assemble a matrix from per-record rows. Every row must have the
    /// same length.
    pub fn from_rows(rows: &[Vec<f32>], dim: usize) -> Result<Self, CorpusError> {
        let mut values = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(CorpusError::Sidecar(format!(
                    "row {i} has {} values, expected {dim}",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            dim,
            count: rows.len(),
            values,
        })
    }

    /// Row `i`, or `None` past the end.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.count {
            return None;
        }
        let start = i * self.dim;
        Some(&self.values[start..start + self.dim])
    }

    /// Serialize to the sidecar wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.values.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dim as u16).to_le_bytes());
        out.extend_from_slice(&(self.count as u32).to_le_bytes());
        for value in &self.values {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Parse the sidecar wire format, rejecting bad magic, unknown
    /// versions, and truncated payloads.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorpusError> {
        if bytes.len() < HEADER_LEN {
            return Err(CorpusError::Sidecar("header truncated".into()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(CorpusError::Sidecar("bad magic".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(CorpusError::Sidecar(format!(
                "unsupported format version {version}"
            )));
        }
        let dim = u16::from_le_bytes([bytes[6], bytes[7]]) as usize;
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

        let expected = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| CorpusError::Sidecar("shape overflow".into()))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(CorpusError::Sidecar(format!(
                "payload is {} bytes, shape {count}x{dim} needs {expected}",
                payload.len()
            )));
        }

        let values = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dim, count, values })
    }

    /// Write atomically: stage to a temp path, fsync, rename over the live
    /// path.
    pub fn write_to(&self, path: &Path) -> Result<(), CorpusError> {
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&self.to_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a sidecar from disk.
    pub fn read_from(path: &Path) -> Result<Self, CorpusError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
