//! Durable session corpus: typed records, lexical statistics, and the
//! dense sidecar, persisted as one JSON document readers can snapshot
//! atomically.
//!
//! The store is deliberately boring. One writer stages and renames; any
//! number of readers take whole-corpus snapshots and tolerate staleness.
//! Derived state (BM25 statistics, the dense matrix) is rebuilt rather
//! than patched, so a reader can always trust that what it loaded is
//! internally consistent — and when it isn't (a sidecar whose row count
//! disagrees with the session count), the alignment check says so before
//! any scoring happens.

mod dense_file;
mod error;
mod store;
mod types;

pub use crate::dense_file::DenseMatrix;
pub use crate::error::CorpusError;
pub use crate::store::{CorpusStore, DEFAULT_SIDECAR_NAME};
pub use crate::types::{
    Bm25Stats, CorpusIndex, DenseMeta, ListFilter, SessionRecord, CORPUS_SCHEMA_VERSION,
};
