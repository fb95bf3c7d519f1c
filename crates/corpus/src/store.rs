//! Durable corpus store.
//!
//! The whole corpus is one JSON document plus a binary dense sidecar.
//! Writers stage a new document to a temp path, fsync, and atomically
//! rename over the live path; readers re-read on mtime change or on
//! explicit [`reload`](CorpusStore::reload), and never observe a
//! half-written state.

use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::debug;

use crate::dense_file::DenseMatrix;
use crate::{Bm25Stats, CorpusError, CorpusIndex, DenseMeta, ListFilter, SessionRecord};

/// Default sidecar filename next to the index document.
pub const DEFAULT_SIDECAR_NAME: &str = "embeddings.bin";

struct CachedSnapshot {
    modified: SystemTime,
    index: CorpusIndex,
}

/// Handle to the on-disk corpus. Many readers, one write-and-rename
/// writer; the handle itself is cheap to share behind a reference.
pub struct CorpusStore {
    index_path: PathBuf,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl CorpusStore {
    pub fn new<P: Into<PathBuf>>(index_path: P) -> Self {
        Self {
            index_path: index_path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Atomic read of the whole corpus. A missing file is an empty corpus;
    /// an unparsable file is [`CorpusError::Malformed`].
    pub fn load_snapshot(&self) -> Result<CorpusIndex, CorpusError> {
        if !self.index_path.exists() {
            return Ok(CorpusIndex::default());
        }

        let modified = fs::metadata(&self.index_path)?.modified()?;
        {
            let cache = self.cache.lock().expect("corpus cache lock");
            if let Some(cached) = cache.as_ref() {
                if cached.modified == modified {
                    return Ok(cached.index.clone());
                }
            }
        }

        let text = fs::read_to_string(&self.index_path)?;
        let index: CorpusIndex = serde_json::from_str(&text)?;
        debug!(sessions = index.sessions.len(), "corpus snapshot loaded");

        let mut cache = self.cache.lock().expect("corpus cache lock");
        *cache = Some(CachedSnapshot {
            modified,
            index: index.clone(),
        });
        Ok(index)
    }

    /// Drop the cached snapshot so the next read hits the disk.
    pub fn reload(&self) {
        *self.cache.lock().expect("corpus cache lock") = None;
    }

    /// Upsert a session record by id.
    ///
    /// Recomputes the token stream when the caller did not provide one,
    /// rebuilds the BM25 statistics from scratch, marks the dense side
    /// stale (the record loses its embedding slot, so alignment checks
    /// degrade dense scoring until embeddings are re-attached), and writes
    /// the new document atomically.
    pub fn ingest(&self, mut record: SessionRecord) -> Result<CorpusIndex, CorpusError> {
        if record.token_stream.is_empty() {
            record.token_stream = record.build_token_stream();
        }
        dedup_in_place(&mut record.topics);
        dedup_in_place(&mut record.files_modified);
        dedup_in_place(&mut record.issue_refs);
        record.embedding_slot = None;
        record.needs_embedding = true;
        record.has_embedding = false;

        let mut index = self.load_snapshot()?;
        index.sessions.retain(|s| s.id != record.id);
        index.sessions.push(record);
        sort_newest_first(&mut index.sessions);

        index.bm25 = Some(Bm25Stats::rebuild(&index.sessions));
        index.last_updated = Some(Utc::now());

        self.save(&index)?;
        Ok(index)
    }

    /// Filtered listing in stable `captured_at`-descending order.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<SessionRecord>, CorpusError> {
        let index = self.load_snapshot()?;
        Ok(index
            .sessions
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    /// Attach a freshly generated embedding matrix.
    ///
    /// Row `i` must correspond to session `i` in stored order. Writes the
    /// sidecar, assigns every record its slot, records the dense metadata,
    /// and persists the index.
    pub fn attach_embeddings(
        &self,
        rows: &[Vec<f32>],
        model: &str,
        dim: usize,
    ) -> Result<(), CorpusError> {
        let mut index = self.load_snapshot()?;
        if rows.len() != index.sessions.len() {
            return Err(CorpusError::Sidecar(format!(
                "{} embedding rows for {} sessions",
                rows.len(),
                index.sessions.len()
            )));
        }

        let matrix = DenseMatrix::from_rows(rows, dim)?;
        let sidecar = self.sidecar_path(DEFAULT_SIDECAR_NAME);
        matrix.write_to(&sidecar)?;

        for (i, session) in index.sessions.iter_mut().enumerate() {
            session.embedding_slot = Some(i);
            session.has_embedding = true;
            session.needs_embedding = false;
        }
        index.dense = Some(DenseMeta {
            model: model.to_string(),
            dim,
            count: rows.len(),
            path: DEFAULT_SIDECAR_NAME.to_string(),
        });
        index.last_updated = Some(Utc::now());

        self.save(&index)
    }

    /// Load the dense sidecar advertised by `index`, verifying the stored
    /// shape against the metadata.
    pub fn load_matrix(&self, index: &CorpusIndex) -> Result<DenseMatrix, CorpusError> {
        let meta = index
            .dense
            .as_ref()
            .ok_or_else(|| CorpusError::Sidecar("no dense metadata".into()))?;
        let matrix = DenseMatrix::read_from(&self.sidecar_path(&meta.path))?;
        if matrix.dim != meta.dim || matrix.count != meta.count {
            return Err(CorpusError::Sidecar(format!(
                "sidecar shape {}x{} does not match metadata {}x{}",
                matrix.count, matrix.dim, meta.count, meta.dim
            )));
        }
        Ok(matrix)
    }

    /// Stage, fsync, rename. The cache picks up the new mtime on the next
    /// read.
    pub fn save(&self, index: &CorpusIndex) -> Result<(), CorpusError> {
        if let Some(parent) = self.index_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.index_path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(index)?.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.index_path)?;
        self.reload();
        Ok(())
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        match self.index_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        }
    }
}

fn sort_newest_first(sessions: &mut [SessionRecord]) {
    sessions.sort_by(|a, b| {
        b.captured_at
            .cmp(&a.captured_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn dedup_in_place(values: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::with_capacity(values.len());
    values.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}
