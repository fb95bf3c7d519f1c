//! JSONL log I/O.
//!
//! One JSON object per line, UTF-8, append-only. Appends hold an exclusive
//! file lock for the duration of one write so concurrent processes can
//! share a log file without interleaving inside a record; readers skip
//! malformed lines rather than failing the scan.

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::warn;

use crate::TelemetryError;

/// Direct writer: every append is one locked write.
pub struct JsonlWriter {
    path: PathBuf,
}

impl JsonlWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record under an exclusive lock.
    pub fn append(&self, record: &Value) -> Result<(), TelemetryError> {
        self.append_batch(std::slice::from_ref(record))
    }

    /// Append several records under a single exclusive lock.
    pub fn append_batch(&self, records: &[Value]) -> Result<(), TelemetryError> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = (|| -> Result<(), TelemetryError> {
            let mut buf = String::new();
            for record in records {
                buf.push_str(&serde_json::to_string(record)?);
                buf.push('\n');
            }
            file.write_all(buf.as_bytes())?;
            file.flush()?;
            Ok(())
        })();
        let _ = fs2::FileExt::unlock(&file);
        result
    }
}

/// Buffered writer: accumulates records and appends when the batch fills
/// or the flush interval elapses. Buffered records are lost on a crash —
/// at-most-once is the contract.
pub struct BatchedJsonlWriter {
    writer: JsonlWriter,
    batch_size: usize,
    flush_interval_secs: f64,
    state: Mutex<BufferState>,
}

struct BufferState {
    buffer: Vec<Value>,
    last_flush: Instant,
}

impl BatchedJsonlWriter {
    pub fn new<P: Into<PathBuf>>(path: P, batch_size: usize, flush_interval_secs: f64) -> Self {
        Self {
            writer: JsonlWriter::new(path),
            batch_size: batch_size.max(1),
            flush_interval_secs,
            state: Mutex::new(BufferState {
                buffer: Vec::new(),
                last_flush: Instant::now(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Buffer a record; triggers a flush when either threshold trips.
    pub fn append(&self, record: Value) -> Result<(), TelemetryError> {
        let should_flush = {
            let mut state = self.state.lock().expect("jsonl buffer lock");
            state.buffer.push(record);
            state.buffer.len() >= self.batch_size
                || (self.flush_interval_secs > 0.0
                    && state.last_flush.elapsed().as_secs_f64() > self.flush_interval_secs)
        };
        if should_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Push the buffer to disk. A failed write is retried once before the
    /// records are put back for the next attempt.
    pub fn flush(&self) -> Result<(), TelemetryError> {
        let pending = {
            let mut state = self.state.lock().expect("jsonl buffer lock");
            if state.buffer.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut state.buffer)
        };

        let result = self
            .writer
            .append_batch(&pending)
            .or_else(|first_err| {
                warn!(%first_err, "telemetry flush failed, retrying once");
                self.writer.append_batch(&pending)
            });

        let mut state = self.state.lock().expect("jsonl buffer lock");
        match result {
            Ok(()) => {
                state.last_flush = Instant::now();
                Ok(())
            }
            Err(err) => {
                // Put the records back so a later flush can pick them up.
                let mut restored = pending;
                restored.append(&mut state.buffer);
                state.buffer = restored;
                Err(err)
            }
        }
    }

    /// Number of buffered, unflushed records.
    pub fn pending(&self) -> usize {
        self.state.lock().expect("jsonl buffer lock").buffer.len()
    }
}

impl Drop for BatchedJsonlWriter {
    fn drop(&mut self) {
        // Best effort; buffered events may be lost on abnormal exit.
        let _ = self.flush();
    }
}

/// Reader for JSONL logs: tolerant of malformed lines, with optional
/// day-window and predicate filtering.
pub struct JsonlReader;

impl JsonlReader {
    /// Read a log, skipping lines that fail to parse. `days` keeps only
    /// entries whose `timestamp` falls within the last N days (entries
    /// with invalid timestamps are skipped when the window is active).
    pub fn read_log<F>(path: &Path, days: Option<i64>, mut filter: F) -> Vec<Value>
    where
        F: FnMut(&Value) -> bool,
    {
        if !path.exists() {
            return Vec::new();
        }
        let Ok(text) = fs::read_to_string(path) else {
            return Vec::new();
        };

        let cutoff = days.map(|d| Utc::now() - Duration::days(d));
        let mut entries = Vec::new();

        for (line_num, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(err) => {
                    warn!(path = %path.display(), line = line_num + 1, %err, "skipping malformed log line");
                    continue;
                }
            };

            if let Some(cutoff) = cutoff {
                let Some(stamp) = entry
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok())
                else {
                    continue;
                };
                if stamp < cutoff {
                    continue;
                }
            }

            if filter(&entry) {
                entries.push(entry);
            }
        }
        entries
    }

    /// Read every well-formed entry.
    pub fn read_all(path: &Path) -> Vec<Value> {
        Self::read_log(path, None, |_| true)
    }
}
