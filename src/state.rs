//! Local processed-state table.
//!
//! One JSON object per line, one line per `ProcessedRecord`. The file is only
//! ever appended to; every append is flushed and synced before it returns, so
//! a crash loses at most the record being written. A torn trailing line from
//! such a crash is skipped on the next load.
//!
//! Only `Success` records mark a url as processed. A url whose rewrite failed
//! stays eligible, and a later run may append its `Success` record next to the
//! failed one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::record::{ProcessedRecord, RecordStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Urls rewritten successfully for one platform.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet(HashSet<String>);

impl ProcessedSet {
    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    pub(crate) fn insert(&mut self, url: String) -> bool {
        self.0.insert(url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct StateStore {
    path: PathBuf,
    file: File,
    records: Vec<ProcessedRecord>,
    /// (url, status) of every stored record.
    keys: HashSet<(String, RecordStatus)>,
    processed: ProcessedSet,
}

impl StateStore {
    /// Load the table at `path` (created if missing, parent dirs included).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io { path: path.clone(), source };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let raw = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };

        let mut records = Vec::new();
        let mut keys = HashSet::new();
        let mut processed = ProcessedSet::default();
        let torn = !raw.is_empty() && !raw.ends_with('\n');
        for (n, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProcessedRecord>(line) {
                Ok(rec) => {
                    if processed.contains(rec.url()) || !keys.insert((rec.url().to_string(), rec.status)) {
                        debug!(target: "state", line = n + 1, url = rec.url(), "duplicate record in state file");
                        continue;
                    }
                    if rec.status == RecordStatus::Success {
                        processed.insert(rec.url().to_string());
                    }
                    records.push(rec);
                }
                Err(e) => {
                    warn!(target: "state", path = %path.display(), line = n + 1, error = %e, "skipping unreadable state line");
                }
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        // Terminate a torn last line so the next record starts on its own line.
        if torn {
            file.write_all(b"\n").await.map_err(io_err)?;
            file.sync_data().await.map_err(io_err)?;
        }

        debug!(target: "state", path = %path.display(), records = records.len(), "state loaded");
        Ok(Self { path, file, records, keys, processed })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.processed.contains(url)
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Every record in file order, failed attempts included.
    pub fn records(&self) -> &[ProcessedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Durably append `record`. Returns `false` (and writes nothing) when the
    /// url is already processed, or when a record with the same url and status
    /// is already stored (a repeated failure).
    pub async fn append(&mut self, record: ProcessedRecord) -> Result<bool, StoreError> {
        if self.processed.contains(record.url()) {
            warn!(target: "state", url = record.url(), "refusing to append already processed url");
            return Ok(false);
        }
        let key = (record.url().to_string(), record.status);
        if self.keys.contains(&key) {
            debug!(target: "state", url = record.url(), status = record.status.as_str(), "record already stored");
            return Ok(false);
        }

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let path = &self.path;
        let io_err = |source| StoreError::Io { path: path.clone(), source };
        self.file.write_all(&line).await.map_err(io_err)?;
        self.file.flush().await.map_err(io_err)?;
        self.file.sync_data().await.map_err(io_err)?;

        metrics::counter!("store_appends_total").increment(1);
        if record.status == RecordStatus::Success {
            self.processed.insert(record.url().to_string());
        }
        self.keys.insert(key);
        self.records.push(record);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_set_tracks_membership() {
        let mut s = ProcessedSet::default();
        assert!(s.is_empty());
        assert!(s.insert("https://a".into()));
        assert!(!s.insert("https://a".into()));
        assert!(s.contains("https://a"));
        assert!(!s.contains("https://b"));
        assert_eq!(s.len(), 1);
    }
}
