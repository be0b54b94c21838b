// src/poll/cursor.rs
//! Last-seen id per source, persisted as one JSON object.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
    last_seen: BTreeMap<String, u64>,
}

impl CursorStore {
    /// Missing file → empty cursor. An unreadable file is also treated as
    /// empty (items get fetched again, never skipped).
    pub async fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let last_seen = match fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => BTreeMap::new(),
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(target: "poll", path = %path.display(), error = %e, "cursor file unreadable, starting from scratch");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, last_seen })
    }

    pub fn get(&self, source: &str) -> u64 {
        self.last_seen.get(source).copied().unwrap_or(0)
    }

    /// Move the cursor forward; ids at or below the current one are ignored.
    pub fn advance(&mut self, source: &str, id: u64) -> bool {
        let cur = self.last_seen.entry(source.to_string()).or_insert(0);
        if id > *cur {
            *cur = id;
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> &BTreeMap<String, u64> {
        &self.last_seen
    }

    /// Write via temp file + rename so a crash leaves either the old or the new cursor.
    pub async fn save(&self) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec_pretty(&self.last_seen).map_err(io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(&body).await?;
        f.sync_all().await?;
        drop(f);
        fs::rename(&tmp, &self.path).await
    }
}
