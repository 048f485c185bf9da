//! Snapshot persistence.
//!
//! # Responsibilities
//! - Load the persisted identifier → digest mapping at startup
//! - Rewrite the whole snapshot after each completed computation
//! - Serialize concurrent writers (single-writer file assumption)
//!
//! # Design Decisions
//! - Missing file at startup means empty store, not an error
//! - Malformed file at startup is logged and treated as empty
//! - Writes go to a sibling temp file, then rename into place

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

/// Error writing a snapshot to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Load a snapshot from disk.
///
/// A missing file yields an empty map. A file that exists but cannot be
/// read or parsed is logged and also yields an empty map: startup never
/// fails because of a bad snapshot.
pub fn load_snapshot(path: &Path) -> HashMap<u64, String> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No snapshot found, starting empty");
            return HashMap::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Snapshot unreadable, starting empty");
            return HashMap::new();
        }
    };

    match serde_json::from_slice::<HashMap<u64, String>>(&raw) {
        Ok(entries) => {
            tracing::info!(path = %path.display(), entries = entries.len(), "Snapshot loaded");
            entries
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Snapshot malformed, starting empty");
            HashMap::new()
        }
    }
}

/// Serialized writer for the snapshot file.
///
/// Overlapping pipeline completions persist through the same instance; the
/// internal mutex guarantees at most one write is in flight, so the file is
/// never interleaved or half-written by two tasks.
pub struct SnapshotPersister {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the snapshot file wholesale.
    pub async fn persist(&self, snapshot: &HashMap<u64, String>) -> Result<(), PersistError> {
        let encoded = serde_json::to_vec(snapshot)?;

        let _guard = self.write_lock.lock().await;
        let tmp = self.path.with_extension("tmp.new");
        tokio::fs::write(&tmp, &encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), entries = snapshot.len(), "Snapshot persisted");
        Ok(())
    }
}
