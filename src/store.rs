//! Append-only snapshot history, keyed by target identity.
//!
//! The store is the only persisted state the core owns. It is read once per
//! run to find the latest prior snapshot for a target and appended to after
//! the drift diff. Callers serialize runs per target; the store itself does
//! not make read-then-append atomic.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use thiserror::Error;
use tracing::debug;

use crate::snapshot::PermissionSnapshot;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read snapshot history")]
    Read(#[source] anyhow::Error),

    #[error("failed to append snapshot")]
    Append(#[source] anyhow::Error),
}

/// Target-keyed, append-only history of permission snapshots.
///
/// A failed or empty read is not fatal to a run: the drift detector treats
/// it as "no prior snapshot" and the pipeline continues.
pub trait SnapshotStore {
    /// Returns the most recent snapshot persisted for the target, if any.
    fn latest(&self, target: &str) -> Result<Option<PermissionSnapshot>, StoreError>;

    /// Appends a snapshot to the target's history. Never supersedes
    /// earlier entries.
    fn append(&mut self, snapshot: &PermissionSnapshot) -> Result<(), StoreError>;
}

/// File-backed store: one JSON file per snapshot under a single directory,
/// named `<target>_<timestamp>.json` so a lexical sort of a target's files
/// is also a chronological sort.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_prefix(target: &str) -> String {
        let sanitized: String = target
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        format!("{sanitized}_")
    }

    fn snapshot_path(&self, snapshot: &PermissionSnapshot) -> PathBuf {
        let stamp = snapshot.timestamp.format("%Y%m%d_%H%M%S");
        let prefix = Self::file_prefix(&snapshot.target);
        let path = self.dir.join(format!("{prefix}{stamp}.json"));
        if !path.exists() {
            return path;
        }
        // Same target and same second; a suffix keeps the earlier entry
        // (`_<n>` sorts after `.json`, so the lexical order stays
        // chronological-by-append).
        let mut n = 1u32;
        loop {
            let candidate = self.dir.join(format!("{prefix}{stamp}_{n}.json"));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    fn candidate_files(&self, target: &str) -> anyhow::Result<Vec<PathBuf>> {
        let prefix = Self::file_prefix(target);
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).context("read history directory")? {
            let entry = entry.context("read history entry")?;
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn latest(&self, target: &str) -> Result<Option<PermissionSnapshot>, StoreError> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let files = self.candidate_files(target).map_err(StoreError::Read)?;
        // Newest first; skip entries that no longer parse rather than
        // failing the whole read.
        for path in files.iter().rev() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("read snapshot {}", path.display()))
                .map_err(StoreError::Read)?;
            match serde_json::from_str::<PermissionSnapshot>(&data) {
                // Sanitization can map distinct targets onto the same file
                // prefix; the persisted target field is authoritative.
                Ok(snapshot) if snapshot.target == target => return Ok(Some(snapshot)),
                Ok(_) => {}
                Err(err) => {
                    debug!("Skipping unparseable snapshot {}: {err}", path.display());
                }
            }
        }
        Ok(None)
    }

    fn append(&mut self, snapshot: &PermissionSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .context("create history directory")
            .map_err(StoreError::Append)?;
        let path = self.snapshot_path(snapshot);
        let data = serde_json::to_string_pretty(snapshot)
            .context("serialize snapshot")
            .map_err(StoreError::Append)?;
        fs::write(&path, data)
            .with_context(|| format!("write snapshot {}", path.display()))
            .map_err(StoreError::Append)?;
        debug!("Persisted snapshot for {} at {}", snapshot.target, path.display());
        Ok(())
    }
}

/// In-memory store used in tests and by callers that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Vec<PermissionSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn latest(&self, target: &str) -> Result<Option<PermissionSnapshot>, StoreError> {
        Ok(self
            .entries
            .iter()
            .filter(|s| s.target == target)
            .max_by_key(|s| s.timestamp)
            .cloned())
    }

    fn append(&mut self, snapshot: &PermissionSnapshot) -> Result<(), StoreError> {
        self.entries.push(snapshot.clone());
        Ok(())
    }
}

/// Convenience for callers that keep history next to other audit output.
pub fn default_history_dir(base: &Path) -> PathBuf {
    base.join(".permission_history")
}
