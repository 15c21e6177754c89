//! Ordered record of finalized artifacts, oldest first.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A sealed, immutable file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedArtifact {
    /// Final path of the artifact.
    pub path: PathBuf,
    /// Size on disk in bytes (compressed size for archives).
    pub size: u64,
    /// Creation timestamp in nanoseconds since the UNIX epoch.
    pub created_at_ns: u64,
}

impl FinalizedArtifact {
    pub fn new(path: impl Into<PathBuf>, size: u64, created_at_ns: u64) -> Self {
        Self {
            path: path.into(),
            size,
            created_at_ns,
        }
    }

    /// Age relative to `now_ns`. Zero if the artifact is from the future.
    pub fn age(&self, now_ns: u64) -> Duration {
        Duration::from_nanos(now_ns.saturating_sub(self.created_at_ns))
    }
}

/// Creation-ordered list of artifacts used for retention decisions.
///
/// `total_bytes` always equals the sum of the entries' sizes.
#[derive(Debug, Clone, Default)]
pub struct RetentionLedger {
    entries: VecDeque<FinalizedArtifact>,
    total_bytes: u64,
}

impl RetentionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: FinalizedArtifact) {
        self.total_bytes = self.total_bytes.saturating_add(artifact.size);
        self.entries.push_back(artifact);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn oldest(&self) -> Option<&FinalizedArtifact> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&FinalizedArtifact> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FinalizedArtifact> {
        self.entries.iter()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    /// Remove the entries at `indices` (ascending, deduplicated) and return
    /// them oldest first.
    pub fn remove_indices(&mut self, indices: &[usize]) -> Vec<FinalizedArtifact> {
        if indices.is_empty() {
            return Vec::new();
        }
        let mut removed = Vec::with_capacity(indices.len());
        let mut kept = VecDeque::with_capacity(self.entries.len().saturating_sub(indices.len()));
        for (index, entry) in self.entries.drain(..).enumerate() {
            if indices.binary_search(&index).is_ok() {
                self.total_bytes = self.total_bytes.saturating_sub(entry.size);
                removed.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        removed
    }

    pub fn to_vec(&self) -> Vec<FinalizedArtifact> {
        self.entries.iter().cloned().collect()
    }
}
