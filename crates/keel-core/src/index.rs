use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file's identity inside an [`Index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Hex SHA-256 of the file's raw bytes. Carried as the map key on the wire.
    #[serde(skip)]
    pub hash: String,
    /// Path relative to the index root, `/`-separated.
    #[serde(rename = "name")]
    pub path: String,
    pub mode: u32,
    #[serde(rename = "mtime")]
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// Content-addressed manifest of a source tree at one point in time.
///
/// Keyed by content hash: byte-identical files at different paths collapse
/// into a single entry (the last path walked wins).
#[derive(Debug, Clone)]
pub struct Index {
    root: PathBuf,
    entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Directory the entry paths are relative to (symlinks already resolved).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert an entry, returning `false` when its hash was already present.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        self.entries.insert(entry.hash.clone(), entry).is_none()
    }

    pub fn get(&self, hash: &str) -> Option<&IndexEntry> {
        self.entries.get(hash)
    }

    pub fn hashes(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absolute path of an entry on disk.
    pub fn path_of(&self, entry: &IndexEntry) -> PathBuf {
        self.root.join(&entry.path)
    }

    /// The hash → entry map sent to the rack.
    pub fn wire(&self) -> &BTreeMap<String, IndexEntry> {
        &self.entries
    }
}
