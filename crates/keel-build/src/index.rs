use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use keel_core::{Index, IndexEntry};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ignore::IgnoreRules;

/// Hex SHA-256 of raw bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Build a content-addressed index of every regular file under `dir`.
///
/// The root is resolved through symlinks first so entry paths do not depend
/// on how the directory was referenced. Files excluded by `rules` are
/// skipped; directories are walked, never indexed. A symlink inside the tree
/// is indexed with the content of the file it points at, and a dangling link
/// fails the walk.
pub fn create_index(dir: &Path, rules: &IgnoreRules) -> Result<Index, IndexError> {
    let root = std::fs::canonicalize(dir).map_err(|e| IndexError::Resolve {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut index = Index::new(&root);
    let mut files = 0usize;

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_pruned(&root, rules, e, &[]));

    for entry in walker {
        let entry = entry.map_err(|e| IndexError::Walk { source: e })?;
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        let rel = relative(&root, entry.path());
        if rules.matches(&rel) {
            debug!(path = %rel, "ignored");
            continue;
        }

        let read_error = |e| IndexError::Read {
            path: entry.path().to_path_buf(),
            source: e,
        };
        let metadata = std::fs::metadata(entry.path()).map_err(read_error)?;
        if !metadata.is_file() {
            debug!(path = %rel, "link to a non-file, skipped");
            continue;
        }

        let data = std::fs::read(entry.path()).map_err(read_error)?;
        let modified = metadata.modified().map_err(read_error)?;

        files += 1;
        index.insert(IndexEntry {
            hash: hash_bytes(&data),
            path: rel,
            mode: file_mode(&metadata),
            modified: DateTime::<Utc>::from(modified),
            size: data.len() as u64,
        });
    }

    info!(
        root = %root.display(),
        files,
        unique = index.len(),
        "source indexed"
    );

    Ok(index)
}

/// Whether the walk can skip `entry` and everything below it. Directories
/// leading to one of `keep` are always walked.
pub(crate) fn is_pruned(
    root: &Path,
    rules: &IgnoreRules,
    entry: &walkdir::DirEntry,
    keep: &[&str],
) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let rel = relative(root, entry.path());
    let prefix = format!("{rel}/");
    rules.prunes_dir(&rel) && !keep.iter().any(|k| k.starts_with(&prefix))
}

/// `/`-separated path of `path` relative to `root`.
pub(crate) fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to resolve source directory {path}")]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk source tree")]
    Walk { source: walkdir::Error },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
