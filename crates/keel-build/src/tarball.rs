use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ignore::IgnoreRules;
use crate::index::{is_pruned, relative};

/// Packages a whole source tree for a non-incremental build.
///
/// Applies the same ignore rules as the content index, except that the
/// ignore file and the build-definition file always ship: the builder needs
/// both to re-evaluate exclusions and to run the build. Symlinks are
/// archived as links.
pub fn create_tarball(
    dir: &Path,
    rules: &IgnoreRules,
    ignore_file: &str,
    build_file: &str,
) -> Result<Vec<u8>, TarballError> {
    let root = std::fs::canonicalize(dir).map_err(|e| TarballError::Resolve {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let forced = [ignore_file, build_file];
    for name in forced {
        if rules.matches(name) {
            debug!(file = name, "excluded by ignore rules, shipping anyway");
        }
    }

    let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    tar.follow_symlinks(false);

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_pruned(&root, rules, e, &forced));

    let mut entries = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| TarballError::Walk { source: e })?;
        if entry.depth() == 0 {
            continue;
        }

        let rel = relative(&root, entry.path());
        if rules.matches(&rel) && !forced.contains(&rel.as_str()) {
            continue;
        }

        let appended = if entry.file_type().is_dir() {
            tar.append_dir(&rel, entry.path())
        } else {
            tar.append_path_with_name(entry.path(), &rel)
        };
        appended.map_err(|e| TarballError::Append {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        entries += 1;
    }

    let encoder = tar
        .into_inner()
        .map_err(|e| TarballError::Finish { source: e })?;
    let bytes = encoder
        .finish()
        .map_err(|e| TarballError::Finish { source: e })?;

    info!(root = %root.display(), entries, bytes = bytes.len(), "tarball created");
    Ok(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum TarballError {
    #[error("failed to resolve source directory {path}")]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk source tree")]
    Walk { source: walkdir::Error },
    #[error("failed to add {path} to tarball")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to finish tarball")]
    Finish { source: std::io::Error },
}
