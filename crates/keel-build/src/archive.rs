use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;
use keel_core::Index;
use tracing::debug;

/// Package the files behind `missing` into a gzip'ed tar.
///
/// Entries are named by content hash, not by path, so identical content at
/// several paths travels once. Files are re-read from disk here; one that can
/// no longer be read aborts the whole archive.
pub fn pack_missing(index: &Index, missing: &[String]) -> Result<Vec<u8>, TransferError> {
    let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for hash in missing {
        let entry = index
            .get(hash)
            .ok_or_else(|| TransferError::UnknownHash { hash: hash.clone() })?;
        let path = index.path_of(entry);

        let data = std::fs::read(&path).map_err(|e| TransferError::Read {
            path: path.clone(),
            source: e,
        })?;

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o600);
        header.set_size(data.len() as u64);
        header.set_cksum();

        tar.append_data(&mut header, hash, data.as_slice())
            .map_err(|e| TransferError::Archive { source: e })?;
        debug!(hash = %hash, path = %entry.path, "packed");
    }

    let encoder = tar
        .into_inner()
        .map_err(|e| TransferError::Archive { source: e })?;
    encoder
        .finish()
        .map_err(|e| TransferError::Archive { source: e })
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("rack requested {hash}, which is not in the local index")]
    UnknownHash { hash: String },
    #[error("{path} could not be re-read for upload")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write upload archive")]
    Archive { source: std::io::Error },
}
