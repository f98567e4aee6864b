use keel_build::{TransferError, pack_missing};
use keel_core::Index;
use tracing::{debug, info};

use crate::rack::{BuildPhase, PhaseFn, ProgressFn, RackApi, RackError, no_phases};

/// Outcome of syncing an index with the rack's content cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Hashes the rack did not have before the upload.
    pub missing: Vec<String>,
    /// Size of the archive sent; zero when nothing was missing.
    pub bytes: u64,
}

impl UploadReport {
    pub fn is_noop(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Ships the content the rack is missing for an index.
pub struct IndexUploader<'a, R: RackApi> {
    rack: &'a R,
    phases: PhaseFn,
}

impl<'a, R: RackApi> IndexUploader<'a, R> {
    pub fn new(rack: &'a R) -> Self {
        Self {
            rack,
            phases: no_phases(),
        }
    }

    /// Report [`BuildPhase::Changes`] once the diff is known.
    pub fn with_phases(mut self, phases: PhaseFn) -> Self {
        self.phases = phases;
        self
    }

    pub async fn upload(
        &self,
        index: &Index,
        progress: ProgressFn,
    ) -> Result<UploadReport, UploadError> {
        let missing = self
            .rack
            .index_missing(index)
            .await
            .map_err(|e| UploadError::Missing { source: e })?;
        (self.phases)(BuildPhase::Changes {
            missing: missing.len(),
        });

        if missing.is_empty() {
            debug!(files = index.len(), "rack already holds every file");
            return Ok(UploadReport::default());
        }

        let archive = pack_missing(index, &missing)?;
        let bytes = archive.len() as u64;
        info!(missing = missing.len(), bytes, "uploading changed files");

        self.rack
            .index_update(archive, progress)
            .await
            .map_err(|e| UploadError::Update { source: e })?;

        Ok(UploadReport { missing, bytes })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("could not ask the rack which files it is missing")]
    Missing { source: RackError },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("upload of changed files failed")]
    Update { source: RackError },
}
