use std::sync::Arc;

use keel_core::{BuildRecord, Index};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

/// Bytes handed to the transport so far, out of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub sent: u64,
    pub total: u64,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// A progress callback that discards updates.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Milestones a build passes before its log stream opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPhase {
    /// Source indexed; `entries` distinct contents.
    Analyzed { entries: usize },
    /// The rack reported how many indexed contents it lacks.
    Changes { missing: usize },
    /// Full source tarball packed.
    Packaged { bytes: u64 },
    /// The rack accepted the build.
    Started { build: String },
}

pub type PhaseFn = Arc<dyn Fn(BuildPhase) + Send + Sync>;

/// A phase callback that discards updates.
pub fn no_phases() -> PhaseFn {
    Arc::new(|_| {})
}

/// Log output destination for a build.
pub type LogSink<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    /// Release timestamp of the rack software, e.g. `20160226234213`.
    pub version: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Creating,
    Running,
    Updating,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub status: AppStatus,
}

/// Where the builder gets its source from.
pub enum BuildSource<'a> {
    /// The rack fetches the source itself.
    Url(&'a str),
    /// Files already uploaded to the rack's content cache.
    Index(&'a Index),
    /// Full gzip'ed tarball of the source tree.
    Tarball(Vec<u8>),
}

impl BuildSource<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Index(_) => "index",
            Self::Tarball(_) => "tarball",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
    pub cache: bool,
    pub manifest: String,
    pub description: String,
}

/// The rack's build API.
#[allow(async_fn_in_trait)]
pub trait RackApi: Send + Sync {
    async fn get_system(&self) -> Result<SystemInfo, RackError>;

    async fn get_app(&self, app: &str) -> Result<AppInfo, RackError>;

    /// Hashes of `index` the rack's content cache does not hold.
    async fn index_missing(&self, index: &Index) -> Result<Vec<String>, RackError>;

    /// Upload a gzip'ed tar of cache entries named by hash.
    async fn index_update(&self, archive: Vec<u8>, progress: ProgressFn) -> Result<(), RackError>;

    async fn create_build(
        &self,
        app: &str,
        source: BuildSource<'_>,
        options: &BuildOptions,
        progress: ProgressFn,
    ) -> Result<BuildRecord, RackError>;

    async fn get_build(&self, app: &str, id: &str) -> Result<BuildRecord, RackError>;

    async fn list_builds(&self, app: &str) -> Result<Vec<BuildRecord>, RackError>;

    /// Copy a build into `dest_app`; the copy is a new build of that app.
    async fn copy_build(&self, app: &str, id: &str, dest_app: &str)
    -> Result<BuildRecord, RackError>;

    /// Remove a build; returns its last record.
    async fn delete_build(&self, app: &str, id: &str) -> Result<BuildRecord, RackError>;

    /// Copy build output into `sink` until the rack closes the stream.
    async fn stream_build_logs(
        &self,
        app: &str,
        id: &str,
        sink: LogSink<'_>,
    ) -> Result<(), RackError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RackError {
    #[error("invalid rack endpoint {url}")]
    Endpoint {
        url: String,
        source: reqwest::Error,
    },

    #[error("request to {path} failed")]
    Request {
        path: String,
        source: reqwest::Error,
    },

    #[error("rack returned {status} for {path}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {path}")]
    Decode {
        path: String,
        source: reqwest::Error,
    },

    #[error("failed to write build output")]
    Sink { source: std::io::Error },
}
