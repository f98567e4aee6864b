use std::path::Path;
use std::time::Duration;

use keel_build::{
    IgnoreError, IgnoreRules, IndexError, TarballError, create_index, create_tarball,
    warn_unignored_env,
};
use keel_core::BuildRecord;
use keel_core::{AppContext, BuildConfig, BuildStatus};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::rack::{
    AppStatus, BuildOptions, BuildPhase, BuildSource, LogSink, PhaseFn, ProgressFn, RackApi,
    RackError, no_phases,
};
use crate::upload::{IndexUploader, UploadError};

/// Oldest rack version that accepts index-based builds. Versions are
/// fixed-width timestamps, so string order is release order.
pub const MIN_INCREMENTAL_VERSION: &str = "20160226234213";

/// How build source reaches the rack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStrategy {
    Url,
    Index,
    Tarball,
}

/// True when `source` is an http(s) URL the rack can fetch itself.
pub fn is_remote_url(source: &str) -> bool {
    matches!(
        reqwest::Url::parse(source),
        Ok(url) if url.scheme() == "http" || url.scheme() == "https"
    )
}

/// Pick the source strategy for a build.
///
/// Incremental builds fall back to a full tarball when the rack is too old
/// or its version is unknown.
pub fn select_strategy(
    source: &str,
    incremental: bool,
    rack_version: Option<&str>,
) -> SourceStrategy {
    if is_remote_url(source) {
        return SourceStrategy::Url;
    }

    match rack_version {
        Some(version) if incremental && version >= MIN_INCREMENTAL_VERSION => {
            SourceStrategy::Index
        }
        _ => SourceStrategy::Tarball,
    }
}

/// Read the ignore file once for both the `.env` check and packaging.
fn load_rules(dir: &Path, ignore_file: &str) -> Result<IgnoreRules, IgnoreError> {
    let rules = IgnoreRules::load(dir, ignore_file)?;
    warn_unignored_env(dir, &rules);
    Ok(rules)
}

/// Status polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Stop observing after this long. The remote build keeps running.
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            deadline: config.poll_deadline(),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&BuildConfig::default())
    }
}

/// One `keel build` invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Project directory or remote URL.
    pub source: String,
    pub incremental: bool,
    pub ignore_file: String,
    pub build_file: String,
    pub options: BuildOptions,
}

impl BuildRequest {
    pub fn new(source: impl Into<String>, config: &BuildConfig) -> Self {
        Self {
            source: source.into(),
            incremental: config.incremental,
            ignore_file: config.ignore_file.clone(),
            build_file: config.build_file.clone(),
            options: BuildOptions {
                cache: config.cache,
                manifest: config.manifest.clone(),
                description: String::new(),
            },
        }
    }
}

/// A build that reached `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub app: String,
    pub build_id: String,
    pub release: String,
}

/// Submits builds and follows them to a terminal status.
pub struct BuildOrchestrator<'a, R: RackApi> {
    rack: &'a R,
    poll: PollPolicy,
    phases: PhaseFn,
}

impl<'a, R: RackApi> BuildOrchestrator<'a, R> {
    pub fn new(rack: &'a R, poll: PollPolicy) -> Self {
        Self {
            rack,
            poll,
            phases: no_phases(),
        }
    }

    /// Report each [`BuildPhase`] of [`execute`](Self::execute) to `phases`.
    pub fn with_phases(mut self, phases: PhaseFn) -> Self {
        self.phases = phases;
        self
    }

    /// Package, submit and follow a build of `ctx.app`.
    ///
    /// Build output is copied into `sink` while the build runs.
    pub async fn execute(
        &self,
        ctx: &AppContext,
        request: &BuildRequest,
        progress: ProgressFn,
        sink: LogSink<'_>,
    ) -> Result<BuildOutcome, BuildError> {
        self.check_app(&ctx.app).await?;

        let strategy = self.strategy(request).await?;
        info!(app = %ctx.app, strategy = ?strategy, "starting build");

        let build = match strategy {
            SourceStrategy::Url => {
                self.submit(ctx, BuildSource::Url(&request.source), request, progress)
                    .await?
            }
            SourceStrategy::Index => {
                let dir = Path::new(&request.source);
                let rules = load_rules(dir, &request.ignore_file)?;

                let index = create_index(dir, &rules)?;
                (self.phases)(BuildPhase::Analyzed {
                    entries: index.len(),
                });

                let report = IndexUploader::new(self.rack)
                    .with_phases(self.phases.clone())
                    .upload(&index, progress.clone())
                    .await?;
                debug!(missing = report.missing.len(), bytes = report.bytes, "index synced");

                self.submit(ctx, BuildSource::Index(&index), request, progress)
                    .await?
            }
            SourceStrategy::Tarball => {
                let dir = Path::new(&request.source);
                let rules = load_rules(dir, &request.ignore_file)?;

                let tarball =
                    create_tarball(dir, &rules, &request.ignore_file, &request.build_file)?;
                (self.phases)(BuildPhase::Packaged {
                    bytes: tarball.len() as u64,
                });

                self.submit(ctx, BuildSource::Tarball(tarball), request, progress)
                    .await?
            }
        };

        if build.id.is_empty() {
            return Err(BuildError::MissingId {
                app: ctx.app.clone(),
            });
        }

        info!(app = %ctx.app, build = %build.id, "build submitted");
        (self.phases)(BuildPhase::Started {
            build: build.id.clone(),
        });
        self.finish(&ctx.app, &build.id, sink).await
    }

    /// Copy a build into `dest_app` and follow the copy like a fresh build.
    pub async fn copy(
        &self,
        ctx: &AppContext,
        build_id: &str,
        dest_app: &str,
        sink: LogSink<'_>,
    ) -> Result<BuildOutcome, BuildError> {
        self.check_app(dest_app).await?;

        let copy = self
            .rack
            .copy_build(&ctx.app, build_id, dest_app)
            .await
            .map_err(|e| BuildError::Copy {
                build: build_id.to_owned(),
                source: e,
            })?;

        if copy.id.is_empty() {
            return Err(BuildError::MissingId {
                app: dest_app.to_owned(),
            });
        }

        info!(from = %ctx.app, to = dest_app, build = %copy.id, "build copied");
        self.finish(dest_app, &copy.id, sink).await
    }

    async fn check_app(&self, app: &str) -> Result<(), BuildError> {
        let info = self
            .rack
            .get_app(app)
            .await
            .map_err(|e| BuildError::AppLookup {
                app: app.to_owned(),
                source: e,
            })?;

        match info.status {
            AppStatus::Running | AppStatus::Updating => Ok(()),
            AppStatus::Creating => Err(BuildError::AppCreating {
                app: app.to_owned(),
            }),
            status @ (AppStatus::Deleting | AppStatus::Unknown) => Err(BuildError::AppNotBuildable {
                app: app.to_owned(),
                status,
            }),
        }
    }

    async fn strategy(&self, request: &BuildRequest) -> Result<SourceStrategy, BuildError> {
        if !request.incremental || is_remote_url(&request.source) {
            return Ok(select_strategy(&request.source, false, None));
        }

        let system = self
            .rack
            .get_system()
            .await
            .map_err(|e| BuildError::System { source: e })?;

        let strategy = select_strategy(&request.source, true, Some(system.version.as_str()));
        if strategy == SourceStrategy::Tarball {
            info!(
                version = %system.version,
                "rack does not support incremental builds, uploading full source"
            );
        }
        Ok(strategy)
    }

    async fn submit(
        &self,
        ctx: &AppContext,
        source: BuildSource<'_>,
        request: &BuildRequest,
        progress: ProgressFn,
    ) -> Result<BuildRecord, BuildError> {
        self.rack
            .create_build(&ctx.app, source, &request.options, progress)
            .await
            .map_err(|e| BuildError::Submit {
                app: ctx.app.clone(),
                source: e,
            })
    }

    /// Stream logs and poll until the build is terminal.
    ///
    /// Log failures are reported and otherwise ignored; the stream is dropped
    /// as soon as polling settles.
    async fn finish(
        &self,
        app: &str,
        build_id: &str,
        sink: LogSink<'_>,
    ) -> Result<BuildOutcome, BuildError> {
        let logs = self.rack.stream_build_logs(app, build_id, sink);
        let status = self.wait(app, build_id);
        tokio::pin!(logs);
        tokio::pin!(status);

        let mut streaming = true;
        let release = loop {
            tokio::select! {
                result = &mut status => break result?,
                result = &mut logs, if streaming => {
                    streaming = false;
                    match result {
                        Ok(()) => debug!(build = build_id, "log stream closed"),
                        Err(e) => warn!(build = build_id, error = %e, "log stream failed"),
                    }
                }
            }
        };

        Ok(BuildOutcome {
            app: app.to_owned(),
            build_id: build_id.to_owned(),
            release,
        })
    }

    async fn wait(&self, app: &str, build_id: &str) -> Result<String, BuildError> {
        let started = Instant::now();

        loop {
            let build = self
                .rack
                .get_build(app, build_id)
                .await
                .map_err(|e| BuildError::Poll {
                    build: build_id.to_owned(),
                    source: e,
                })?;

            match build.status {
                BuildStatus::Complete => {
                    return build
                        .release
                        .filter(|r| !r.is_empty())
                        .ok_or_else(|| BuildError::NoRelease {
                            build: build_id.to_owned(),
                        });
                }
                BuildStatus::Error | BuildStatus::Failed => {
                    return Err(BuildError::Failed {
                        app: app.to_owned(),
                    });
                }
                BuildStatus::Timeout => {
                    return Err(BuildError::TimedOut {
                        app: app.to_owned(),
                    });
                }
                BuildStatus::Created | BuildStatus::Building | BuildStatus::Unknown => {
                    debug!(build = build_id, status = %build.status, "waiting");
                }
            }

            if started.elapsed() >= self.poll.deadline {
                return Err(BuildError::Deadline {
                    build: build_id.to_owned(),
                    waited: self.poll.deadline,
                });
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("app is still creating: {app}")]
    AppCreating { app: String },

    #[error("unable to build app {app} while it is {status}")]
    AppNotBuildable { app: String, status: AppStatus },

    #[error("could not look up app {app}")]
    AppLookup { app: String, source: RackError },

    #[error("could not read rack version")]
    System { source: RackError },

    #[error(transparent)]
    Ignore(#[from] IgnoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Tarball(#[from] TarballError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("could not create build for {app}")]
    Submit { app: String, source: RackError },

    #[error("could not copy build {build}")]
    Copy { build: String, source: RackError },

    #[error("rack returned a build without an id for {app}")]
    MissingId { app: String },

    #[error("could not check status of build {build}")]
    Poll { build: String, source: RackError },

    #[error("{app} build failed")]
    Failed { app: String },

    #[error("{app} build timed out")]
    TimedOut { app: String },

    #[error("build {build} completed without a release")]
    NoRelease { build: String },

    #[error("gave up waiting for build {build} after {waited:?}")]
    Deadline { build: String, waited: Duration },
}
