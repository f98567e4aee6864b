mod build;
mod builds;
mod releases;

use std::path::Path;
use std::sync::Arc;

use keel_cloud::{
    BuildPhase, CloudFormation, DynamoTable, HttpRack, PhaseFn, PollPolicy, Progress, ProgressFn,
    RealExecutor,
};
use keel_core::{AppContext, KeelConfig};

/// Environment variable holding the rack API password.
pub(crate) const PASSWORD_ENV: &str = "KEEL_PASSWORD";

pub use build::{BuildFlags, build};
pub use builds::{builds_copy, builds_delete, builds_info, builds_list};
pub use releases::{releases_copy, releases_list, releases_promote};

/// `--app` / `--rack` overrides shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub app: Option<String>,
    pub rack: Option<String>,
}

/// Configuration and resolved context for one invocation.
pub(crate) struct Session {
    pub config: KeelConfig,
    pub ctx: AppContext,
}

impl Session {
    pub fn load(project_dir: &Path, target: &Target) -> anyhow::Result<Self> {
        let config = KeelConfig::load(project_dir)?;
        let ctx = AppContext::resolve(
            project_dir,
            &config,
            target.app.as_deref(),
            target.rack.as_deref(),
        )?;
        tracing::debug!(rack = %ctx.rack, app = %ctx.app, "resolved target");
        Ok(Self { config, ctx })
    }

    pub fn rack(&self) -> anyhow::Result<HttpRack> {
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) => Some(password),
            Err(std::env::VarError::NotPresent) => None,
            Err(e) => anyhow::bail!("{PASSWORD_ENV} is not usable: {e}"),
        };
        Ok(HttpRack::new(&self.config.rack, password)?)
    }

    /// Release table access with the `[aws]` overrides applied.
    pub fn releases(&self) -> DynamoTable {
        DynamoTable::with_executor(RealExecutor::from_config(&self.config.aws))
    }

    pub fn stacks(&self) -> CloudFormation {
        CloudFormation::with_executor(RealExecutor::from_config(&self.config.aws))
    }

    pub fn poll(&self) -> PollPolicy {
        PollPolicy::from_config(&self.config.build)
    }
}

/// Prints `Uploading... N%` on stderr, rewriting the line in place.
pub(crate) fn upload_progress() -> ProgressFn {
    Arc::new(|Progress { sent, total }| {
        let percent = if total == 0 { 100 } else { sent * 100 / total };
        eprint!("\rUploading... {percent}%");
        if sent >= total {
            eprintln!();
        }
    })
}

/// Prints one status line per build phase on stdout.
pub(crate) fn phase_lines() -> PhaseFn {
    Arc::new(|phase| match phase {
        BuildPhase::Analyzed { .. } => println!("Analyzing source... OK"),
        BuildPhase::Changes { missing: 0 } => println!("Identifying changes... NONE"),
        BuildPhase::Changes { missing } => println!("Identifying changes... {missing} files"),
        BuildPhase::Packaged { .. } => println!("Creating tarball... OK"),
        BuildPhase::Started { build } => println!("Starting build {build}... OK"),
    })
}
