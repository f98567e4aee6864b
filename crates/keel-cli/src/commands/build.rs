use std::path::PathBuf;

use keel_cloud::{BuildOrchestrator, BuildRequest, is_remote_url};

use super::{Session, Target, phase_lines, upload_progress};

/// Flags of `keel build`.
#[derive(Debug, Clone, Default)]
pub struct BuildFlags {
    pub source: Option<String>,
    pub incremental: bool,
    pub no_cache: bool,
    pub manifest: Option<String>,
    pub description: Option<String>,
}

/// Build the app from a local directory or a remote URL.
pub async fn build(target: &Target, flags: BuildFlags) -> anyhow::Result<()> {
    let source = flags.source.unwrap_or_else(|| ".".to_owned());

    // Config and the default app name come from the source dir when it is local.
    let project_dir = if is_remote_url(&source) {
        PathBuf::from(".")
    } else {
        PathBuf::from(&source)
    };
    let session = Session::load(&project_dir, target)?;

    let mut request = BuildRequest::new(source, &session.config.build);
    request.incremental |= flags.incremental;
    if flags.no_cache {
        request.options.cache = false;
    }
    if let Some(manifest) = flags.manifest {
        request.options.manifest = manifest;
    }
    if let Some(description) = flags.description {
        request.options.description = description;
    }

    let rack = session.rack()?;
    println!("Building {}...", session.ctx.app);

    let mut stdout = tokio::io::stdout();
    let outcome = BuildOrchestrator::new(&rack, session.poll())
        .with_phases(phase_lines())
        .execute(&session.ctx, &request, upload_progress(), &mut stdout)
        .await?;

    println!();
    println!("Build:   {}", outcome.build_id);
    println!("Release: {}", outcome.release);
    println!(
        "Promote with: keel releases promote {} --app {}",
        outcome.release, outcome.app
    );
    Ok(())
}
