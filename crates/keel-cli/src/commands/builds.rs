use std::path::PathBuf;

use keel_cloud::{BuildOrchestrator, RackApi, ReleasePromoter, ReleaseStore};
use keel_core::BuildRecord;

use super::{Session, Target};

pub async fn builds_list(target: &Target) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let rack = session.rack()?;

    let builds = rack.list_builds(&session.ctx.app).await?;
    if builds.is_empty() {
        println!("No builds found for {}", session.ctx.app);
        return Ok(());
    }

    println!("{:<12} {:<10} {:<12} {:<25} DESCRIPTION", "ID", "STATUS", "RELEASE", "STARTED");
    for build in &builds {
        println!(
            "{:<12} {:<10} {:<12} {:<25} {}",
            build.id,
            build.status,
            build.release.as_deref().unwrap_or("-"),
            started(build),
            build.description
        );
    }
    Ok(())
}

pub async fn builds_info(target: &Target, id: &str) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let rack = session.rack()?;

    let build = rack.get_build(&session.ctx.app, id).await?;
    println!("Id           {}", build.id);
    println!("Status       {}", build.status);
    println!("Release      {}", build.release.as_deref().unwrap_or("-"));
    println!("Description  {}", build.description);
    println!("Started      {}", started(&build));
    match build.ended {
        Some(ended) => println!("Ended        {}", ended.to_rfc3339()),
        None => println!("Ended        -"),
    }
    Ok(())
}

/// Copy a build to another app, optionally promoting the resulting release.
pub async fn builds_copy(
    target: &Target,
    id: &str,
    dest_app: &str,
    promote: bool,
) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let rack = session.rack()?;

    println!("Copying build {id} to {dest_app}...");
    let mut stdout = tokio::io::stdout();
    let outcome = BuildOrchestrator::new(&rack, session.poll())
        .copy(&session.ctx, id, dest_app, &mut stdout)
        .await?;
    println!("Release: {}", outcome.release);

    if promote {
        let dest = session.ctx.with_app(dest_app);
        let releases = ReleaseStore::new(session.releases());
        let stacks = session.stacks();

        print!("Promoting {}... ", outcome.release);
        let promotion = ReleasePromoter::new(&releases, &stacks)
            .promote(&dest, &outcome.release)
            .await?;
        println!("UPDATING {}", promotion.stack);
    }
    Ok(())
}

pub async fn builds_delete(target: &Target, id: &str) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let rack = session.rack()?;

    let build = rack.delete_build(&session.ctx.app, id).await?;
    println!("Deleted {}", build.id);
    Ok(())
}

fn started(build: &BuildRecord) -> String {
    build
        .started
        .map_or_else(|| "-".to_owned(), |t| t.to_rfc3339())
}
