use std::path::PathBuf;

use keel_cloud::{ReleasePromoter, ReleaseStore};

use super::{Session, Target};

pub async fn releases_list(target: &Target) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let store = ReleaseStore::new(session.releases());

    let releases = store.list(&session.ctx).await?;
    if releases.is_empty() {
        println!("No releases found for {}", session.ctx.app);
        return Ok(());
    }

    println!("{:<12} {:<22} CREATED", "ID", "ARTIFACT");
    for release in &releases {
        println!(
            "{:<12} {:<22} {}",
            release.id,
            release.artifact.as_deref().unwrap_or("-"),
            release.created.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn releases_copy(target: &Target, id: &str) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let store = ReleaseStore::new(session.releases());

    let copy = store.copy(&session.ctx, id).await?;
    println!("Copied {id} to {}", copy.id);
    Ok(())
}

pub async fn releases_promote(target: &Target, id: &str) -> anyhow::Result<()> {
    let session = Session::load(&PathBuf::from("."), target)?;
    let store = ReleaseStore::new(session.releases());
    let stacks = session.stacks();

    print!("Promoting {id}... ");
    let promotion = ReleasePromoter::new(&store, &stacks)
        .promote(&session.ctx, id)
        .await?;
    println!("UPDATING {}", promotion.stack);
    Ok(())
}
