use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use keel_core::id::new_release_id;
use keel_core::release::{ATTR_APP, is_reserved};
use keel_core::{AppContext, ReleaseRecord};
use tracing::{debug, info};

use crate::store::{IndexQuery, RecordStore, StoreError};

/// Releases returned by [`ReleaseStore::list`].
pub const RELEASE_PAGE_SIZE: usize = 5;

/// Secondary index over `(app, created)`.
pub const CREATED_INDEX: &str = "app.created";

/// Append-only persistence of an app's releases.
pub struct ReleaseStore<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> ReleaseStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The newest releases of `ctx.app`, newest first.
    ///
    /// One unparseable row fails the whole call.
    pub async fn list(&self, ctx: &AppContext) -> Result<Vec<ReleaseRecord>, ReleaseError> {
        let table = ctx.releases_table();
        let query = IndexQuery {
            index: CREATED_INDEX,
            key: ATTR_APP,
            value: &ctx.app,
            limit: RELEASE_PAGE_SIZE,
            descending: true,
        };

        let rows = self
            .store
            .query_index(&table, &query)
            .await
            .map_err(|e| ReleaseError::Store {
                table: table.clone(),
                source: e,
            })?;

        let mut releases = rows
            .into_iter()
            .map(ReleaseRecord::from_attributes)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ReleaseError::Malformed {
                table: table.clone(),
                source: e,
            })?;

        releases.sort_by(|a, b| b.created.cmp(&a.created));
        releases.truncate(RELEASE_PAGE_SIZE);
        Ok(releases)
    }

    pub async fn get(&self, ctx: &AppContext, id: &str) -> Result<ReleaseRecord, ReleaseError> {
        let table = ctx.releases_table();
        let row = self
            .store
            .get(&table, id)
            .await
            .map_err(|e| ReleaseError::Store {
                table: table.clone(),
                source: e,
            })?
            .ok_or_else(|| ReleaseError::NotFound {
                app: ctx.app.clone(),
                id: id.to_owned(),
            })?;

        ReleaseRecord::from_attributes(row).map_err(|e| ReleaseError::Malformed { table, source: e })
    }

    /// Persist a new release of `artifact`. Id and creation time are assigned
    /// here; reserved names in `params` are dropped.
    pub async fn create(
        &self,
        ctx: &AppContext,
        artifact: &str,
        params: BTreeMap<String, String>,
    ) -> Result<ReleaseRecord, ReleaseError> {
        let release = ReleaseRecord {
            id: new_release_id(),
            app: ctx.app.clone(),
            artifact: Some(artifact.to_owned()).filter(|a| !a.is_empty()),
            created: Utc::now(),
            params: params.into_iter().filter(|(k, _)| !is_reserved(k)).collect(),
        };

        self.put(ctx, &release).await?;
        info!(app = %ctx.app, release = %release.id, "release created");
        Ok(release)
    }

    /// Copy a release within the same app.
    pub async fn copy(&self, ctx: &AppContext, id: &str) -> Result<ReleaseRecord, ReleaseError> {
        self.copy_to(ctx, id, ctx).await
    }

    /// Copy a release of `from.app` into `to.app` under a new id.
    ///
    /// The artifact and params carry over unchanged.
    pub async fn copy_to(
        &self,
        from: &AppContext,
        id: &str,
        to: &AppContext,
    ) -> Result<ReleaseRecord, ReleaseError> {
        let source = self.get(from, id).await?;

        let mut new_id = new_release_id();
        while new_id == source.id {
            new_id = new_release_id();
        }

        let copy = ReleaseRecord {
            id: new_id,
            app: to.app.clone(),
            artifact: source.artifact.clone(),
            created: later_than(source.created),
            params: source.params.clone(),
        };

        self.put(to, &copy).await?;
        info!(from = %source.id, to = %copy.id, app = %to.app, "release copied");
        Ok(copy)
    }

    async fn put(&self, ctx: &AppContext, release: &ReleaseRecord) -> Result<(), ReleaseError> {
        let table = ctx.releases_table();
        debug!(table = %table, release = %release.id, "put release");
        self.store
            .put(&table, &release.to_attributes())
            .await
            .map_err(|e| ReleaseError::Store { table, source: e })
    }
}

/// Now, unless the local clock is behind `earlier`.
fn later_than(earlier: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(earlier + TimeDelta::nanoseconds(1))
}

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("release store {table} request failed")]
    Store { table: String, source: StoreError },

    #[error("malformed release record in {table}")]
    Malformed {
        table: String,
        source: keel_core::Error,
    },

    #[error("no such release {id} for app {app}")]
    NotFound { app: String, id: String },
}
