use keel_build::{AppParams, FormationGenerator, RELEASE_PARAMETER, TemplateError};
use keel_core::{AppContext, StackParameter};
use tracing::info;

use crate::release::{ReleaseError, ReleaseStore};
use crate::stack::{StackError, StackService};
use crate::store::RecordStore;

/// A stack update that the orchestration service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub stack: String,
    pub release: String,
    pub parameters: Vec<StackParameter>,
}

/// Points an app's stack at an existing release.
pub struct ReleasePromoter<'a, S: RecordStore, K: StackService> {
    releases: &'a ReleaseStore<S>,
    stacks: &'a K,
}

impl<'a, S: RecordStore, K: StackService> ReleasePromoter<'a, S, K> {
    pub fn new(releases: &'a ReleaseStore<S>, stacks: &'a K) -> Self {
        Self { releases, stacks }
    }

    /// Issue one stack update that re-renders the template and sets the
    /// `Release` parameter to `release_id`. Nothing is rolled back locally if
    /// the update is rejected.
    pub async fn promote(
        &self,
        ctx: &AppContext,
        release_id: &str,
    ) -> Result<Promotion, PromoteError> {
        let release = self.releases.get(ctx, release_id).await?;
        if release.artifact.is_none() {
            return Err(PromoteError::InvalidRelease {
                release: release.id,
            });
        }

        let stack = ctx.stack_name();
        let live = self
            .stacks
            .describe_parameters(&stack)
            .await
            .map_err(|e| PromoteError::Describe {
                stack: stack.clone(),
                source: e,
            })?;

        let app_params = AppParams {
            rack: ctx.rack.clone(),
            app: ctx.app.clone(),
            parameters: live.clone(),
        };
        let template = FormationGenerator::new(&app_params, &release).render()?;
        let parameters = with_release(live, &release.id);

        self.stacks
            .update_stack(&stack, &template, &parameters)
            .await
            .map_err(|e| PromoteError::Update {
                stack: stack.clone(),
                detail: e.remote_message(),
                source: e,
            })?;

        info!(stack = %stack, release = %release.id, "promotion started");
        Ok(Promotion {
            stack,
            release: release.id,
            parameters,
        })
    }
}

/// `parameters` with exactly one `Release` entry set to `release`.
///
/// An existing entry keeps its position; any duplicates are dropped.
pub fn with_release(mut parameters: Vec<StackParameter>, release: &str) -> Vec<StackParameter> {
    let mut seen = false;
    parameters.retain_mut(|p| {
        if p.key != RELEASE_PARAMETER {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        p.value = release.to_owned();
        true
    });

    if !seen {
        parameters.push(StackParameter::new(RELEASE_PARAMETER, release));
    }
    parameters
}

#[derive(Debug, thiserror::Error)]
pub enum PromoteError {
    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error("release {release} has no build artifact")]
    InvalidRelease { release: String },

    #[error("could not read parameters of stack {stack}")]
    Describe { stack: String, source: StackError },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{detail}")]
    Update {
        stack: String,
        detail: String,
        source: StackError,
    },
}
