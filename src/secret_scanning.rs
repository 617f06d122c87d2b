//! Secret scanning alert migration, run separately from the repository pipeline.

use tracing::{error, info};

use crate::error::{MigrationError, StepFailure};
use crate::model::{FeatureStatus, Repository};
use crate::pipeline::MigrationContext;
use crate::step::StepRunner;

/// Organization-level configuration repository; it never carries alerts worth moving.
pub const SKIPPED_REPOSITORY: &str = ".github";

/// Moves secret scanning alerts for `repository`, or for every source repository when `None`.
///
/// A failing repository does not stop the others; the names of those that failed are returned.
pub async fn migrate_secret_scanning(
    ctx: &MigrationContext,
    repository: Option<&str>,
) -> Result<Vec<String>, MigrationError> {
    let repositories = match repository {
        Some(name) => vec![ctx.source.get_repository(&ctx.source_org, name).await?],
        None => {
            info!(organization = %ctx.source_org, "fetching source repositories");
            ctx.source.get_repositories(&ctx.source_org).await?
        }
    };

    let mut failed = Vec::new();
    for repository in repositories
        .iter()
        .filter(|repository| repository.name != SKIPPED_REPOSITORY)
    {
        if let Err(failure) = migrate_repository_alerts(ctx, repository).await {
            error!(repository = %repository.name, error = %failure, "secret scanning migration failed");
            failed.push(repository.name.clone());
        }
    }

    Ok(failed)
}

async fn migrate_repository_alerts(
    ctx: &MigrationContext,
    repository: &Repository,
) -> Result<(), StepFailure> {
    if repository.security.secret_scanning != Some(FeatureStatus::Enabled) {
        info!(repository = %repository.name, "secret scanning not enabled, skipping");
        return Ok(());
    }

    let name = repository.name.as_str();
    let transfer = ctx.transfer.as_ref();
    let mut steps = StepRunner::new(name, ctx.retry);
    steps
        .run("migrating secret scanning alerts", move || {
            transfer.migrate_secret_scanning(name)
        })
        .await;
    steps.into_result()
}
