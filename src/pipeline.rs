//! Migration of a single repository from the source to the target organization.
//!
//! The forward path runs on one `StepRunner`, so the first step that exhausts its retries stops
//! every later forward step. Whatever the forward path managed to change on the source is then
//! undone on a second runner: the GHAS settings are put back to the snapshot taken before the
//! first step, disabled workflows are re-enabled and an archived source is archived again.
//! Only a fully successful run archives a source that was live before.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};

use crate::error::StepFailure;
use crate::model::{FeatureStatus, Repository, SecuritySettings, Visibility, Workflow};
use crate::provider::Provider;
use crate::step::{RetryPolicy, StepRunner};
use crate::transfer::Transfer;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Everything a pipeline needs besides the repository itself.
#[derive(Clone)]
pub struct MigrationContext {
    pub source_org: String,
    pub target_org: String,
    pub source: Arc<dyn Provider>,
    pub target: Arc<dyn Provider>,
    pub transfer: Arc<dyn Transfer>,
    pub retry: RetryPolicy,
    /// Wait after switching the target to internal visibility.
    pub settle_delay: Duration,
}

/// Source-side changes made by the forward path that have to be reverted.
#[derive(Default)]
struct Undo {
    unarchived_source: bool,
    touched_source_ghas: bool,
    disabled_workflows: Vec<Workflow>,
}

/// Runs the whole pipeline for `repository`, a snapshot fetched from the source organization.
///
/// The returned error is the first forward step that failed, or, when the forward path went
/// through, the first failed compensation.
pub async fn migrate_repository(
    ctx: &MigrationContext,
    repository: &Repository,
) -> Result<(), StepFailure> {
    let span = info_span!("repository", name = %repository.name);
    run(ctx, repository).instrument(span).await
}

async fn run(ctx: &MigrationContext, repository: &Repository) -> Result<(), StepFailure> {
    let name = repository.name.as_str();
    let source = ctx.source.as_ref();
    let target = ctx.target.as_ref();
    let transfer = ctx.transfer.as_ref();
    let source_org = ctx.source_org.as_str();
    let target_org = ctx.target_org.as_str();

    let baseline = repository.effective_security();
    info!(
        archived = repository.archived,
        visibility = %repository.visibility,
        security = %SecuritySettings::from_snapshot(&baseline),
        "recorded baseline"
    );

    let mut steps = StepRunner::new(name, ctx.retry);
    let mut undo = Undo::default();
    let mut live_source = repository.clone();

    if repository.archived {
        undo.unarchived_source = true;
        if steps
            .run("unarchiving source", move || source.unarchive_repository(source_org, name))
            .await
            .is_some()
        {
            live_source.archived = false;
        }
    }
    let snapshot = &live_source;

    if baseline.code_scanning_inactive() {
        undo.touched_source_ghas |= !steps.failed();
        steps
            .run("enabling code scanning at source", move || {
                source.change_ghas_repo_settings(
                    source_org,
                    snapshot,
                    SecuritySettings::code_scanning_only(),
                )
            })
            .await;
    }

    let baseline_analyses = if steps.failed() {
        0
    } else {
        let branch = repository.default_branch.as_str();
        let mut counting = StepRunner::new(name, ctx.retry);
        match counting
            .run("counting code scanning analyses at source", move || {
                source.get_code_scanning_analysis(source_org, name, branch)
            })
            .await
        {
            Some(analyses) => analyses.len(),
            None => {
                warn!("could not count code scanning analyses, assuming none");
                0
            }
        }
    };

    if baseline.is_configured() {
        undo.touched_source_ghas |= !steps.failed();
        steps
            .run("disabling GHAS at source", move || {
                source.change_ghas_repo_settings(
                    source_org,
                    snapshot,
                    SecuritySettings::all(FeatureStatus::Disabled),
                )
            })
            .await;
    }

    let active = steps
        .run("fetching active workflows at source", move || {
            source.get_all_active_workflows_for_repository(source_org, name)
        })
        .await
        .unwrap_or_default();
    if !active.is_empty() && !steps.failed() {
        undo.disabled_workflows = active.clone();
        let active = &active;
        steps
            .run("disabling workflows at source", move || {
                source.disable_workflows_for_repository(source_org, name, active)
            })
            .await;
    }

    steps
        .run("migrating repository", move || transfer.migrate_repo(name))
        .await;

    let imported = steps
        .run("fetching target repository", move || {
            target.get_repository(target_org, name)
        })
        .await;

    if let Some(mut imported) = imported {
        migrate_target(ctx, &mut steps, &mut undo, snapshot, &mut imported, baseline_analyses)
            .await;
    }

    let mut restore = StepRunner::new(name, ctx.retry);

    if undo.touched_source_ghas {
        let mut settings = SecuritySettings::from_snapshot(&baseline);
        if settings.advanced_security.is_none() {
            settings.advanced_security = Some(FeatureStatus::Disabled);
        }
        restore
            .run("restoring GHAS at source", move || {
                source.change_ghas_repo_settings(source_org, snapshot, settings)
            })
            .await;
    }

    if !undo.disabled_workflows.is_empty() {
        let disabled = &undo.disabled_workflows;
        restore
            .run("re-enabling workflows at source", move || {
                source.enable_workflows_for_repository(source_org, name, disabled)
            })
            .await;
    }

    if undo.unarchived_source {
        restore
            .run("re-archiving source", move || source.archive_repository(source_org, name))
            .await;
    }

    if !repository.archived && !restore.failed() {
        steps
            .run("archiving source", move || source.archive_repository(source_org, name))
            .await;
    }

    let outcome = steps.into_result().and(restore.into_result());
    match &outcome {
        Ok(()) => info!("repository migrated"),
        Err(failure) => error!(step = %failure.step, error = %failure.source, "repository migration failed"),
    }
    outcome
}

/// Brings the imported repository into shape on the target and moves code scanning alerts.
async fn migrate_target(
    ctx: &MigrationContext,
    steps: &mut StepRunner,
    undo: &mut Undo,
    source_snapshot: &Repository,
    imported: &mut Repository,
    baseline_analyses: usize,
) {
    let name = source_snapshot.name.as_str();
    let source = ctx.source.as_ref();
    let target = ctx.target.as_ref();
    let transfer = ctx.transfer.as_ref();
    let source_org = ctx.source_org.as_str();
    let target_org = ctx.target_org.as_str();
    let target_was_archived = imported.archived;

    let reactivated = steps
        .run("fetching active workflows at target", move || {
            target.get_all_active_workflows_for_repository(target_org, name)
        })
        .await
        .unwrap_or_default();
    if !reactivated.is_empty() {
        let reactivated = &reactivated;
        steps
            .run("disabling workflows at target", move || {
                target.disable_workflows_for_repository(target_org, name, reactivated)
            })
            .await;
    }

    if imported.archived
        && steps
            .run("unarchiving target", move || target.unarchive_repository(target_org, name))
            .await
            .is_some()
    {
        imported.archived = false;
    }

    steps
        .run("deleting branch protections at target", move || {
            target.delete_branch_protections(target_org, name)
        })
        .await;

    if imported.visibility == Visibility::Private
        && steps
            .run("changing target visibility to internal", move || {
                target.change_repository_visibility(target_org, name, Visibility::Internal)
            })
            .await
            .is_some()
    {
        info!(delay_secs = ctx.settle_delay.as_secs(), "waiting for visibility to settle");
        tokio::time::sleep(ctx.settle_delay).await;
        imported.visibility = Visibility::Internal;
    }

    let target_snapshot = &*imported;
    steps
        .run("activating GHAS at target", move || {
            target.change_ghas_repo_settings(
                target_org,
                target_snapshot,
                SecuritySettings::all(FeatureStatus::Enabled),
            )
        })
        .await;

    if baseline_analyses > 0 {
        undo.touched_source_ghas |= !steps.failed();
        steps
            .run("enabling code scanning at source", move || {
                source.change_ghas_repo_settings(
                    source_org,
                    source_snapshot,
                    SecuritySettings::code_scanning_only(),
                )
            })
            .await;
        steps
            .run("migrating code scanning alerts", move || {
                transfer.migrate_code_scanning(name)
            })
            .await;

        let branch = target_snapshot.default_branch.as_str();
        let landed = steps
            .run("counting code scanning analyses at target", move || {
                target.get_code_scanning_analysis(target_org, name, branch)
            })
            .await;
        match landed {
            Some(analyses) if analyses.is_empty() => {
                warn!(expected = baseline_analyses, "no code scanning analyses at target")
            }
            Some(analyses) => info!(count = analyses.len(), "code scanning analyses migrated"),
            None => {}
        }

        let code_scanning_off = SecuritySettings {
            advanced_security: Some(FeatureStatus::Disabled),
            ..SecuritySettings::default()
        };
        steps
            .run("disabling code scanning at source", move || {
                source.change_ghas_repo_settings(source_org, source_snapshot, code_scanning_off)
            })
            .await;
    }

    if target_was_archived {
        steps
            .run("re-archiving target", move || target.archive_repository(target_org, name))
            .await;
    }
}

/// Moves the code scanning alerts of `name` on their own, outside of a full pipeline run.
pub async fn migrate_code_scanning_alerts(
    ctx: &MigrationContext,
    name: &str,
) -> Result<(), StepFailure> {
    let transfer = ctx.transfer.as_ref();
    let mut steps = StepRunner::new(name, ctx.retry);
    steps
        .run("migrating code scanning alerts", move || {
            transfer.migrate_code_scanning(name)
        })
        .await;
    steps.into_result()
}
