use std::collections::HashSet;

use tracing::info;

use crate::error::StepFailure;
use crate::model::Workflow;
use crate::pipeline::MigrationContext;
use crate::step::StepRunner;

/// Enables, on the target, the workflows whose name matches a workflow active on the source.
///
/// Returns how many target workflows were enabled. Nothing is enabled when the source has no
/// active workflow.
pub async fn reactivate_target_workflows(
    ctx: &MigrationContext,
    name: &str,
) -> Result<usize, StepFailure> {
    let source = ctx.source.as_ref();
    let target = ctx.target.as_ref();
    let source_org = ctx.source_org.as_str();
    let target_org = ctx.target_org.as_str();
    let mut steps = StepRunner::new(name, ctx.retry);

    let active = steps
        .run("fetching active workflows at source", move || {
            source.get_all_active_workflows_for_repository(source_org, name)
        })
        .await
        .unwrap_or_default();
    let existing = steps
        .run("fetching workflows at target", move || {
            target.get_all_workflows_for_repository(target_org, name)
        })
        .await
        .unwrap_or_default();

    let matching = matching_workflows(&active, existing);
    if !active.is_empty() {
        let matching = &matching;
        steps
            .run("enabling workflows at target", move || {
                target.enable_workflows_for_repository(target_org, name, matching)
            })
            .await;
    }
    steps.into_result()?;

    info!(repository = name, enabled = matching.len(), "reactivated target workflows");
    Ok(matching.len())
}

fn matching_workflows(active: &[Workflow], target: Vec<Workflow>) -> Vec<Workflow> {
    let names: HashSet<&str> = active.iter().map(|w| w.name.as_str()).collect();
    target
        .into_iter()
        .filter(|w| names.contains(w.name.as_str()))
        .collect()
}
