//! Organization-wide runs.
//!
//! The only persisted state is the `migration-status` repository in the target organization:
//!
//! - absent: nothing was started yet
//! - present without issue #1: a run is ongoing or crashed
//! - present with issue #1: a run finished; the issue body is its report
//!
//! A new run is only started from the first state.

use async_trait::async_trait;
use glob::Pattern;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{GatewayError, MigrationError, StepFailure};
use crate::model::Repository;
use crate::pipeline::{migrate_repository, MigrationContext};
use crate::report::MigrationResult;
use crate::step::StepRunner;
use crate::worker::{JobError, JobResult, Processor, WorkerPool, DEFAULT_WORKERS};

pub const MARKER_REPOSITORY: &str = "migration-status";
pub const MARKER_ISSUE: u64 = 1;
pub const REPORT_TITLE: &str = "Migration result";
pub const DEFAULT_REPORT_PATH: &str = "migration-result.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerState {
    NotStarted,
    InProgress { url: String },
    Completed { url: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationStatus {
    NotStarted,
    InProgress {
        migrated: Vec<String>,
        pending: Vec<String>,
    },
    Completed {
        url: String,
    },
}

struct RepositoryProcessor {
    ctx: MigrationContext,
}

#[async_trait]
impl Processor<Repository> for RepositoryProcessor {
    type Error = StepFailure;

    async fn process(&self, repository: &Repository) -> Result<(), StepFailure> {
        migrate_repository(&self.ctx, repository).await
    }
}

pub struct OrganizationMigration {
    ctx: MigrationContext,
    workers: usize,
    exclude: Vec<Pattern>,
    report_path: PathBuf,
}

impl OrganizationMigration {
    pub fn new(ctx: MigrationContext) -> Self {
        OrganizationMigration {
            ctx,
            workers: DEFAULT_WORKERS,
            exclude: Vec::new(),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn exclude(mut self, patterns: Vec<Pattern>) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = path.into();
        self
    }

    fn marker_url(&self) -> String {
        format!("https://github.com/{}/{}", self.ctx.target_org, MARKER_REPOSITORY)
    }

    pub async fn marker_state(&self) -> Result<MarkerState, GatewayError> {
        let target = &self.ctx.target;
        let owner = self.ctx.target_org.as_str();

        match target.get_repository(owner, MARKER_REPOSITORY).await {
            Err(GatewayError::RepositoryNotFound { .. }) => return Ok(MarkerState::NotStarted),
            Err(err) => return Err(err),
            Ok(_) => {}
        }

        match target.get_issue(owner, MARKER_REPOSITORY, MARKER_ISSUE).await {
            Ok(issue) => Ok(MarkerState::Completed {
                url: issue.html_url,
            }),
            Err(GatewayError::IssueNotFound { .. }) => Ok(MarkerState::InProgress {
                url: self.marker_url(),
            }),
            Err(err) => Err(err),
        }
    }

    /// Source repositories that are neither excluded nor already present at the target.
    pub async fn repositories_to_migrate(&self) -> Result<Vec<Repository>, MigrationError> {
        let (source, target) = self.fetch_repositories().await?;
        Ok(partition(source, &target, &self.exclude).1)
    }

    /// Runs every pending repository through the pipeline and records the result.
    pub async fn migrate(&self) -> Result<MigrationResult, MigrationError> {
        self.claim_marker().await?;

        let target_org = self.ctx.target_org.as_str();
        let target = self.ctx.target.as_ref();
        let mut steps = StepRunner::new(target_org, self.ctx.retry);
        steps
            .run("deactivating GHAS at target organization", move || {
                target.change_ghas_org_settings(target_org, false)
            })
            .await;
        steps.into_result()?;

        let pending = self.repositories_to_migrate().await?;
        info!(count = pending.len(), workers = self.workers, "starting migration");

        let processor = Arc::new(RepositoryProcessor {
            ctx: self.ctx.clone(),
        });
        let pool = WorkerPool::start(self.workers, processor);
        let mut submitted = 0;
        for repository in &pending {
            match pool.submit(repository.clone()) {
                Ok(()) => submitted += 1,
                Err(repository) => {
                    error!(repository = %repository.name, "no worker left to take the job")
                }
            }
        }
        let outcomes = account_for_every_job(&pending, pool.drain(submitted).await);
        for outcome in &outcomes {
            if let Some(err) = &outcome.error {
                error!(repository = %outcome.job.name, error = %err, "repository migration failed");
            }
        }

        let report = MigrationResult::from_outcomes(
            &self.ctx.source_org,
            &self.ctx.target_org,
            outcomes.iter().map(|result| (&result.job, &result.error)),
        );
        info!(
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            "migration finished"
        );

        self.record(&report).await?;
        Ok(report)
    }

    /// Read-only view of the marker, with progress while a run is ongoing.
    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        match self.marker_state().await? {
            MarkerState::NotStarted => Ok(MigrationStatus::NotStarted),
            MarkerState::Completed { url } => Ok(MigrationStatus::Completed { url }),
            MarkerState::InProgress { .. } => {
                let (source, target) = self.fetch_repositories().await?;
                let (migrated, pending) = partition(source, &target, &self.exclude);
                let names = |repositories: Vec<Repository>| {
                    repositories.into_iter().map(|r| r.name).collect::<Vec<_>>()
                };
                Ok(MigrationStatus::InProgress {
                    migrated: names(migrated),
                    pending: names(pending),
                })
            }
        }
    }

    async fn claim_marker(&self) -> Result<(), MigrationError> {
        match self.marker_state().await? {
            MarkerState::Completed { url } => return Err(MigrationError::AlreadyCompleted { url }),
            MarkerState::InProgress { url } => return Err(MigrationError::InProgress { url }),
            MarkerState::NotStarted => {}
        }

        let owner = self.ctx.target_org.as_str();
        match self.ctx.target.create_repository(owner, MARKER_REPOSITORY).await {
            Ok(()) => {
                info!(repository = MARKER_REPOSITORY, "created marker repository");
                Ok(())
            }
            Err(GatewayError::RepositoryAlreadyExists { .. }) => {
                warn!("marker repository appeared concurrently");
                Err(MigrationError::InProgress {
                    url: self.marker_url(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch_repositories(&self) -> Result<(Vec<Repository>, Vec<Repository>), MigrationError> {
        let source = self.ctx.source.as_ref();
        let target = self.ctx.target.as_ref();
        let source_org = self.ctx.source_org.as_str();
        let target_org = self.ctx.target_org.as_str();

        let mut steps = StepRunner::new(source_org, self.ctx.retry);
        let source_repositories = steps
            .run("listing source repositories", move || source.get_repositories(source_org))
            .await;
        let target_repositories = steps
            .run("listing target repositories", move || target.get_repositories(target_org))
            .await;

        steps.into_result()?;

        Ok((
            source_repositories.unwrap_or_default(),
            target_repositories.unwrap_or_default(),
        ))
    }

    async fn record(&self, report: &MigrationResult) -> Result<(), MigrationError> {
        let json = report.to_json()?;
        tokio::fs::write(&self.report_path, &json)
            .await
            .map_err(|source| MigrationError::WriteReport {
                path: self.report_path.clone(),
                source,
            })?;
        info!(path = %self.report_path.display(), "wrote migration report");

        let target = self.ctx.target.as_ref();
        let owner = self.ctx.target_org.as_str();
        let body = json.as_str();
        let mut steps = StepRunner::new(MARKER_REPOSITORY, self.ctx.retry);
        steps
            .run("creating migration result issue", move || {
                target.create_issue(owner, MARKER_REPOSITORY, REPORT_TITLE, body)
            })
            .await;
        steps.into_result().map_err(MigrationError::Finalize)
    }
}

/// Adds an `Unprocessed` failure for every pending repository that produced no result.
fn account_for_every_job(
    pending: &[Repository],
    mut outcomes: Vec<JobResult<Repository, StepFailure>>,
) -> Vec<JobResult<Repository, StepFailure>> {
    let reported: HashSet<String> = outcomes.iter().map(|r| r.job.name.clone()).collect();
    for repository in pending {
        if !reported.contains(&repository.name) {
            outcomes.push(JobResult {
                job: repository.clone(),
                error: Some(JobError::Unprocessed),
            });
        }
    }
    outcomes
}

/// Splits source repositories into those already present at the target and those still to
/// migrate, after dropping the excluded names. Presence is decided by name alone.
pub fn partition(
    source: Vec<Repository>,
    target: &[Repository],
    exclude: &[Pattern],
) -> (Vec<Repository>, Vec<Repository>) {
    let present: HashSet<&str> = target.iter().map(|r| r.name.as_str()).collect();

    source
        .into_iter()
        .filter(|r| !exclude.iter().any(|pattern| pattern.matches(&r.name)))
        .partition(|r| present.contains(r.name.as_str()))
}
