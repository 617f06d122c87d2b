use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{FakeProvider, Failure, Faults, Journal};
use crate::error::TransferError;
use crate::model::{SecurityAndAnalysis, Visibility, Workflow, WorkflowState};
use crate::transfer::{Transfer, TransferKind};

/// Copies repositories between two `FakeProvider`s the way the import tool leaves them:
/// private, without GHAS, with every workflow active again.
pub struct FakeTransfer {
    source: Arc<FakeProvider>,
    target: Arc<FakeProvider>,
    journal: Journal,
    faults: Mutex<Faults>,
    broken: Mutex<HashSet<String>>,
    archive_imports: AtomicBool,
}

impl FakeTransfer {
    pub fn new(source: Arc<FakeProvider>, target: Arc<FakeProvider>) -> Self {
        let journal = source.journal();
        FakeTransfer {
            source,
            target,
            journal,
            faults: Mutex::new(Faults::default()),
            broken: Mutex::new(HashSet::new()),
            archive_imports: AtomicBool::new(false),
        }
    }

    /// Imported repositories land archived on the target.
    pub fn archive_imports(&self) {
        self.archive_imports.store(true, Ordering::SeqCst);
    }

    pub fn fail_always(&self, kind: TransferKind) {
        let mut faults = self.faults.lock().unwrap();
        faults
            .failures
            .insert(kind.subcommand().to_string(), Failure::Always);
    }

    pub fn fail(&self, kind: TransferKind, times: u32) {
        let mut faults = self.faults.lock().unwrap();
        faults
            .failures
            .insert(kind.subcommand().to_string(), Failure::Times(times));
    }

    /// Every repository transfer of `repository` fails.
    pub fn break_repository(&self, repository: &str) {
        self.broken.lock().unwrap().insert(repository.to_string());
    }

    pub fn calls(&self, kind: TransferKind) -> usize {
        self.faults.lock().unwrap().calls(kind.subcommand())
    }

    fn enter(&self, kind: TransferKind, repository: &str) -> Result<(), TransferError> {
        let operation = kind.subcommand();
        self.journal
            .record(format!("transfer:{} {}", operation, repository));
        let mut faults = self.faults.lock().unwrap();
        faults
            .enter(operation)
            .map_err(|err| TransferError::Failed {
                operation,
                repository: repository.to_string(),
                code: Some(1),
                stderr: err.to_string(),
            })
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn migrate_repo(&self, repository: &str) -> Result<(), TransferError> {
        self.enter(TransferKind::Repository, repository)?;

        let failed = |stderr: &str| TransferError::Failed {
            operation: TransferKind::Repository.subcommand(),
            repository: repository.to_string(),
            code: Some(1),
            stderr: stderr.to_string(),
        };
        let original = self
            .source
            .repository(repository)
            .ok_or_else(|| failed("source repository not found"))?;
        if self.broken.lock().unwrap().contains(repository) {
            return Err(failed("fatal: could not read from remote repository"));
        }
        if self.target.repository(repository).is_some() {
            return Err(failed("target repository already exists"));
        }

        let mut imported = original.clone();
        imported.id = original.id + 1000;
        imported.visibility = Visibility::Private;
        imported.archived = self.archive_imports.load(Ordering::SeqCst);
        imported.security = SecurityAndAnalysis::default();
        self.target.insert_repository(imported);

        let workflows: Vec<Workflow> = self
            .source
            .workflows(repository)
            .into_iter()
            .map(|workflow| Workflow {
                state: WorkflowState::Active,
                ..workflow
            })
            .collect();
        self.target.set_workflows(repository, workflows);
        self.target
            .add_branch_protection_rules(repository, self.source.branch_protection_rules(repository));
        Ok(())
    }

    async fn migrate_code_scanning(&self, repository: &str) -> Result<(), TransferError> {
        self.enter(TransferKind::CodeScanning, repository)?;
        self.target
            .set_analyses(repository, self.source.analyses(repository));
        Ok(())
    }

    async fn migrate_secret_scanning(&self, repository: &str) -> Result<(), TransferError> {
        self.enter(TransferKind::SecretScanning, repository)
    }
}
