use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::TransferError;

/// The external tool that copies repository content and alerts between organizations.
///
/// Each call blocks until the tool exits; there is no progress reporting.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn migrate_repo(&self, repository: &str) -> Result<(), TransferError>;

    async fn migrate_code_scanning(&self, repository: &str) -> Result<(), TransferError>;

    async fn migrate_secret_scanning(&self, repository: &str) -> Result<(), TransferError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Repository,
    CodeScanning,
    SecretScanning,
}

impl TransferKind {
    pub fn subcommand(&self) -> &'static str {
        match self {
            TransferKind::Repository => "migrate-repo",
            TransferKind::CodeScanning => "migrate-code-scanning-alerts",
            TransferKind::SecretScanning => "migrate-secret-alerts",
        }
    }
}

/// Runs the `gh gei` extension.
///
/// Tokens are handed over through `GH_SOURCE_PAT` / `GH_PAT` rather than the command line so
/// they never show up in the process list.
#[derive(Clone)]
pub struct GeiTransfer {
    pub program: String,
    pub source_org: String,
    pub target_org: String,
    source_token: String,
    target_token: String,
}

impl GeiTransfer {
    pub fn new(
        program: impl Into<String>,
        source_org: impl Into<String>,
        target_org: impl Into<String>,
        source_token: impl Into<String>,
        target_token: impl Into<String>,
    ) -> Self {
        GeiTransfer {
            program: program.into(),
            source_org: source_org.into(),
            target_org: target_org.into(),
            source_token: source_token.into(),
            target_token: target_token.into(),
        }
    }

    pub fn arguments(&self, kind: TransferKind, repository: &str) -> Vec<String> {
        let (source_flag, target_flag) = match kind {
            TransferKind::Repository => ("--github-source-org", "--github-target-org"),
            TransferKind::CodeScanning | TransferKind::SecretScanning => {
                ("--source-org", "--target-org")
            }
        };

        vec![
            "gei".to_string(),
            kind.subcommand().to_string(),
            "--source-repo".to_string(),
            repository.to_string(),
            source_flag.to_string(),
            self.source_org.clone(),
            target_flag.to_string(),
            self.target_org.clone(),
        ]
    }

    async fn invoke(&self, kind: TransferKind, repository: &str) -> Result<(), TransferError> {
        debug!(repository, operation = kind.subcommand(), "invoking gei");

        let output = Command::new(&self.program)
            .args(self.arguments(kind, repository))
            .env("GH_SOURCE_PAT", &self.source_token)
            .env("GH_PAT", &self.target_token)
            .output()
            .await
            .map_err(|source| TransferError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!(repository, operation = kind.subcommand(), %stderr, "gei failed");
        Err(TransferError::Failed {
            operation: kind.subcommand(),
            repository: repository.to_string(),
            code: output.status.code(),
            stderr,
        })
    }
}

#[async_trait]
impl Transfer for GeiTransfer {
    async fn migrate_repo(&self, repository: &str) -> Result<(), TransferError> {
        self.invoke(TransferKind::Repository, repository).await
    }

    async fn migrate_code_scanning(&self, repository: &str) -> Result<(), TransferError> {
        self.invoke(TransferKind::CodeScanning, repository).await
    }

    async fn migrate_secret_scanning(&self, repository: &str) -> Result<(), TransferError> {
        self.invoke(TransferKind::SecretScanning, repository).await
    }
}
