//! Typed error hierarchy.
//!
//! - `GatewayError`: calls against the source control host
//! - `TransferError`: invocations of the external transfer tool
//! - `StepFailure`: the terminal error of a repository pipeline
//! - `MigrationError`: organization-level aborts
//! - `ConfigError`: invalid or incomplete configuration

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("repository {owner}/{name} not found")]
    RepositoryNotFound { owner: String, name: String },

    #[error("issue #{number} not found in {owner}/{repository}")]
    IssueNotFound {
        owner: String,
        repository: String,
        number: u64,
    },

    #[error("repository {owner}/{name} already exists")]
    RepositoryAlreadyExists { owner: String, name: String },

    #[error("GitHub responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("GitHub API error: {}", describe_api_error(.0))]
    Api(#[from] octocrab::Error),
}

/// Status code and server message for GitHub answers, the client's own text otherwise.
fn describe_api_error(err: &octocrab::Error) -> String {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            format!("{} {}", source.status_code.as_u16(), source.message)
        }
        other => other.to_string(),
    }
}

impl GatewayError {
    /// HTTP status code of the failed call, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::RepositoryNotFound { .. } | GatewayError::IssueNotFound { .. } => {
                Some(404)
            }
            GatewayError::RepositoryAlreadyExists { .. } => Some(422),
            GatewayError::Status { status, .. } => Some(*status),
            GatewayError::Api(octocrab::Error::GitHub { source, .. }) => {
                Some(source.status_code.as_u16())
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::RepositoryNotFound { .. } | GatewayError::IssueNotFound { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} for {repository} exited with {code:?}: {stderr}")]
    Failed {
        operation: &'static str,
        repository: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Anything a single pipeline step can fail with.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// A step that kept failing after every retry.
#[derive(Debug, Error)]
#[error("step `{step}` failed for {repository}: {source}")]
pub struct StepFailure {
    pub step: String,
    pub repository: String,
    #[source]
    pub source: StepError,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("a migration to this organization was already executed, see {url} for its result")]
    AlreadyCompleted { url: String },

    #[error(
        "a migration to this organization is either ongoing or finished in error \
         (remove {url} to start over)"
    )]
    InProgress { url: String },

    #[error("could not prepare the migration: {0}")]
    Precondition(#[from] StepFailure),

    #[error("could not record the migration result: {0}")]
    Finalize(#[source] StepFailure),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("could not serialize the migration report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not write the migration report to {path}: {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse the configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("`{0}` is required, pass it on the command line or in the configuration file")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("invalid exclude pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
