use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{FeatureStatus, Repository};

/// Outcome of one organization run, persisted to disk and posted on the marker issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub timestamp: DateTime<Utc>,
    pub source_org: String,
    pub target_org: String,
    pub migrated: Vec<RepoStatus>,
    pub failed: Vec<RepoStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStatus {
    pub name: String,
    pub id: u64,
    pub archived: bool,
    pub code_scanning: FeatureStatus,
    pub secret_scanning: FeatureStatus,
    pub push_protection: FeatureStatus,
}

impl From<&Repository> for RepoStatus {
    fn from(repository: &Repository) -> Self {
        let security = repository.security;
        let or_disabled = |status: Option<FeatureStatus>| status.unwrap_or(FeatureStatus::Disabled);

        RepoStatus {
            name: repository.name.clone(),
            id: repository.id,
            archived: repository.archived,
            code_scanning: or_disabled(security.advanced_security),
            secret_scanning: or_disabled(security.secret_scanning),
            push_protection: or_disabled(security.push_protection),
        }
    }
}

impl MigrationResult {
    /// Splits pipeline outcomes into migrated and failed, sorted by name.
    pub fn from_outcomes<'a, E: 'a>(
        source_org: &str,
        target_org: &str,
        outcomes: impl IntoIterator<Item = (&'a Repository, &'a Option<E>)>,
    ) -> Self {
        let mut migrated = Vec::new();
        let mut failed = Vec::new();

        for (repository, error) in outcomes {
            let status = RepoStatus::from(repository);
            match error {
                None => migrated.push(status),
                Some(_) => failed.push(status),
            }
        }
        migrated.sort_by(|a, b| a.name.cmp(&b.name));
        failed.sort_by(|a, b| a.name.cmp(&b.name));

        MigrationResult {
            timestamp: Utc::now(),
            source_org: source_org.to_string(),
            target_org: target_org.to_string(),
            migrated,
            failed,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
