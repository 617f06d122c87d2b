use async_trait::async_trait;

use crate::branch_protection;
use crate::error::GatewayError;
use crate::model::{
    BranchProtectionPage, CodeScanningAnalysis, Issue, Repository, SecuritySettings, Visibility,
    Workflow,
};

/// Typed operations against the source control host.
///
/// One provider is bound to one set of credentials; the organization is passed on every call.
/// Implementations fold "already in the desired state" answers into `Ok`:
/// a 422 on visibility changes and workflow enabling, a 403 on archive toggles.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fails with `GatewayError::RepositoryNotFound` on a 404.
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, GatewayError>;

    async fn get_repositories(&self, owner: &str) -> Result<Vec<Repository>, GatewayError>;

    /// Logins of every organization in the `enterprise` slug.
    async fn get_enterprise_organizations(
        &self,
        enterprise: &str,
    ) -> Result<Vec<String>, GatewayError>;

    /// Toggles GHAS for repositories created in the organization from now on.
    async fn change_ghas_org_settings(&self, owner: &str, activate: bool)
        -> Result<(), GatewayError>;

    async fn change_ghas_repo_settings(
        &self,
        owner: &str,
        repository: &Repository,
        settings: SecuritySettings,
    ) -> Result<(), GatewayError>;

    async fn change_repository_visibility(
        &self,
        owner: &str,
        name: &str,
        visibility: Visibility,
    ) -> Result<(), GatewayError>;

    async fn archive_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError>;

    async fn unarchive_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError>;

    async fn get_all_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<Workflow>, GatewayError>;

    async fn get_all_active_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<Workflow>, GatewayError> {
        let workflows = self.get_all_workflows_for_repository(owner, name).await?;
        Ok(workflows.into_iter().filter(Workflow::is_active).collect())
    }

    async fn disable_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
        workflows: &[Workflow],
    ) -> Result<(), GatewayError>;

    async fn enable_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
        workflows: &[Workflow],
    ) -> Result<(), GatewayError>;

    /// One page (at most 100 ids) of branch protection rules, starting after `cursor`.
    async fn list_branch_protection_rules(
        &self,
        owner: &str,
        name: &str,
        cursor: Option<&str>,
    ) -> Result<BranchProtectionPage, GatewayError>;

    async fn delete_branch_protection_rule(&self, rule_id: &str) -> Result<(), GatewayError>;

    /// Deletes every branch protection rule of the repository, returning how many were removed.
    async fn delete_branch_protections(&self, owner: &str, name: &str) -> Result<usize, GatewayError> {
        branch_protection::delete_all(self, owner, name).await
    }

    /// Analyses on `git_ref`; a repository without code scanning yields an empty list.
    async fn get_code_scanning_analysis(
        &self,
        owner: &str,
        name: &str,
        git_ref: &str,
    ) -> Result<Vec<CodeScanningAnalysis>, GatewayError>;

    /// Fails with `GatewayError::RepositoryAlreadyExists` when the name is taken.
    async fn create_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError>;

    async fn create_issue(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
        body: &str,
    ) -> Result<Issue, GatewayError>;

    /// Fails with `GatewayError::IssueNotFound` on a 404.
    async fn get_issue(
        &self,
        owner: &str,
        repository: &str,
        number: u64,
    ) -> Result<Issue, GatewayError>;
}
