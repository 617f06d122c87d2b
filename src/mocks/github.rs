use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Failure, Faults, Journal};
use crate::error::GatewayError;
use crate::model::{
    BranchProtectionPage, CodeScanningAnalysis, FeatureStatus, Issue, Repository,
    SecurityAndAnalysis, SecuritySettings, Visibility, Workflow, WorkflowState,
};
use crate::provider::Provider;

#[derive(Default)]
struct State {
    repositories: BTreeMap<String, Repository>,
    workflows: BTreeMap<String, Vec<Workflow>>,
    branch_rules: BTreeMap<String, Vec<String>>,
    analyses: BTreeMap<String, usize>,
    issues: BTreeMap<String, Vec<Issue>>,
    org_ghas: Option<bool>,
    org_ghas_by_owner: BTreeMap<String, bool>,
    enterprises: BTreeMap<String, Vec<String>>,
    next_rule: usize,
    next_id: u64,
    faults: Faults,
}

/// One organization held in memory, behaving like the GitHub endpoints the gateway wraps.
///
/// Settings edits on archived repositories are rejected with a 403, as GitHub does.
pub struct FakeProvider {
    side: &'static str,
    owner: String,
    journal: Journal,
    state: Mutex<State>,
}

impl FakeProvider {
    pub fn new(side: &'static str, owner: &str) -> Self {
        Self::with_journal(side, owner, Journal::default())
    }

    pub fn with_journal(side: &'static str, owner: &str, journal: Journal) -> Self {
        FakeProvider {
            side,
            owner: owner.to_string(),
            journal,
            state: Mutex::new(State {
                next_id: 1000,
                ..State::default()
            }),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn insert_repository(&self, repository: Repository) {
        let mut state = self.state.lock().unwrap();
        state
            .repositories
            .insert(repository.name.clone(), repository);
    }

    pub fn repository(&self, name: &str) -> Option<Repository> {
        self.state.lock().unwrap().repositories.get(name).cloned()
    }

    pub fn repository_names(&self) -> Vec<String> {
        self.state.lock().unwrap().repositories.keys().cloned().collect()
    }

    pub fn set_workflows(&self, name: &str, workflows: Vec<Workflow>) {
        self.state
            .lock()
            .unwrap()
            .workflows
            .insert(name.to_string(), workflows);
    }

    pub fn workflows(&self, name: &str) -> Vec<Workflow> {
        let state = self.state.lock().unwrap();
        state.workflows.get(name).cloned().unwrap_or_default()
    }

    pub fn add_branch_protection_rules(&self, name: &str, count: usize) {
        let mut state = self.state.lock().unwrap();
        let start = state.next_rule;
        state.next_rule += count;
        let rules = state.branch_rules.entry(name.to_string()).or_default();
        rules.extend((start..start + count).map(|n| format!("BPR_{}", n)));
    }

    pub fn branch_protection_rules(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.branch_rules.get(name).map_or(0, Vec::len)
    }

    pub fn set_analyses(&self, name: &str, count: usize) {
        self.state
            .lock()
            .unwrap()
            .analyses
            .insert(name.to_string(), count);
    }

    pub fn analyses(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.analyses.get(name).copied().unwrap_or(0)
    }

    pub fn issues(&self, repository: &str) -> Vec<Issue> {
        let state = self.state.lock().unwrap();
        state.issues.get(repository).cloned().unwrap_or_default()
    }

    pub fn org_ghas(&self) -> Option<bool> {
        self.state.lock().unwrap().org_ghas
    }

    /// Last GHAS default set for `owner`, which need not be this provider's organization.
    pub fn org_ghas_of(&self, owner: &str) -> Option<bool> {
        self.state.lock().unwrap().org_ghas_by_owner.get(owner).copied()
    }

    pub fn set_enterprise_organizations(&self, enterprise: &str, organizations: &[&str]) {
        self.state.lock().unwrap().enterprises.insert(
            enterprise.to_string(),
            organizations.iter().map(|o| o.to_string()).collect(),
        );
    }

    /// Fails the next `times` calls of `operation`.
    pub fn fail(&self, operation: &str, times: u32) {
        self.inject(operation, Failure::Times(times));
    }

    pub fn fail_always(&self, operation: &str) {
        self.inject(operation, Failure::Always);
    }

    /// Lets `successes` calls of `operation` through, then fails every later one.
    pub fn fail_after(&self, operation: &str, successes: u32) {
        self.inject(operation, Failure::After(successes));
    }

    pub fn calls_named(&self, operation: &str) -> usize {
        self.state.lock().unwrap().faults.calls(operation)
    }

    fn inject(&self, operation: &str, failure: Failure) {
        let mut state = self.state.lock().unwrap();
        state.faults.failures.insert(operation.to_string(), failure);
    }

    fn enter(&self, operation: &str, detail: String) -> Result<std::sync::MutexGuard<'_, State>, GatewayError> {
        self.journal
            .record(format!("{}:{} {}", self.side, operation, detail));
        let mut state = self.state.lock().unwrap();
        state.faults.enter(operation)?;
        Ok(state)
    }

    fn not_found(&self, name: &str) -> GatewayError {
        GatewayError::RepositoryNotFound {
            owner: self.owner.clone(),
            name: name.to_string(),
        }
    }
}

fn read_only(name: &str) -> GatewayError {
    GatewayError::Status {
        status: 403,
        message: format!("Repository {} was archived so is read-only.", name),
    }
}

fn apply(security: &mut SecurityAndAnalysis, visibility: Visibility, settings: SecuritySettings) {
    if visibility == Visibility::Public {
        security.advanced_security = Some(FeatureStatus::Enabled);
    } else if settings.advanced_security.is_some() {
        security.advanced_security = settings.advanced_security;
    }
    if settings.secret_scanning.is_some() {
        security.secret_scanning = settings.secret_scanning;
    }
    if settings.push_protection.is_some() {
        security.push_protection = settings.push_protection;
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn get_repository(&self, _owner: &str, name: &str) -> Result<Repository, GatewayError> {
        let state = self.enter("get-repository", name.to_string())?;
        state
            .repositories
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    async fn get_repositories(&self, owner: &str) -> Result<Vec<Repository>, GatewayError> {
        let state = self.enter("get-repositories", owner.to_string())?;
        Ok(state.repositories.values().cloned().collect())
    }

    async fn get_enterprise_organizations(
        &self,
        enterprise: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let state = self.enter("get-enterprise-organizations", enterprise.to_string())?;
        state
            .enterprises
            .get(enterprise)
            .cloned()
            .ok_or_else(|| {
                GatewayError::GraphQl(format!(
                    "Could not resolve to an Enterprise with the slug of '{}'.",
                    enterprise
                ))
            })
    }

    async fn change_ghas_org_settings(
        &self,
        owner: &str,
        activate: bool,
    ) -> Result<(), GatewayError> {
        let mut state = self.enter("change-ghas-org-settings", format!("{} {}", owner, activate))?;
        state.org_ghas = Some(activate);
        state.org_ghas_by_owner.insert(owner.to_string(), activate);
        Ok(())
    }

    async fn change_ghas_repo_settings(
        &self,
        _owner: &str,
        repository: &Repository,
        settings: SecuritySettings,
    ) -> Result<(), GatewayError> {
        let name = repository.name.as_str();
        let mut state =
            self.enter("change-ghas-repo-settings", format!("{} {}", name, settings))?;
        let stored = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| self.not_found(name))?;
        if stored.archived {
            return Err(read_only(name));
        }
        let visibility = stored.visibility;
        apply(&mut stored.security, visibility, settings);
        Ok(())
    }

    async fn change_repository_visibility(
        &self,
        _owner: &str,
        name: &str,
        visibility: Visibility,
    ) -> Result<(), GatewayError> {
        let mut state =
            self.enter("change-repository-visibility", format!("{} {}", name, visibility))?;
        let stored = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| self.not_found(name))?;
        if stored.archived {
            return Err(read_only(name));
        }
        stored.visibility = visibility;
        Ok(())
    }

    async fn archive_repository(&self, _owner: &str, name: &str) -> Result<(), GatewayError> {
        let mut state = self.enter("archive-repository", name.to_string())?;
        let stored = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| self.not_found(name))?;
        stored.archived = true;
        Ok(())
    }

    async fn unarchive_repository(&self, _owner: &str, name: &str) -> Result<(), GatewayError> {
        let mut state = self.enter("unarchive-repository", name.to_string())?;
        let stored = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| self.not_found(name))?;
        stored.archived = false;
        Ok(())
    }

    async fn get_all_workflows_for_repository(
        &self,
        _owner: &str,
        name: &str,
    ) -> Result<Vec<Workflow>, GatewayError> {
        let state = self.enter("get-workflows", name.to_string())?;
        Ok(state.workflows.get(name).cloned().unwrap_or_default())
    }

    async fn disable_workflows_for_repository(
        &self,
        _owner: &str,
        name: &str,
        workflows: &[Workflow],
    ) -> Result<(), GatewayError> {
        let mut state = self.enter("disable-workflows", format!("{} {}", name, workflows.len()))?;
        set_state(&mut state, name, workflows, WorkflowState::DisabledManually);
        Ok(())
    }

    async fn enable_workflows_for_repository(
        &self,
        _owner: &str,
        name: &str,
        workflows: &[Workflow],
    ) -> Result<(), GatewayError> {
        let mut state = self.enter("enable-workflows", format!("{} {}", name, workflows.len()))?;
        set_state(&mut state, name, workflows, WorkflowState::Active);
        Ok(())
    }

    async fn list_branch_protection_rules(
        &self,
        _owner: &str,
        name: &str,
        cursor: Option<&str>,
    ) -> Result<BranchProtectionPage, GatewayError> {
        let state = self.enter(
            "list-branch-protection-rules",
            format!("{} {}", name, cursor.unwrap_or("-")),
        )?;
        let rules = state.branch_rules.get(name).cloned().unwrap_or_default();
        let offset = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (offset + crate::branch_protection::PAGE_SIZE).min(rules.len());
        let ids = rules.get(offset..end).map(<[String]>::to_vec).unwrap_or_default();

        Ok(BranchProtectionPage {
            ids,
            end_cursor: Some(end.to_string()),
            has_next_page: end < rules.len(),
        })
    }

    async fn delete_branch_protection_rule(&self, rule_id: &str) -> Result<(), GatewayError> {
        let mut state = self.enter("delete-branch-protection-rule", rule_id.to_string())?;
        for rules in state.branch_rules.values_mut() {
            if let Some(index) = rules.iter().position(|id| id == rule_id) {
                rules.remove(index);
                return Ok(());
            }
        }
        Err(GatewayError::GraphQl(format!(
            "Could not resolve to a node with the global id of '{}'",
            rule_id
        )))
    }

    async fn get_code_scanning_analysis(
        &self,
        _owner: &str,
        name: &str,
        git_ref: &str,
    ) -> Result<Vec<CodeScanningAnalysis>, GatewayError> {
        let state = self.enter("get-code-scanning-analysis", format!("{} {}", name, git_ref))?;
        let count = state.analyses.get(name).copied().unwrap_or(0);
        Ok((0..count as u64)
            .map(|id| CodeScanningAnalysis {
                id,
                git_ref: format!("refs/heads/{}", git_ref),
            })
            .collect())
    }

    async fn create_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError> {
        let mut state = self.enter("create-repository", name.to_string())?;
        if state.repositories.contains_key(name) {
            return Err(GatewayError::RepositoryAlreadyExists {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
        state.next_id += 1;
        let repository = Repository {
            id: state.next_id,
            name: name.to_string(),
            archived: false,
            visibility: Visibility::Private,
            default_branch: "main".to_string(),
            security: SecurityAndAnalysis::default(),
        };
        state.repositories.insert(name.to_string(), repository);
        Ok(())
    }

    async fn create_issue(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
        body: &str,
    ) -> Result<Issue, GatewayError> {
        let mut state = self.enter("create-issue", format!("{} {}", repository, title))?;
        if !state.repositories.contains_key(repository) {
            return Err(self.not_found(repository));
        }
        let issues = state.issues.entry(repository.to_string()).or_default();
        let number = issues.len() as u64 + 1;
        let issue = Issue {
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            html_url: format!("https://github.com/{}/{}/issues/{}", owner, repository, number),
        };
        issues.push(issue.clone());
        Ok(issue)
    }

    async fn get_issue(
        &self,
        owner: &str,
        repository: &str,
        number: u64,
    ) -> Result<Issue, GatewayError> {
        let state = self.enter("get-issue", format!("{} {}", repository, number))?;
        state
            .issues
            .get(repository)
            .and_then(|issues| issues.iter().find(|issue| issue.number == number))
            .cloned()
            .ok_or_else(|| GatewayError::IssueNotFound {
                owner: owner.to_string(),
                repository: repository.to_string(),
                number,
            })
    }
}

fn set_state(state: &mut State, name: &str, workflows: &[Workflow], to: WorkflowState) {
    if let Some(stored) = state.workflows.get_mut(name) {
        for workflow in stored.iter_mut() {
            if workflows.iter().any(|w| w.id == workflow.id) {
                workflow.state = to.clone();
            }
        }
    }
}
