use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::GatewayError;
use crate::model::{
    BranchProtectionPage, CodeScanningAnalysis, FeatureStatus, Issue, Repository,
    SecurityAndAnalysis, SecuritySettings, Visibility, Workflow,
};
use crate::provider::Provider;

const PER_PAGE: usize = 100;

const BRANCH_PROTECTION_RULES_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    branchProtectionRules(first: 100, after: $cursor) {
      nodes { id }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const ENTERPRISE_ORGANIZATIONS_QUERY: &str = r#"
query($slug: String!, $cursor: String) {
  enterprise(slug: $slug) {
    organizations(first: 100, after: $cursor) {
      nodes { login }
      pageInfo { endCursor hasNextPage }
    }
  }
}"#;

const DELETE_BRANCH_PROTECTION_RULE_MUTATION: &str = r#"
mutation($id: ID!) {
  deleteBranchProtectionRule(input: { branchProtectionRuleId: $id }) {
    clientMutationId
  }
}"#;

/// Gateway backed by the GitHub REST and GraphQL APIs.
#[derive(Clone)]
pub struct GithubProvider {
    client: Arc<Octocrab>,
}

/// Builds a provider authenticated with `token`, talking to `base_url` when one is given.
pub fn configure_provider(token: &str, base_url: Option<&str>) -> Result<GithubProvider, GatewayError> {
    let mut builder = Octocrab::builder().personal_token(token.to_string());
    if let Some(url) = base_url {
        builder = builder.base_uri(url)?;
    }

    Ok(GithubProvider {
        client: Arc::new(builder.build()?),
    })
}

#[derive(Deserialize)]
struct WireStatus {
    status: FeatureStatus,
}

#[derive(Deserialize, Default)]
struct WireSecurity {
    advanced_security: Option<WireStatus>,
    secret_scanning: Option<WireStatus>,
    secret_scanning_push_protection: Option<WireStatus>,
}

#[derive(Deserialize)]
struct WireRepository {
    id: u64,
    name: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    private: bool,
    visibility: Option<Visibility>,
    default_branch: Option<String>,
    security_and_analysis: Option<WireSecurity>,
}

impl From<WireRepository> for Repository {
    fn from(wire: WireRepository) -> Self {
        let visibility = wire.visibility.unwrap_or(if wire.private {
            Visibility::Private
        } else {
            Visibility::Public
        });
        let security = wire.security_and_analysis.unwrap_or_default();

        Repository {
            id: wire.id,
            name: wire.name,
            archived: wire.archived,
            visibility,
            default_branch: wire.default_branch.unwrap_or_else(|| "main".to_string()),
            security: SecurityAndAnalysis {
                advanced_security: security.advanced_security.map(|s| s.status),
                secret_scanning: security.secret_scanning.map(|s| s.status),
                push_protection: security.secret_scanning_push_protection.map(|s| s.status),
            },
        }
    }
}

#[derive(Deserialize)]
struct WireWorkflows {
    total_count: usize,
    workflows: Vec<Workflow>,
}

#[derive(Deserialize)]
struct WireRuleNode {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Deserialize)]
struct WireOrganizationNode {
    login: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrganizationConnection {
    nodes: Vec<WireOrganizationNode>,
    page_info: WirePageInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRuleConnection {
    nodes: Vec<WireRuleNode>,
    page_info: WirePageInfo,
}

fn status_of(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

/// Runs a GraphQL document and returns its `data`, turning an `errors` array into an error.
async fn graphql(client: &Octocrab, query: &str, variables: Value) -> Result<Value, GatewayError> {
    let mut response: Value = client
        .graphql(&json!({ "query": query, "variables": variables }))
        .await?;

    if let Some(errors) = response.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GatewayError::GraphQl(message));
        }
    }

    Ok(response
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

async fn edit_repository(
    client: &Octocrab,
    owner: &str,
    name: &str,
    body: &Value,
) -> Result<(), octocrab::Error> {
    let route = format!("/repos/{}/{}", owner, name);
    let _: Value = client.patch(&route, Some(body)).await?;
    Ok(())
}

/// Status code of a body-less PUT; transport errors are returned as such.
async fn put_empty(client: &Octocrab, route: &str) -> Result<u16, GatewayError> {
    match client._put(route, None::<&()>).await {
        Ok(response) => Ok(response.status().as_u16()),
        Err(err) => match status_of(&err) {
            Some(status) => Ok(status),
            None => Err(err.into()),
        },
    }
}

fn unexpected(status: u16, route: &str) -> GatewayError {
    GatewayError::Status {
        status,
        message: format!("unexpected response for {}", route),
    }
}

async fn change_archived(
    client: &Octocrab,
    owner: &str,
    name: &str,
    archived: bool,
) -> Result<(), GatewayError> {
    match edit_repository(client, owner, name, &json!({ "archived": archived })).await {
        Ok(()) => Ok(()),
        Err(err) if status_of(&err) == Some(403) => {
            debug!(repository = name, archived, "archive flag already set");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl Provider for GithubProvider {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, GatewayError> {
        let route = format!("/repos/{}/{}", owner, name);
        let response: Result<WireRepository, _> = self.client.get(&route, None::<&()>).await;
        match response {
            Ok(wire) => Ok(wire.into()),
            Err(err) if status_of(&err) == Some(404) => Err(GatewayError::RepositoryNotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_repositories(&self, owner: &str) -> Result<Vec<Repository>, GatewayError> {
        let mut repositories = Vec::new();
        let mut page = 1;

        loop {
            let route = format!(
                "/orgs/{}/repos?type=all&per_page={}&page={}",
                owner, PER_PAGE, page
            );
            let batch: Vec<WireRepository> = self.client.get(&route, None::<&()>).await?;
            let count = batch.len();
            repositories.extend(batch.into_iter().map(Repository::from));

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(organization = owner, count = repositories.len(), "listed repositories");
        Ok(repositories)
    }

    async fn get_enterprise_organizations(
        &self,
        enterprise: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let mut organizations = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let variables = json!({ "slug": enterprise, "cursor": cursor });
            let mut data = graphql(&self.client, ENTERPRISE_ORGANIZATIONS_QUERY, variables).await?;
            let connection = data
                .pointer_mut("/enterprise/organizations")
                .map(Value::take)
                .ok_or_else(|| GatewayError::GraphQl(format!("enterprise {} not found", enterprise)))?;
            let connection: WireOrganizationConnection = serde_json::from_value(connection)
                .map_err(|err| GatewayError::GraphQl(err.to_string()))?;

            organizations.extend(connection.nodes.into_iter().map(|node| node.login));
            if !connection.page_info.has_next_page {
                break;
            }
            match connection.page_info.end_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => {
                    return Err(GatewayError::GraphQl(format!(
                        "organizations of {}: next page without a new cursor",
                        enterprise
                    )))
                }
            }
        }

        debug!(enterprise, count = organizations.len(), "listed enterprise organizations");
        Ok(organizations)
    }

    async fn change_ghas_org_settings(
        &self,
        owner: &str,
        activate: bool,
    ) -> Result<(), GatewayError> {
        let route = format!("/orgs/{}", owner);
        let body = json!({
            "advanced_security_enabled_for_new_repositories": activate,
            "secret_scanning_enabled_for_new_repositories": activate,
            "secret_scanning_push_protection_enabled_for_new_repositories": activate,
        });
        let _: Value = self.client.patch(&route, Some(&body)).await?;
        Ok(())
    }

    async fn change_ghas_repo_settings(
        &self,
        owner: &str,
        repository: &Repository,
        settings: SecuritySettings,
    ) -> Result<(), GatewayError> {
        let payload = settings.payload_for(repository.visibility);
        if payload.as_object().map_or(true, |fields| fields.is_empty()) {
            debug!(repository = %repository.name, "no GHAS setting applies, nothing to send");
            return Ok(());
        }

        let body = json!({ "security_and_analysis": payload });
        match edit_repository(&self.client, owner, &repository.name, &body).await {
            Ok(()) => Ok(()),
            Err(err) if status_of(&err) == Some(422) => {
                debug!(repository = %repository.name, %settings, "GHAS settings already applied");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn change_repository_visibility(
        &self,
        owner: &str,
        name: &str,
        visibility: Visibility,
    ) -> Result<(), GatewayError> {
        let body = json!({ "visibility": visibility });
        match edit_repository(&self.client, owner, name, &body).await {
            Ok(()) => Ok(()),
            Err(err) if status_of(&err) == Some(422) => {
                debug!(repository = name, %visibility, "visibility already set");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn archive_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError> {
        change_archived(&self.client, owner, name, true).await
    }

    async fn unarchive_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError> {
        change_archived(&self.client, owner, name, false).await
    }

    async fn get_all_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<Workflow>, GatewayError> {
        let mut workflows = Vec::new();
        let mut page = 1;

        loop {
            let route = format!(
                "/repos/{}/{}/actions/workflows?per_page={}&page={}",
                owner, name, PER_PAGE, page
            );
            let batch: WireWorkflows = self.client.get(&route, None::<&()>).await?;
            let count = batch.workflows.len();
            workflows.extend(batch.workflows);

            if count == 0 || workflows.len() >= batch.total_count {
                break;
            }
            page += 1;
        }

        Ok(workflows)
    }

    async fn disable_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
        workflows: &[Workflow],
    ) -> Result<(), GatewayError> {
        for workflow in workflows {
            let route = format!(
                "/repos/{}/{}/actions/workflows/{}/disable",
                owner, name, workflow.id
            );
            match put_empty(&self.client, &route).await? {
                200..=299 => debug!(repository = name, workflow = %workflow.name, "disabled workflow"),
                status => return Err(unexpected(status, &route)),
            }
        }
        Ok(())
    }

    async fn enable_workflows_for_repository(
        &self,
        owner: &str,
        name: &str,
        workflows: &[Workflow],
    ) -> Result<(), GatewayError> {
        for workflow in workflows {
            let route = format!(
                "/repos/{}/{}/actions/workflows/{}/enable",
                owner, name, workflow.id
            );
            match put_empty(&self.client, &route).await? {
                200..=299 => debug!(repository = name, workflow = %workflow.name, "enabled workflow"),
                422 => debug!(repository = name, workflow = %workflow.name, "workflow already enabled"),
                status => return Err(unexpected(status, &route)),
            }
        }
        Ok(())
    }

    async fn list_branch_protection_rules(
        &self,
        owner: &str,
        name: &str,
        cursor: Option<&str>,
    ) -> Result<BranchProtectionPage, GatewayError> {
        let variables = json!({ "owner": owner, "name": name, "cursor": cursor });
        let mut data = graphql(&self.client, BRANCH_PROTECTION_RULES_QUERY, variables).await?;

        let connection = data
            .pointer_mut("/repository/branchProtectionRules")
            .map(Value::take)
            .ok_or_else(|| GatewayError::RepositoryNotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            })?;
        let connection: WireRuleConnection = serde_json::from_value(connection)
            .map_err(|err| GatewayError::GraphQl(err.to_string()))?;

        Ok(BranchProtectionPage {
            ids: connection.nodes.into_iter().map(|node| node.id).collect(),
            end_cursor: connection.page_info.end_cursor,
            has_next_page: connection.page_info.has_next_page,
        })
    }

    async fn delete_branch_protection_rule(&self, rule_id: &str) -> Result<(), GatewayError> {
        graphql(
            &self.client,
            DELETE_BRANCH_PROTECTION_RULE_MUTATION,
            json!({ "id": rule_id }),
        )
        .await?;
        Ok(())
    }

    async fn get_code_scanning_analysis(
        &self,
        owner: &str,
        name: &str,
        git_ref: &str,
    ) -> Result<Vec<CodeScanningAnalysis>, GatewayError> {
        let route = format!(
            "/repos/{}/{}/code-scanning/analyses?ref=refs/heads/{}&per_page={}",
            owner, name, git_ref, PER_PAGE
        );
        match self.client.get(&route, None::<&()>).await {
            Ok(analyses) => Ok(analyses),
            Err(err) if status_of(&err) == Some(404) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_repository(&self, owner: &str, name: &str) -> Result<(), GatewayError> {
        let route = format!("/orgs/{}/repos", owner);
        let body = json!({ "name": name, "private": true });
        let response: Result<Value, _> = self.client.post(&route, Some(&body)).await;
        match response {
            Ok(_) => Ok(()),
            Err(err) if status_of(&err) == Some(422) => Err(GatewayError::RepositoryAlreadyExists {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_issue(
        &self,
        owner: &str,
        repository: &str,
        title: &str,
        body: &str,
    ) -> Result<Issue, GatewayError> {
        let route = format!("/repos/{}/{}/issues", owner, repository);
        let issue: Issue = self
            .client
            .post(&route, Some(&json!({ "title": title, "body": body })))
            .await?;
        Ok(issue)
    }

    async fn get_issue(
        &self,
        owner: &str,
        repository: &str,
        number: u64,
    ) -> Result<Issue, GatewayError> {
        let route = format!("/repos/{}/{}/issues/{}", owner, repository, number);
        match self.client.get(&route, None::<&()>).await {
            Ok(issue) => Ok(issue),
            Err(err) if status_of(&err) == Some(404) => Err(GatewayError::IssueNotFound {
                owner: owner.to_string(),
                repository: repository.to_string(),
                number,
            }),
            Err(err) => Err(err.into()),
        }
    }
}
