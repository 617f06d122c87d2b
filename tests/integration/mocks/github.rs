use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use orgmove::fixtures::payloads::get_branch_protection_page_json;

/// Error body in the shape GitHub sends it.
pub fn error_json(message: &str) -> Value {
    json!({
        "message": message,
        "documentation_url": "https://docs.github.com/rest",
    })
}

pub fn get_repository_mock(owner: &str, repo: &str, status: u16, response: Value) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{owner}/{repo}", owner = owner, repo = repo)))
        .respond_with(ResponseTemplate::new(status).set_body_json(response))
        .expect(1)
}

pub fn get_repositories_mock(owner: &str, page: u32, response: Value) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{owner}/repos", owner = owner)))
        .and(query_param("page", page.to_string()))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
}

pub fn patch_repository_mock(
    owner: &str,
    repo: &str,
    body: Value,
    status: u16,
    response: Value,
) -> Mock {
    Mock::given(method("PATCH"))
        .and(path(format!("/repos/{owner}/{repo}", owner = owner, repo = repo)))
        .and(body_partial_json(body))
        .respond_with(ResponseTemplate::new(status).set_body_json(response))
        .expect(1)
}

pub fn workflow_toggle_mock(
    owner: &str,
    repo: &str,
    workflow_id: u64,
    action: &str,
    status: u16,
) -> Mock {
    Mock::given(method("PUT"))
        .and(path(format!(
            "/repos/{owner}/{repo}/actions/workflows/{id}/{action}",
            owner = owner,
            repo = repo,
            id = workflow_id,
            action = action
        )))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
}

/// One page of the branch protection query, matched on the cursor it is asked with.
pub fn branch_protection_page_mock(
    cursor: Option<&str>,
    ids: &[String],
    end_cursor: Option<&str>,
    has_next_page: bool,
) -> Mock {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("branchProtectionRules"))
        .and(body_partial_json(json!({ "variables": { "cursor": cursor } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(get_branch_protection_page_json(
                ids,
                end_cursor,
                has_next_page,
            )),
        )
        .expect(1)
}

pub fn delete_branch_protection_mock(times: u64) -> Mock {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("deleteBranchProtectionRule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "deleteBranchProtectionRule": { "clientMutationId": null } }
        })))
        .expect(times)
}

pub fn code_scanning_mock(owner: &str, repo: &str, status: u16, response: Value) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!(
            "/repos/{owner}/{repo}/code-scanning/analyses",
            owner = owner,
            repo = repo
        )))
        .and(query_param("ref", "refs/heads/main"))
        .respond_with(ResponseTemplate::new(status).set_body_json(response))
        .expect(1)
}

pub fn create_repository_mock(owner: &str, status: u16, response: Value) -> Mock {
    Mock::given(method("POST"))
        .and(path(format!("/orgs/{owner}/repos", owner = owner)))
        .respond_with(ResponseTemplate::new(status).set_body_json(response))
        .expect(1)
}

pub fn get_issue_mock(owner: &str, repo: &str, number: u64, status: u16, response: Value) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!(
            "/repos/{owner}/{repo}/issues/{number}",
            owner = owner,
            repo = repo,
            number = number
        )))
        .respond_with(ResponseTemplate::new(status).set_body_json(response))
        .expect(1)
}
