use serde_json::{json, Value};

use crate::model::{Repository, Workflow};

/// REST body of `GET /repos/{owner}/{repo}` for `repository`.
pub fn get_repository_json(owner: &str, repository: &Repository) -> Value {
    let mut security = serde_json::Map::new();
    let fields = [
        ("advanced_security", repository.security.advanced_security),
        ("secret_scanning", repository.security.secret_scanning),
        (
            "secret_scanning_push_protection",
            repository.security.push_protection,
        ),
    ];
    for (key, status) in fields {
        if let Some(status) = status {
            security.insert(key.to_string(), json!({ "status": status }));
        }
    }

    json!({
        "id": repository.id,
        "node_id": format!("R_{}", repository.id),
        "name": repository.name,
        "full_name": format!("{}/{}", owner, repository.name),
        "url": format!("https://api.github.com/repos/{}/{}", owner, repository.name),
        "private": repository.visibility != crate::model::Visibility::Public,
        "visibility": repository.visibility,
        "archived": repository.archived,
        "default_branch": repository.default_branch,
        "security_and_analysis": security,
    })
}

pub fn get_workflows_json(workflows: &[Workflow]) -> Value {
    json!({
        "total_count": workflows.len(),
        "workflows": workflows,
    })
}

/// GraphQL response for one page of `branchProtectionRules`.
pub fn get_branch_protection_page_json(
    ids: &[String],
    end_cursor: Option<&str>,
    has_next_page: bool,
) -> Value {
    let nodes: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();

    json!({
        "data": {
            "repository": {
                "branchProtectionRules": {
                    "nodes": nodes,
                    "pageInfo": {
                        "endCursor": end_cursor,
                        "hasNextPage": has_next_page,
                    }
                }
            }
        }
    })
}

pub fn get_analyses_json(count: u64, git_ref: &str) -> Value {
    let analyses: Vec<Value> = (1..=count)
        .map(|id| json!({ "id": id, "ref": git_ref, "tool": { "name": "CodeQL" } }))
        .collect();
    Value::Array(analyses)
}

pub fn get_issue_json(owner: &str, repository: &str, number: u64, title: &str, body: &str) -> Value {
    json!({
        "number": number,
        "title": title,
        "body": body,
        "html_url": format!("https://github.com/{}/{}/issues/{}", owner, repository, number),
    })
}
