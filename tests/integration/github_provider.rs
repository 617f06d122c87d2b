use serde_json::json;
use wiremock::MockServer;

use orgmove::error::GatewayError;
use orgmove::fixtures::payloads::{
    get_analyses_json, get_issue_json, get_repository_json, get_workflows_json,
};
use orgmove::fixtures::repository::{
    create_repository, create_repository_with_security, create_workflow,
};
use orgmove::github_provider::{configure_provider, GithubProvider};
use orgmove::model::{FeatureStatus, SecuritySettings, Visibility, WorkflowState};
use orgmove::provider::Provider;

use crate::mocks::github::{
    branch_protection_page_mock, code_scanning_mock, create_repository_mock,
    delete_branch_protection_mock, error_json, get_issue_mock, get_repositories_mock,
    get_repository_mock, patch_repository_mock, workflow_toggle_mock,
};

fn provider(server: &MockServer) -> GithubProvider {
    configure_provider("token", Some(&server.uri())).unwrap()
}

mod repositories {
    use super::*;

    #[tokio::test]
    async fn maps_security_and_analysis() {
        let server = MockServer::start().await;
        let repository = create_repository_with_security(
            42,
            "api",
            Some(FeatureStatus::Enabled),
            Some(FeatureStatus::Enabled),
            None,
        );
        get_repository_mock("acme", "api", 200, get_repository_json("acme", &repository))
            .mount(&server)
            .await;

        let fetched = provider(&server)
            .get_repository("acme", "api")
            .await
            .unwrap();

        assert_eq!(fetched, repository);
    }

    #[tokio::test]
    async fn missing_repository_is_not_found() {
        let server = MockServer::start().await;
        get_repository_mock("acme", "ghost", 404, error_json("Not Found"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_repository("acme", "ghost")
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::RepositoryNotFound { .. }));
    }

    #[tokio::test]
    async fn lists_every_page() {
        let server = MockServer::start().await;
        let first: Vec<_> = (0..100)
            .map(|i| get_repository_json("acme", &create_repository(i, &format!("repo-{}", i))))
            .collect();
        let second = vec![get_repository_json("acme", &create_repository(100, "last"))];
        get_repositories_mock("acme", 1, json!(first)).mount(&server).await;
        get_repositories_mock("acme", 2, json!(second)).mount(&server).await;

        let repositories = provider(&server).get_repositories("acme").await.unwrap();

        assert_eq!(repositories.len(), 101);
        assert_eq!(repositories[100].name, "last");
    }

    #[tokio::test]
    async fn create_conflict_is_already_exists() {
        let server = MockServer::start().await;
        create_repository_mock("acme-emu", 422, error_json("Repository creation failed."))
            .mount(&server)
            .await;

        let err = provider(&server)
            .create_repository("acme-emu", "migration-status")
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::RepositoryAlreadyExists { .. }));
        assert_eq!(err.status(), Some(422));
    }
}

mod edits {
    use super::*;

    #[tokio::test]
    async fn visibility_unprocessable_is_success() {
        let server = MockServer::start().await;
        patch_repository_mock(
            "acme-emu",
            "api",
            json!({ "visibility": "internal" }),
            422,
            error_json("Visibility is already internal"),
        )
        .mount(&server)
        .await;

        provider(&server)
            .change_repository_visibility("acme-emu", "api", Visibility::Internal)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn archive_forbidden_is_success() {
        let server = MockServer::start().await;
        patch_repository_mock(
            "acme",
            "api",
            json!({ "archived": true }),
            403,
            error_json("Repository was archived so is read-only."),
        )
        .mount(&server)
        .await;

        provider(&server)
            .archive_repository("acme", "api")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ghas_edit_failure_surfaces_the_status() {
        let server = MockServer::start().await;
        let repository = create_repository(1, "api");
        patch_repository_mock(
            "acme",
            "api",
            json!({ "security_and_analysis": { "secret_scanning": { "status": "disabled" } } }),
            500,
            error_json("Server Error"),
        )
        .mount(&server)
        .await;

        let err = provider(&server)
            .change_ghas_repo_settings("acme", &repository, SecuritySettings::all(FeatureStatus::Disabled))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "GitHub API error: 500 Server Error");
    }

    #[tokio::test]
    async fn ghas_unprocessable_is_success() {
        let server = MockServer::start().await;
        let repository = create_repository(1, "api");
        patch_repository_mock(
            "acme",
            "api",
            json!({ "security_and_analysis": { "advanced_security": { "status": "disabled" } } }),
            422,
            error_json("Advanced security is already disabled"),
        )
        .mount(&server)
        .await;

        provider(&server)
            .change_ghas_repo_settings("acme", &repository, SecuritySettings::all(FeatureStatus::Disabled))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enabling_an_enabled_workflow_is_success() {
        let server = MockServer::start().await;
        workflow_toggle_mock("acme-emu", "api", 11, "enable", 422)
            .mount(&server)
            .await;
        workflow_toggle_mock("acme-emu", "api", 12, "enable", 204)
            .mount(&server)
            .await;

        provider(&server)
            .enable_workflows_for_repository(
                "acme-emu",
                "api",
                &[
                    create_workflow(11, "ci", WorkflowState::Active),
                    create_workflow(12, "lint", WorkflowState::DisabledManually),
                ],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn disabling_stops_at_the_first_failure() {
        let server = MockServer::start().await;
        workflow_toggle_mock("acme", "api", 1, "disable", 500)
            .mount(&server)
            .await;

        let err = provider(&server)
            .disable_workflows_for_repository(
                "acme",
                "api",
                &[
                    create_workflow(1, "ci", WorkflowState::Active),
                    create_workflow(2, "lint", WorkflowState::Active),
                ],
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
    }
}

mod workflows {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn only_active_workflows_are_kept() {
        let server = MockServer::start().await;
        let workflows = vec![
            create_workflow(1, "ci", WorkflowState::Active),
            create_workflow(2, "nightly", WorkflowState::DisabledManually),
            create_workflow(3, "lint", WorkflowState::Active),
        ];
        Mock::given(method("GET"))
            .and(path("/repos/acme/api/actions/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(get_workflows_json(&workflows)))
            .expect(1)
            .mount(&server)
            .await;

        let active = provider(&server)
            .get_all_active_workflows_for_repository("acme", "api")
            .await
            .unwrap();

        let names: Vec<_> = active.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["ci", "lint"]);
    }
}

mod branch_protections {
    use super::*;

    fn ids(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("BPR_{}", i)).collect()
    }

    #[tokio::test]
    async fn follows_cursors_and_deletes_every_rule() {
        let server = MockServer::start().await;
        branch_protection_page_mock(None, &ids(0..100), Some("c1"), true)
            .mount(&server)
            .await;
        branch_protection_page_mock(Some("c1"), &ids(100..200), Some("c2"), true)
            .mount(&server)
            .await;
        branch_protection_page_mock(Some("c2"), &ids(200..300), Some("c3"), false)
            .mount(&server)
            .await;
        delete_branch_protection_mock(300).mount(&server).await;

        let deleted = provider(&server)
            .delete_branch_protections("acme-emu", "api")
            .await
            .unwrap();

        assert_eq!(deleted, 300);
    }

    #[tokio::test]
    async fn next_page_without_cursor_stops_the_listing() {
        let server = MockServer::start().await;
        branch_protection_page_mock(None, &ids(0..1), None, true)
            .mount(&server)
            .await;
        delete_branch_protection_mock(0).mount(&server).await;

        let err = provider(&server)
            .delete_branch_protections("acme-emu", "api")
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::GraphQl(_)));
    }

    #[tokio::test]
    async fn repeated_cursor_stops_the_listing() {
        let server = MockServer::start().await;
        branch_protection_page_mock(None, &ids(0..100), Some("c1"), true)
            .mount(&server)
            .await;
        branch_protection_page_mock(Some("c1"), &ids(100..200), Some("c1"), true)
            .mount(&server)
            .await;
        delete_branch_protection_mock(0).mount(&server).await;

        let err = provider(&server)
            .delete_branch_protections("acme-emu", "api")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("without a new cursor"));
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Could not resolve to a Repository" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .delete_branch_protections("acme-emu", "ghost")
            .await
            .unwrap_err();

        match err {
            GatewayError::GraphQl(message) => assert!(message.contains("Could not resolve")),
            other => panic!("unexpected error: {other}"),
        }
    }
}

mod code_scanning {
    use super::*;

    #[tokio::test]
    async fn counts_analyses_on_the_default_branch() {
        let server = MockServer::start().await;
        code_scanning_mock("acme", "api", 200, get_analyses_json(3, "refs/heads/main"))
            .mount(&server)
            .await;

        let analyses = provider(&server)
            .get_code_scanning_analysis("acme", "api", "main")
            .await
            .unwrap();

        assert_eq!(analyses.len(), 3);
        assert_eq!(analyses[0].git_ref, "refs/heads/main");
    }

    #[tokio::test]
    async fn no_analysis_is_an_empty_list() {
        let server = MockServer::start().await;
        code_scanning_mock("acme", "api", 404, error_json("no analysis found"))
            .mount(&server)
            .await;

        let analyses = provider(&server)
            .get_code_scanning_analysis("acme", "api", "main")
            .await
            .unwrap();

        assert!(analyses.is_empty());
    }
}

mod issues {
    use super::*;

    #[tokio::test]
    async fn reads_the_marker_issue() {
        let server = MockServer::start().await;
        get_issue_mock(
            "acme-emu",
            "migration-status",
            1,
            200,
            get_issue_json("acme-emu", "migration-status", 1, "Migration result", "{}"),
        )
        .mount(&server)
        .await;

        let issue = provider(&server)
            .get_issue("acme-emu", "migration-status", 1)
            .await
            .unwrap();

        assert_eq!(issue.number, 1);
        assert_eq!(
            issue.html_url,
            "https://github.com/acme-emu/migration-status/issues/1"
        );
    }

    #[tokio::test]
    async fn missing_issue_is_not_found() {
        let server = MockServer::start().await;
        get_issue_mock("acme-emu", "migration-status", 1, 404, error_json("Not Found"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .get_issue("acme-emu", "migration-status", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::IssueNotFound { number: 1, .. }));
    }
}

mod enterprise {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn page(logins: &[&str], end_cursor: Option<&str>, has_next_page: bool) -> serde_json::Value {
        let nodes: Vec<_> = logins.iter().map(|login| json!({ "login": login })).collect();
        json!({
            "data": {
                "enterprise": {
                    "organizations": {
                        "nodes": nodes,
                        "pageInfo": { "endCursor": end_cursor, "hasNextPage": has_next_page }
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn lists_organizations_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("enterprise(slug"))
            .and(body_partial_json(json!({ "variables": { "slug": "acme-corp", "cursor": null } })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page(&["acme", "acme-emu"], Some("o1"), true)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "cursor": "o1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["acme-labs"], None, false)))
            .expect(1)
            .mount(&server)
            .await;

        let organizations = provider(&server)
            .get_enterprise_organizations("acme-corp")
            .await
            .unwrap();

        assert_eq!(organizations, vec!["acme", "acme-emu", "acme-labs"]);
    }
}
