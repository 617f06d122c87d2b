use std::sync::Arc;
use std::time::Duration;

use orgmove::error::MigrationError;
use orgmove::fixtures::repository::{create_repository_with_security, create_workflow};
use orgmove::mocks::{FakeProvider, FakeTransfer};
use orgmove::model::{FeatureStatus, Visibility, WorkflowState};
use orgmove::orchestrator::{MigrationStatus, OrganizationMigration};
use orgmove::pipeline::MigrationContext;
use orgmove::step::RetryPolicy;
use orgmove::workflows::reactivate_target_workflows;

struct Organization {
    source: Arc<FakeProvider>,
    target: Arc<FakeProvider>,
    transfer: Arc<FakeTransfer>,
}

impl Organization {
    fn seeded() -> Self {
        let source = Arc::new(FakeProvider::new("source", "acme"));
        let target = Arc::new(FakeProvider::new("target", "acme-emu"));
        let transfer = Arc::new(FakeTransfer::new(source.clone(), target.clone()));

        for (id, name) in ["api", "sandbox-1", "web"].iter().enumerate() {
            source.insert_repository(create_repository_with_security(
                id as u64 + 1,
                name,
                Some(FeatureStatus::Enabled),
                Some(FeatureStatus::Enabled),
                None,
            ));
            source.set_workflows(
                name,
                vec![create_workflow(id as u64 * 10, "ci", WorkflowState::Active)],
            );
        }

        Organization {
            source,
            target,
            transfer,
        }
    }

    fn context(&self) -> MigrationContext {
        MigrationContext {
            source_org: "acme".into(),
            target_org: "acme-emu".into(),
            source: self.source.clone(),
            target: self.target.clone(),
            transfer: self.transfer.clone(),
            retry: RetryPolicy::new(2, Duration::from_millis(5)),
            settle_delay: Duration::from_secs(10),
        }
    }

    fn migration(&self, report: &str) -> OrganizationMigration {
        OrganizationMigration::new(self.context())
            .workers(2)
            .exclude(vec![glob::Pattern::new("sandbox-*").unwrap()])
            .report_path(std::env::temp_dir().join(report))
    }
}

#[tokio::test(start_paused = true)]
async fn organization_run_then_status_then_refusal() {
    let org = Organization::seeded();

    assert_eq!(
        org.migration("orgmove-it-status.json").status().await.unwrap(),
        MigrationStatus::NotStarted
    );

    let report = org
        .migration("orgmove-it-status.json")
        .migrate()
        .await
        .unwrap();

    let migrated: Vec<_> = report.migrated.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(migrated, vec!["api", "web"]);
    assert!(org.target.repository("sandbox-1").is_none());

    for name in ["api", "web"] {
        let source = org.source.repository(name).unwrap();
        assert!(source.archived);
        assert_eq!(source.security.secret_scanning, Some(FeatureStatus::Enabled));
        assert!(org.source.workflows(name).iter().all(|w| w.is_active()));

        let target = org.target.repository(name).unwrap();
        assert_eq!(target.visibility, Visibility::Internal);
        assert!(!target.archived);
    }

    match org.migration("orgmove-it-status.json").status().await.unwrap() {
        MigrationStatus::Completed { url } => {
            assert_eq!(url, "https://github.com/acme-emu/migration-status/issues/1")
        }
        other => panic!("unexpected status: {other:?}"),
    }

    let err = org
        .migration("orgmove-it-status.json")
        .migrate()
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::AlreadyCompleted { .. }));
}

#[tokio::test(start_paused = true)]
async fn workflows_can_be_reactivated_after_a_run() {
    let org = Organization::seeded();
    org.migration("orgmove-it-workflows.json")
        .migrate()
        .await
        .unwrap();
    assert!(org.target.workflows("api").iter().all(|w| !w.is_active()));

    let enabled = reactivate_target_workflows(&org.context(), "api")
        .await
        .unwrap();

    assert_eq!(enabled, 1);
    assert!(org.target.workflows("api").iter().all(|w| w.is_active()));
}
