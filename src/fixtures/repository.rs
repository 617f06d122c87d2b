use crate::model::{
    FeatureStatus, Repository, SecurityAndAnalysis, Visibility, Workflow, WorkflowState,
};

/// A private, unarchived repository on `main` with no GHAS fields at all.
pub fn create_repository(id: u64, name: &str) -> Repository {
    Repository {
        id,
        name: name.to_string(),
        archived: false,
        visibility: Visibility::Private,
        default_branch: "main".to_string(),
        security: SecurityAndAnalysis::default(),
    }
}

pub fn create_repository_with_security(
    id: u64,
    name: &str,
    advanced_security: Option<FeatureStatus>,
    secret_scanning: Option<FeatureStatus>,
    push_protection: Option<FeatureStatus>,
) -> Repository {
    Repository {
        security: SecurityAndAnalysis {
            advanced_security,
            secret_scanning,
            push_protection,
        },
        ..create_repository(id, name)
    }
}

pub fn create_workflow(id: u64, name: &str, state: WorkflowState) -> Workflow {
    Workflow {
        id,
        name: name.to_string(),
        state,
    }
}
