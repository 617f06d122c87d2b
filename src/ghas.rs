//! Standalone GHAS switches for a single repository or for whole organizations.

use tracing::{error, info};

use crate::error::GatewayError;
use crate::model::{FeatureStatus, SecuritySettings};
use crate::provider::Provider;

/// Which organizations `activate_ghas_features` acts on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GhasScope {
    Organization(String),
    Enterprise(String),
}

/// Turns advanced security, secret scanning and push protection on or off for one repository.
pub async fn change_repository_ghas(
    provider: &dyn Provider,
    owner: &str,
    name: &str,
    activate: bool,
) -> Result<(), GatewayError> {
    let status = if activate {
        FeatureStatus::Enabled
    } else {
        FeatureStatus::Disabled
    };
    let repository = provider.get_repository(owner, name).await?;
    provider
        .change_ghas_repo_settings(owner, &repository, SecuritySettings::all(status))
        .await?;
    info!(repository = name, %status, "changed GHAS settings");
    Ok(())
}

/// Enables the GHAS defaults for new repositories.
///
/// A single organization fails as a whole. For an enterprise every organization is tried and
/// the logins that could not be changed are returned.
pub async fn activate_ghas_features(
    provider: &dyn Provider,
    scope: &GhasScope,
) -> Result<Vec<String>, GatewayError> {
    let organizations = match scope {
        GhasScope::Organization(login) => {
            provider.change_ghas_org_settings(login, true).await?;
            info!(organization = %login, "activated GHAS");
            return Ok(Vec::new());
        }
        GhasScope::Enterprise(slug) => {
            info!(enterprise = %slug, "fetching organizations");
            provider.get_enterprise_organizations(slug).await?
        }
    };

    let mut failed = Vec::new();
    for login in organizations {
        match provider.change_ghas_org_settings(&login, true).await {
            Ok(()) => info!(organization = %login, "activated GHAS"),
            Err(err) => {
                error!(organization = %login, error = %err, "could not activate GHAS");
                failed.push(login);
            }
        }
    }
    Ok(failed)
}
