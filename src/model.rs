//! Domain types shared by the gateway, the pipeline and the report.
//!
//! These are deliberately decoupled from the octocrab models; `github_provider` maps the wire
//! payloads onto them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "internal" => Ok(Visibility::Internal),
            other => Err(format!("unknown visibility `{}`", other)),
        }
    }
}

/// Status of a single security feature. Absence is modelled as `Option::None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    Enabled,
    Disabled,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Enabled => "enabled",
            FeatureStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three GHAS toggles of a repository, each enabled, disabled or absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAndAnalysis {
    pub advanced_security: Option<FeatureStatus>,
    pub secret_scanning: Option<FeatureStatus>,
    pub push_protection: Option<FeatureStatus>,
}

impl SecurityAndAnalysis {
    /// GHAS counts as active whenever the advanced security field is present at all.
    pub fn is_configured(&self) -> bool {
        self.advanced_security.is_some()
    }

    pub fn code_scanning_inactive(&self) -> bool {
        !matches!(self.advanced_security, Some(FeatureStatus::Enabled))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub archived: bool,
    pub visibility: Visibility,
    pub default_branch: String,
    pub security: SecurityAndAnalysis,
}

impl Repository {
    /// Public repositories always report advanced security as enabled.
    pub fn effective_security(&self) -> SecurityAndAnalysis {
        let mut security = self.security;
        if self.visibility == Visibility::Public {
            security.advanced_security = Some(FeatureStatus::Enabled);
        }
        security
    }
}

/// Desired GHAS settings for a repository edit. `None` leaves a feature untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecuritySettings {
    pub advanced_security: Option<FeatureStatus>,
    pub secret_scanning: Option<FeatureStatus>,
    pub push_protection: Option<FeatureStatus>,
}

impl SecuritySettings {
    pub fn all(status: FeatureStatus) -> Self {
        SecuritySettings {
            advanced_security: Some(status),
            secret_scanning: Some(status),
            push_protection: Some(status),
        }
    }

    /// Code scanning on, secret scanning and push protection off.
    pub fn code_scanning_only() -> Self {
        SecuritySettings {
            advanced_security: Some(FeatureStatus::Enabled),
            secret_scanning: Some(FeatureStatus::Disabled),
            push_protection: Some(FeatureStatus::Disabled),
        }
    }

    pub fn from_snapshot(security: &SecurityAndAnalysis) -> Self {
        SecuritySettings {
            advanced_security: security.advanced_security,
            secret_scanning: security.secret_scanning,
            push_protection: security.push_protection,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.advanced_security.is_none()
            && self.secret_scanning.is_none()
            && self.push_protection.is_none()
    }

    /// Builds the `security_and_analysis` object of a repository PATCH.
    ///
    /// Advanced security cannot be changed on public repositories: the API rejects the request,
    /// so the field is dropped from the payload for them.
    pub fn payload_for(&self, visibility: Visibility) -> Value {
        let mut payload = Map::new();
        if visibility != Visibility::Public {
            if let Some(status) = self.advanced_security {
                payload.insert("advanced_security".into(), json!({ "status": status }));
            }
        }
        if let Some(status) = self.secret_scanning {
            payload.insert("secret_scanning".into(), json!({ "status": status }));
        }
        if let Some(status) = self.push_protection {
            payload.insert(
                "secret_scanning_push_protection".into(),
                json!({ "status": status }),
            );
        }
        Value::Object(payload)
    }
}

impl fmt::Display for SecuritySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |status: Option<FeatureStatus>| status.map_or("-", |s| s.as_str());
        write!(
            f,
            "advanced_security={} secret_scanning={} push_protection={}",
            show(self.advanced_security),
            show(self.secret_scanning),
            show(self.push_protection)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Active,
    DisabledManually,
    DisabledInactivity,
    DisabledFork,
    Deleted,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    pub state: WorkflowState,
}

impl Workflow {
    pub fn is_active(&self) -> bool {
        self.state == WorkflowState::Active
    }
}

/// One page of branch protection rule ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BranchProtectionPage {
    pub ids: Vec<String>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeScanningAnalysis {
    pub id: u64,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
}
