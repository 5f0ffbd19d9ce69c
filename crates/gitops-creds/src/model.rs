//! Credential records and the request/response shape exposed to callers.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Name of the secret object that holds the mirrored username/token pair.
pub const GITOPS_SECRET_NAME: &str = "devtron-gitops-secret";

/// Git hosting provider a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GitProvider {
    Github,
    Gitlab,
    AzureDevops,
}

impl GitProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitProvider::Github => "GITHUB",
            GitProvider::Gitlab => "GITLAB",
            GitProvider::AzureDevops => "AZURE_DEVOPS",
        }
    }
}

impl std::fmt::Display for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GitProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GITHUB" => Ok(GitProvider::Github),
            "GITLAB" => Ok(GitProvider::Gitlab),
            "AZURE_DEVOPS" => Ok(GitProvider::AzureDevops),
            _ => Err(format!("Unknown git provider: {}", s)),
        }
    }
}

/// Who touched a record and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    pub created_by: i32,
    pub created_on: DateTime<Utc>,
    pub updated_by: i32,
    pub updated_on: DateTime<Utc>,
}

impl AuditLog {
    /// Audit fields for a record created now by `user_id`.
    pub fn created_by(user_id: i32) -> Self {
        let now = Utc::now();
        Self {
            created_by: user_id,
            created_on: now,
            updated_by: user_id,
            updated_on: now,
        }
    }

    /// Stamps an update by `user_id`.
    pub fn touch(&mut self, user_id: i32) {
        self.updated_by = user_id;
        self.updated_on = Utc::now();
    }
}

/// A persisted provider credential.
///
/// `host` is the key used to find the credential's entry in the mirrored
/// repository-credentials list. The token is wrapped in a [`SecretString`]
/// so it never shows up in `Debug` output.
#[derive(Debug)]
pub struct CredentialRecord {
    /// Assigned by the store; zero until the record has been created.
    pub id: i64,
    pub provider: GitProvider,
    pub username: String,
    pub token: SecretString,
    pub org_or_group_id: String,
    pub host: String,
    pub active: bool,
    pub audit: AuditLog,
}

impl Clone for CredentialRecord {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            provider: self.provider,
            username: self.username.clone(),
            token: SecretString::from(self.token.expose_secret().to_owned()),
            org_or_group_id: self.org_or_group_id.clone(),
            host: self.host.clone(),
            active: self.active,
            audit: self.audit.clone(),
        }
    }
}

/// Request/response shape at the service boundary.
///
/// `username` and `token` are write-only: they are accepted when
/// deserializing a request and never serialized back out.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsConfigDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub provider: Option<GitProvider>,
    #[serde(default, skip_serializing)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub token: String,
    #[serde(default)]
    pub git_lab_group_id: String,
    #[serde(default)]
    pub git_hub_org_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub active: bool,
}

impl std::fmt::Debug for GitOpsConfigDto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitOpsConfigDto")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .field("git_lab_group_id", &self.git_lab_group_id)
            .field("git_hub_org_id", &self.git_hub_org_id)
            .field("host", &self.host)
            .field("active", &self.active)
            .finish()
    }
}

impl GitOpsConfigDto {
    /// The org/group id that applies to `provider`: the GitLab group for
    /// GitLab, the organization for GitHub and Azure DevOps.
    pub fn org_or_group_id(&self, provider: GitProvider) -> &str {
        match provider {
            GitProvider::Gitlab => &self.git_lab_group_id,
            GitProvider::Github | GitProvider::AzureDevops => &self.git_hub_org_id,
        }
    }

    /// Read-side projection of a stored record, without username or token.
    pub fn from_record(record: &CredentialRecord) -> Self {
        let mut dto = Self {
            id: Some(record.id),
            provider: Some(record.provider),
            host: record.host.clone(),
            active: record.active,
            ..Self::default()
        };
        match record.provider {
            GitProvider::Gitlab => dto.git_lab_group_id = record.org_or_group_id.clone(),
            GitProvider::Github | GitProvider::AzureDevops => {
                dto.git_hub_org_id = record.org_or_group_id.clone()
            }
        }
        dto
    }
}
