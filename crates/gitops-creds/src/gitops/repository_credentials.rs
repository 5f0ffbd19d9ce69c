//! The `repository.credentials` list embedded in the Argo CD config map.
//!
//! The field holds a YAML sequence of entries shaped like
//!
//! ```yaml
//! - url: https://github.com/acme
//!   usernameSecret:
//!     name: devtron-gitops-secret
//!     key: username
//!   passwordSecret:
//!     name: devtron-gitops-secret
//!     key: password
//! ```
//!
//! Keys this crate does not manage (`sshPrivateKeySecret`, `insecure`, ...)
//! are carried through untouched.

use std::collections::BTreeMap;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::model::CredentialRecord;

/// Config map key holding the encoded list.
pub const REPOSITORY_CREDENTIALS_KEY: &str = "repository.credentials";

/// Secret key holding the username.
pub const USERNAME_KEY: &str = "username";

/// Secret key holding the password/token.
pub const PASSWORD_KEY: &str = "password";

/// Points at one key inside a secret object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretKeyRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// Other selector fields such as `optional`, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl SecretKeyRef {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Repoints `slot` at `name`/`key`, keeping any extra selector fields an
/// existing ref already carries.
fn repoint(slot: &mut Option<SecretKeyRef>, name: &str, key: &str) {
    match slot {
        Some(existing) => {
            existing.name = name.to_string();
            existing.key = key.to_string();
        }
        None => *slot = Some(SecretKeyRef::new(name, key)),
    }
}

/// One element of the repository-credentials list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCredentialEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<SecretKeyRef>,
    /// Fields owned by other writers, preserved as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// What [`merge_credential`] did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// An entry for the host already existed at this index; its secret
    /// refs now point at the provisioned secret.
    Existing(usize),
    /// No entry matched; a new one was appended.
    Appended,
}

impl MergeOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, MergeOutcome::Existing(_))
    }
}

/// Decodes the embedded list. Empty or `null` content is an empty list.
pub fn decode(text: &str) -> Result<Vec<RepositoryCredentialEntry>, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Option<Vec<RepositoryCredentialEntry>> = serde_yaml::from_str(text)?;
    Ok(entries.unwrap_or_default())
}

/// Encodes the list back into its embedded YAML form.
pub fn encode(entries: &[RepositoryCredentialEntry]) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(entries)
}

/// Merges `credential` into `entries`, keyed by host.
///
/// The first entry whose `url` equals the host gets both secret refs
/// pointed at `secret_name`; extra fields on those refs (`optional`, ...)
/// are kept. When nothing matches, a new entry is appended
/// whose refs carry the credential's raw username and token as secret
/// names; existing readers of the list depend on that shape.
pub fn merge_credential(
    entries: &mut Vec<RepositoryCredentialEntry>,
    credential: &CredentialRecord,
    secret_name: &str,
) -> MergeOutcome {
    if let Some(index) = entries.iter().position(|e| e.url == credential.host) {
        let entry = &mut entries[index];
        repoint(&mut entry.username_secret, secret_name, USERNAME_KEY);
        repoint(&mut entry.password_secret, secret_name, PASSWORD_KEY);
        return MergeOutcome::Existing(index);
    }

    entries.push(RepositoryCredentialEntry {
        url: credential.host.clone(),
        username_secret: Some(SecretKeyRef::new(
            credential.username.clone(),
            USERNAME_KEY,
        )),
        password_secret: Some(SecretKeyRef::new(
            credential.token.expose_secret().to_owned(),
            PASSWORD_KEY,
        )),
        extra: BTreeMap::new(),
    });
    MergeOutcome::Appended
}
