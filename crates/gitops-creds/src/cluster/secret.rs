//! Idempotent provisioning of the credential secret.

use super::{ClusterApi, Result};

/// Reference to a secret object in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

/// Makes sure a username/token secret exists.
pub struct SecretProvisioner<'a> {
    client: &'a dyn ClusterApi,
}

impl<'a> SecretProvisioner<'a> {
    pub fn new(client: &'a dyn ClusterApi) -> Self {
        Self { client }
    }

    /// Returns a reference to `namespace/name`, creating the secret from
    /// `username`/`token` only when it does not exist yet. An existing
    /// secret is never modified. Read errors other than "not found" are
    /// returned unchanged.
    pub async fn ensure_secret(
        &self,
        namespace: &str,
        name: &str,
        username: &str,
        token: &str,
    ) -> Result<SecretRef> {
        match self.client.get_secret(namespace, name).await {
            Ok(existing) => {
                log::debug!("Secret {}/{} already exists", namespace, name);
                Ok(SecretRef {
                    namespace: existing.namespace,
                    name: existing.name,
                })
            }
            Err(e) if e.is_not_found() => {
                log::info!("Creating secret {}/{}", namespace, name);
                let created = self
                    .client
                    .create_secret(namespace, name, username, token)
                    .await
                    .inspect_err(|e| {
                        log::error!("Failed to create secret {}/{}: {}", namespace, name, e)
                    })?;
                Ok(SecretRef {
                    namespace: created.namespace,
                    name: created.name,
                })
            }
            Err(e) => {
                log::error!("Failed to read secret {}/{}: {}", namespace, name, e);
                Err(e)
            }
        }
    }
}
