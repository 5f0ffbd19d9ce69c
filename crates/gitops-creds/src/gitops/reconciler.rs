//! Config map reconciler: read → merge → conditional write, retried on
//! version conflicts.
//!
//! The Argo CD config map is shared by every credential and every service
//! replica. Each attempt re-reads the map to get a fresh resource version,
//! merges the credential into the embedded list and writes it back with
//! that version. A concurrent writer makes the write fail with a conflict
//! and the attempt is repeated from the read.

use crate::cluster::ClusterApi;
use crate::model::CredentialRecord;

use super::error::{ReconcileError, Result};
use super::repository_credentials::{decode, encode, merge_credential, REPOSITORY_CREDENTIALS_KEY};
use super::retry::{Retried, RetryError, RetryPolicy};

/// Total number of read-modify-write attempts per reconcile.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Result of a successful reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// False when the host already had an entry and nothing was written.
    pub written: bool,
}

/// Merges credential records into the repository-credentials list of a
/// config map under optimistic concurrency.
#[derive(Debug, Clone)]
pub struct ConfigMapReconciler {
    policy: RetryPolicy,
}

impl Default for ConfigMapReconciler {
    fn default() -> Self {
        Self::new(RetryPolicy::fixed(MAX_WRITE_ATTEMPTS))
    }
}

impl ConfigMapReconciler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Mirrors `credential` into `namespace/config_map_name`.
    ///
    /// When the host already has an entry, its secret refs are pointed at
    /// `secret_name` in memory and the call returns without writing. When
    /// it does not, a new entry is appended and the config map is updated
    /// with the version read in the same attempt. Conflicts are retried up
    /// to the policy's budget, then reported as
    /// [`ReconcileError::ConflictExhausted`]. Any other failure ends the
    /// call immediately.
    pub async fn reconcile(
        &self,
        client: &dyn ClusterApi,
        namespace: &str,
        config_map_name: &str,
        credential: &CredentialRecord,
        secret_name: &str,
    ) -> Result<ReconcileOutcome> {
        let result = self
            .policy
            .run(
                move |attempt| {
                    self.merge_once(
                        client,
                        namespace,
                        config_map_name,
                        credential,
                        secret_name,
                        attempt,
                    )
                },
                ReconcileError::is_retryable,
            )
            .await;

        match result {
            Ok(Retried {
                value: written,
                attempts,
            }) => Ok(ReconcileOutcome { attempts, written }),
            Err(RetryError::Exhausted { attempts, .. }) => {
                log::error!(
                    "Giving up on config map {}/{} after {} conflicting attempts",
                    namespace,
                    config_map_name,
                    attempts
                );
                Err(ReconcileError::ConflictExhausted {
                    namespace: namespace.to_string(),
                    name: config_map_name.to_string(),
                    attempts,
                })
            }
            Err(RetryError::Aborted { error, .. }) => Err(error),
        }
    }

    /// One read-modify-write pass. Returns whether the config map was
    /// written.
    async fn merge_once(
        &self,
        client: &dyn ClusterApi,
        namespace: &str,
        config_map_name: &str,
        credential: &CredentialRecord,
        secret_name: &str,
        attempt: u32,
    ) -> Result<bool> {
        log::debug!(
            "Reconciling {} into config map {}/{} (attempt {}/{})",
            credential.host,
            namespace,
            config_map_name,
            attempt,
            self.policy.max_attempts()
        );

        let mut config_map = client.get_config_map(namespace, config_map_name).await?;

        let serialization_error = |source| ReconcileError::Serialization {
            namespace: namespace.to_string(),
            name: config_map_name.to_string(),
            source,
        };

        let current = config_map
            .data
            .get(REPOSITORY_CREDENTIALS_KEY)
            .map(String::as_str)
            .unwrap_or_default();
        let mut entries = decode(current).map_err(serialization_error)?;
        let outcome = merge_credential(&mut entries, credential, secret_name);
        let encoded = encode(&entries).map_err(serialization_error)?;

        if outcome.is_found() {
            log::debug!(
                "Config map {}/{} already has an entry for {}",
                namespace,
                config_map_name,
                credential.host
            );
            return Ok(false);
        }

        config_map
            .data
            .insert(REPOSITORY_CREDENTIALS_KEY.to_string(), encoded);
        client.update_config_map(&config_map).await?;

        log::info!(
            "Added repository credentials for {} to config map {}/{}",
            credential.host,
            namespace,
            config_map_name
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterError, ConfigMap, InMemoryCluster};
    use crate::gitops::repository_credentials::{
        RepositoryCredentialEntry, SecretKeyRef, PASSWORD_KEY, USERNAME_KEY,
    };
    use crate::model::{AuditLog, GitProvider, GITOPS_SECRET_NAME};
    use secrecy::SecretString;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const NS: &str = "devtroncd";
    const CM: &str = "argocd-cm";

    fn credential(host: &str) -> CredentialRecord {
        CredentialRecord {
            id: 1,
            provider: GitProvider::Github,
            username: "u".to_string(),
            token: SecretString::from("t"),
            org_or_group_id: "org".to_string(),
            host: host.to_string(),
            active: true,
            audit: AuditLog::created_by(1),
        }
    }

    fn setup(initial: Option<&str>) -> InMemoryCluster {
        let cluster = InMemoryCluster::new("default_cluster");
        let mut cm = ConfigMap::new(NS, CM).with_data("url", "https://argocd.example.com");
        if let Some(text) = initial {
            cm = cm.with_data(REPOSITORY_CREDENTIALS_KEY, text);
        }
        cluster.insert_config_map(cm).unwrap();
        cluster
    }

    fn stored_entries(cluster: &InMemoryCluster) -> Vec<RepositoryCredentialEntry> {
        let cm = cluster.config_map(NS, CM).unwrap();
        decode(&cm.data[REPOSITORY_CREDENTIALS_KEY]).unwrap()
    }

    #[tokio::test]
    async fn test_new_host_is_appended_and_written() {
        let cluster = setup(None);
        let outcome = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome {
                attempts: 1,
                written: true
            }
        );
        let entries = stored_entries(&cluster);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].username_secret,
            Some(SecretKeyRef::new("u", USERNAME_KEY))
        );
        assert_eq!(
            entries[0].password_secret,
            Some(SecretKeyRef::new("t", PASSWORD_KEY))
        );

        // Unrelated keys are left alone.
        let cm = cluster.config_map(NS, CM).unwrap();
        assert_eq!(cm.data["url"], "https://argocd.example.com");
    }

    #[tokio::test]
    async fn test_second_reconcile_is_a_no_op() {
        let cluster = setup(None);
        let reconciler = ConfigMapReconciler::default();
        let cred = credential("https://github.com/org");

        reconciler
            .reconcile(&cluster, NS, CM, &cred, GITOPS_SECRET_NAME)
            .await
            .unwrap();
        let version_after_first = cluster.config_map(NS, CM).unwrap().resource_version;

        let outcome = reconciler
            .reconcile(&cluster, NS, CM, &cred, GITOPS_SECRET_NAME)
            .await
            .unwrap();

        assert!(!outcome.written);
        assert_eq!(cluster.update_config_map_calls(), 1);
        assert_eq!(
            cluster.config_map(NS, CM).unwrap().resource_version,
            version_after_first
        );
        assert_eq!(stored_entries(&cluster).len(), 1);
    }

    #[tokio::test]
    async fn test_existing_entry_is_not_rewritten() {
        let text = encode(&[RepositoryCredentialEntry {
            url: "https://github.com/org".to_string(),
            username_secret: Some(SecretKeyRef::new("stale", USERNAME_KEY)),
            password_secret: Some(SecretKeyRef::new("stale", PASSWORD_KEY)),
            extra: BTreeMap::new(),
        }])
        .unwrap();
        let cluster = setup(Some(&text));

        let outcome = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap();

        assert!(!outcome.written);
        assert_eq!(cluster.update_config_map_calls(), 0);
        assert_eq!(
            cluster.config_map(NS, CM).unwrap().data[REPOSITORY_CREDENTIALS_KEY],
            text
        );
    }

    #[tokio::test]
    async fn test_conflict_then_success_retries() {
        let cluster = setup(None);
        cluster.inject_conflicts(2).unwrap();

        let outcome = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert!(outcome.written);
        assert_eq!(cluster.get_config_map_calls(), 3);
        assert_eq!(stored_entries(&cluster).len(), 1);
    }

    #[tokio::test]
    async fn test_every_attempt_conflicting_exhausts_budget() {
        let cluster = setup(None);
        let before = cluster.config_map(NS, CM).unwrap();
        cluster.inject_conflicts(u32::MAX).unwrap();

        let err = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ConflictExhausted { attempts: 3, .. }
        ));
        assert_eq!(cluster.get_config_map_calls(), 3);
        assert_eq!(cluster.update_config_map_calls(), 3);
        assert_eq!(cluster.config_map(NS, CM).unwrap(), before);
    }

    #[tokio::test]
    async fn test_concurrent_writer_entries_are_kept() {
        let cluster = setup(None);
        cluster
            .interleave_writer(
                1,
                Arc::new(|cm: &mut ConfigMap| {
                    let mut entries = cm
                        .data
                        .get(REPOSITORY_CREDENTIALS_KEY)
                        .map(|t| decode(t).unwrap())
                        .unwrap_or_default();
                    entries.push(RepositoryCredentialEntry {
                        url: "https://gitlab.com/other".to_string(),
                        ..RepositoryCredentialEntry::default()
                    });
                    cm.data.insert(
                        REPOSITORY_CREDENTIALS_KEY.to_string(),
                        encode(&entries).unwrap(),
                    );
                }),
            )
            .unwrap();

        let outcome = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        let urls: Vec<String> = stored_entries(&cluster).into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://gitlab.com/other", "https://github.com/org"]);
    }

    #[tokio::test]
    async fn test_malformed_list_is_serialization_error() {
        let cluster = setup(Some("- url: [broken"));

        let err = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Serialization { .. }));
        assert_eq!(cluster.get_config_map_calls(), 1);
        assert_eq!(cluster.update_config_map_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_config_map_is_not_retried() {
        let cluster = InMemoryCluster::new("default_cluster");

        let err = ConfigMapReconciler::default()
            .reconcile(
                &cluster,
                NS,
                CM,
                &credential("https://github.com/org"),
                GITOPS_SECRET_NAME,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Cluster(ClusterError::NotFound { .. })
        ));
        assert_eq!(cluster.get_config_map_calls(), 1);
    }
}
