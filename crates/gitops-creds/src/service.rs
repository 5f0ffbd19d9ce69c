//! Credential service: persists GitOps configs and mirrors them into the
//! Argo CD config map.
//!
//! A write is three steps: store the record, make sure the shared
//! credential secret exists, reconcile the repository-credentials list.
//! The steps are not transactional. A failure after the store write leaves
//! the record persisted and is reported to the caller.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::Instrument;

use crate::cluster::{ClusterConnector, SecretProvisioner};
use crate::error::{CredentialError, Result};
use crate::gitops::{ConfigMapReconciler, ReconcileOutcome};
use crate::model::{AuditLog, CredentialRecord, GitOpsConfigDto, GitProvider, GITOPS_SECRET_NAME};
use crate::store::CredentialStore;

/// Default name of the cluster that hosts Argo CD.
pub const DEFAULT_CLUSTER_NAME: &str = "default_cluster";
/// Default namespace of the Argo CD installation.
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "devtroncd";
/// Default name of the Argo CD config map.
pub const DEFAULT_ARGOCD_CONFIG_MAP: &str = "argocd-cm";

/// Where credentials are mirrored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTarget {
    pub cluster_name: String,
    pub namespace: String,
    pub config_map_name: String,
}

impl Default for MirrorTarget {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            config_map_name: DEFAULT_ARGOCD_CONFIG_MAP.to_string(),
        }
    }
}

pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    connector: Arc<dyn ClusterConnector>,
    reconciler: ConfigMapReconciler,
    target: MirrorTarget,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        connector: Arc<dyn ClusterConnector>,
        target: MirrorTarget,
    ) -> Self {
        Self {
            store,
            connector,
            reconciler: ConfigMapReconciler::default(),
            target,
        }
    }

    /// Replaces the default three-attempt reconciler.
    pub fn with_reconciler(mut self, reconciler: ConfigMapReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn target(&self) -> &MirrorTarget {
        &self.target
    }

    /// Stores a new config and mirrors it. Returns the request with the
    /// assigned id.
    pub async fn create_config(
        &self,
        request: GitOpsConfigDto,
        user_id: i32,
    ) -> Result<GitOpsConfigDto> {
        let provider = validate(&request)?;

        let record = CredentialRecord {
            id: 0,
            provider,
            username: request.username.clone(),
            token: SecretString::from(request.token.clone()),
            org_or_group_id: request.org_or_group_id(provider).to_string(),
            host: request.host.clone(),
            active: request.active,
            audit: AuditLog::created_by(user_id),
        };
        let record = self.store.create(record)?;
        log::info!(
            "Created {} GitOps config {} for {}",
            record.provider,
            record.id,
            record.host
        );

        self.mirror(&record)
            .instrument(mirror_span(&record))
            .await?;

        let mut response = request;
        response.id = Some(record.id);
        Ok(response)
    }

    /// Overwrites an existing config and mirrors it again.
    pub async fn update_config(&self, request: GitOpsConfigDto, user_id: i32) -> Result<()> {
        let id = request
            .id
            .ok_or_else(|| CredentialError::Validation("id is required for update".to_string()))?;
        let provider = validate(&request)?;

        let mut record = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| CredentialError::NotFound(format!("id {}", id)))?;

        record.provider = provider;
        record.username = request.username.clone();
        record.token = SecretString::from(request.token.clone());
        record.org_or_group_id = request.org_or_group_id(provider).to_string();
        record.host = request.host.clone();
        record.active = request.active;
        record.audit.touch(user_id);

        self.store.update(&record)?;
        log::info!("Updated GitOps config {} for {}", record.id, record.host);

        self.mirror(&record)
            .instrument(mirror_span(&record))
            .await?;
        Ok(())
    }

    pub fn get_by_id(&self, id: i64) -> Result<GitOpsConfigDto> {
        let record = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| CredentialError::NotFound(format!("id {}", id)))?;
        Ok(GitOpsConfigDto::from_record(&record))
    }

    pub fn get_all(&self) -> Result<Vec<GitOpsConfigDto>> {
        Ok(self
            .store
            .get_all()?
            .iter()
            .map(GitOpsConfigDto::from_record)
            .collect())
    }

    pub fn get_by_provider(&self, provider: GitProvider) -> Result<GitOpsConfigDto> {
        let record = self
            .store
            .get_by_provider(provider)?
            .ok_or_else(|| CredentialError::NotFound(format!("provider {}", provider)))?;
        Ok(GitOpsConfigDto::from_record(&record))
    }

    /// Connects to the target cluster, ensures the shared secret and
    /// reconciles the config map.
    async fn mirror(&self, record: &CredentialRecord) -> Result<ReconcileOutcome> {
        let target = &self.target;
        let client = self
            .connector
            .connect(&target.cluster_name)
            .await
            .inspect_err(|e| {
                log::error!("Cannot connect to cluster {}: {}", target.cluster_name, e)
            })?;

        let secret = SecretProvisioner::new(client.as_ref())
            .ensure_secret(
                &target.namespace,
                GITOPS_SECRET_NAME,
                &record.username,
                record.token.expose_secret(),
            )
            .await?;

        let outcome = self
            .reconciler
            .reconcile(
                client.as_ref(),
                &target.namespace,
                &target.config_map_name,
                record,
                &secret.name,
            )
            .await
            .inspect_err(|e| {
                log::error!(
                    "Failed to mirror GitOps config {} into {}/{}: {}",
                    record.id,
                    target.namespace,
                    target.config_map_name,
                    e
                )
            })?;

        log::debug!(
            "Mirrored GitOps config {} in {} attempt(s), written: {}",
            record.id,
            outcome.attempts,
            outcome.written
        );
        Ok(outcome)
    }
}

fn mirror_span(record: &CredentialRecord) -> tracing::Span {
    tracing::info_span!("gitops.mirror", config_id = record.id, host = %record.host)
}

fn validate(request: &GitOpsConfigDto) -> Result<GitProvider> {
    let provider = request
        .provider
        .ok_or_else(|| CredentialError::Validation("provider is required".to_string()))?;
    if request.host.trim().is_empty() {
        return Err(CredentialError::Validation(
            "host must not be empty".to_string(),
        ));
    }
    Ok(provider)
}
