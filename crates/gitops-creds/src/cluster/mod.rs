//! Cluster API seam.
//!
//! The reconciler and the secret provisioner only talk to the cluster
//! through [`ClusterApi`], and the service obtains a client per request
//! through [`ClusterConnector`]. `InMemoryCluster` backs tests and local
//! runs; `KubeClusterApi` (feature `kube`) talks to a real API server.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod secret;

#[cfg(feature = "kube")]
pub mod kube_api;

pub use memory::InMemoryCluster;
pub use secret::{SecretProvisioner, SecretRef};

#[cfg(feature = "kube")]
pub use kube_api::{KubeClusterApi, KubeConnector};

/// Errors returned by cluster API calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} was modified concurrently (stale resource version)")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("Cluster API request failed: {0}")]
    Api(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    /// True when a write was rejected because the caller's resource
    /// version is stale.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;

/// A versioned key/value configuration object.
///
/// `resource_version` is the optimistic concurrency token: an update
/// carrying a version other than the stored one is rejected with
/// [`ClusterError::Conflict`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMap {
    pub namespace: String,
    pub name: String,
    pub resource_version: Option<String>,
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A secret object holding string data.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The operations the credential sync needs from a cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetches a secret; [`ClusterError::NotFound`] when absent.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    /// Creates a secret with `username` and `password` keys.
    async fn create_secret(
        &self,
        namespace: &str,
        name: &str,
        username: &str,
        token: &str,
    ) -> Result<Secret>;

    /// Fetches a config map together with its current resource version.
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap>;

    /// Replaces a config map, checking `config_map.resource_version`
    /// against the stored version.
    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap>;
}

/// Resolves a cluster name to a client.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, cluster_name: &str) -> Result<Arc<dyn ClusterApi>>;
}
