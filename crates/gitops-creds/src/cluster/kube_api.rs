//! `ClusterApi` on top of a kube-rs client.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap as KubeConfigMap, Secret as KubeSecret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};

use super::{ClusterApi, ClusterConnector, ClusterError, ConfigMap, Result, Secret};

fn map_kube_error(
    err: kube::Error,
    kind: &'static str,
    namespace: &str,
    name: &str,
) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 => ClusterError::Conflict {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => ClusterError::Api(other.to_string()),
    }
}

fn secret_from_kube(secret: KubeSecret, namespace: &str, name: &str) -> Secret {
    let mut data: BTreeMap<String, String> = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
        .collect();
    if let Some(string_data) = secret.string_data {
        data.extend(string_data);
    }
    Secret {
        namespace: secret
            .metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        name: secret.metadata.name.unwrap_or_else(|| name.to_string()),
        data,
    }
}

/// Cluster client backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: kube::Client,
}

impl KubeClusterApi {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let api: Api<KubeSecret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, "Secret", namespace, name))?;
        Ok(secret_from_kube(secret, namespace, name))
    }

    async fn create_secret(
        &self,
        namespace: &str,
        name: &str,
        username: &str,
        token: &str,
    ) -> Result<Secret> {
        let api: Api<KubeSecret> = Api::namespaced(self.client.clone(), namespace);

        let mut string_data = BTreeMap::new();
        string_data.insert("username".to_string(), username.to_string());
        string_data.insert("password".to_string(), token.to_string());

        let secret = KubeSecret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(string_data),
            ..Default::default()
        };

        let created = api
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| map_kube_error(e, "Secret", namespace, name))?;
        Ok(secret_from_kube(created, namespace, name))
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        let api: Api<KubeConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let cm = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, "ConfigMap", namespace, name))?;
        Ok(ConfigMap {
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: cm.metadata.resource_version,
            data: cm.data.unwrap_or_default(),
        })
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        let namespace = config_map.namespace.as_str();
        let name = config_map.name.as_str();
        let api: Api<KubeConfigMap> = Api::namespaced(self.client.clone(), namespace);

        // Fetch the full object so labels, annotations and binaryData survive
        // the replace; only `data` and the version we read earlier change.
        let mut current = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, "ConfigMap", namespace, name))?;
        current.metadata.resource_version = config_map.resource_version.clone();
        current.data = Some(config_map.data.clone());

        let replaced = api
            .replace(name, &PostParams::default(), &current)
            .await
            .map_err(|e| map_kube_error(e, "ConfigMap", namespace, name))?;
        Ok(ConfigMap {
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: replaced.metadata.resource_version,
            data: replaced.data.unwrap_or_default(),
        })
    }
}

/// Connector for single-cluster deployments: every cluster name resolves
/// to the same client.
pub struct KubeConnector {
    api: Arc<KubeClusterApi>,
}

impl KubeConnector {
    pub fn new(client: kube::Client) -> Self {
        Self {
            api: Arc::new(KubeClusterApi::new(client)),
        }
    }

    /// Builds a connector from the ambient kubeconfig or in-cluster
    /// service account.
    pub async fn try_default() -> Result<Self> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, cluster_name: &str) -> Result<Arc<dyn ClusterApi>> {
        log::debug!("Using in-process kube client for cluster {}", cluster_name);
        let api: Arc<dyn ClusterApi> = self.api.clone();
        Ok(api)
    }
}
