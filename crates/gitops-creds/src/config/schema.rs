use serde::{Deserialize, Serialize};

use crate::secrets::TOKEN_KEY_ENV_VAR;
use crate::service::{
    MirrorTarget, DEFAULT_ARGOCD_CONFIG_MAP, DEFAULT_ARGOCD_NAMESPACE, DEFAULT_CLUSTER_NAME,
};

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub version: String,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cluster: ClusterSettings,
    #[serde(default)]
    pub argocd: ArgoCdSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default, skip_serializing)]
    pub token_key: Option<String>,
    #[serde(default)]
    pub token_key_file: Option<String>,
    #[serde(default = "default_token_key_env_var")]
    pub token_key_env_var: Option<String>,
}

fn default_token_key_env_var() -> Option<String> {
    Some(TOKEN_KEY_ENV_VAR.to_string())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database: DatabaseSettings::default(),
            cluster: ClusterSettings::default(),
            argocd: ArgoCdSettings::default(),
            logging: LoggingSettings::default(),
            token_key: None,
            token_key_file: None,
            token_key_env_var: default_token_key_env_var(),
        }
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("version", &self.version)
            .field("database", &self.database)
            .field("cluster", &self.cluster)
            .field("argocd", &self.argocd)
            .field("logging", &self.logging)
            .field("token_key", &self.token_key.as_ref().map(|_| "[REDACTED]"))
            .field("token_key_file", &self.token_key_file)
            .field("token_key_env_var", &self.token_key_env_var)
            .finish()
    }
}

impl ServiceConfig {
    pub fn mirror_target(&self) -> MirrorTarget {
        MirrorTarget {
            cluster_name: self.cluster.name.clone(),
            namespace: self.argocd.namespace.clone(),
            config_map_name: self.argocd.config_map_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Unset means [`crate::db::default_database_path`].
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    #[serde(default = "default_cluster_name")]
    pub name: String,
}

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCdSettings {
    #[serde(default = "default_argocd_namespace")]
    pub namespace: String,
    #[serde(default = "default_argocd_config_map")]
    pub config_map_name: String,
}

fn default_argocd_namespace() -> String {
    DEFAULT_ARGOCD_NAMESPACE.to_string()
}

fn default_argocd_config_map() -> String {
    DEFAULT_ARGOCD_CONFIG_MAP.to_string()
}

impl Default for ArgoCdSettings {
    fn default() -> Self {
        Self {
            namespace: default_argocd_namespace(),
            config_map_name: default_argocd_config_map(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
