use std::path::{Path, PathBuf};

use crate::config::schema::ServiceConfig;
use crate::error::ConfigError;
use crate::secrets::{resolve_secret_optional, TokenEncryptor};

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Overrides the Argo CD namespace.
pub const ENV_ARGOCD_NAMESPACE: &str = "ACD_NAMESPACE";
/// Overrides the Argo CD config map name.
pub const ENV_ARGOCD_CONFIG_MAP: &str = "ACD_CM";
/// Overrides the target cluster name.
pub const ENV_CLUSTER_NAME: &str = "GITOPS_CLUSTER_NAME";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses, schema-checks, applies environment overrides and validates.
pub fn load_config_from_str(content: &str) -> Result<ServiceConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: ServiceConfig = serde_json::from_value(json_value)?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

/// Applies `ACD_NAMESPACE`, `ACD_CM` and `GITOPS_CLUSTER_NAME` when set
/// and non-empty.
pub fn apply_env_overrides(config: &mut ServiceConfig) {
    let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

    if let Some(namespace) = read(ENV_ARGOCD_NAMESPACE) {
        log::debug!("Argo CD namespace overridden by {}", ENV_ARGOCD_NAMESPACE);
        config.argocd.namespace = namespace;
    }
    if let Some(name) = read(ENV_ARGOCD_CONFIG_MAP) {
        log::debug!("Argo CD config map overridden by {}", ENV_ARGOCD_CONFIG_MAP);
        config.argocd.config_map_name = name;
    }
    if let Some(name) = read(ENV_CLUSTER_NAME) {
        log::debug!("Cluster name overridden by {}", ENV_CLUSTER_NAME);
        config.cluster.name = name;
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let required = [
        ("cluster.name", &config.cluster.name),
        ("argocd.namespace", &config.argocd.namespace),
        ("argocd.configMapName", &config.argocd.config_map_name),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", field),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation {
            message: format!("Unknown log level: {}", config.logging.level),
        });
    }

    Ok(())
}

/// The configured database file, or the default location.
pub fn database_path(config: &ServiceConfig) -> Result<PathBuf, ConfigError> {
    match config.database.path.as_deref() {
        Some(path) => Ok(PathBuf::from(path)),
        None => crate::db::default_database_path().ok_or_else(|| ConfigError::Validation {
            message: "No database path configured and no home directory found".to_string(),
        }),
    }
}

/// Builds the token encryptor from the configured key source, if any.
pub fn token_encryptor(config: &ServiceConfig) -> Result<Option<TokenEncryptor>, ConfigError> {
    let key = resolve_secret_optional(
        config.token_key.as_deref(),
        config.token_key_file.as_deref(),
        config.token_key_env_var.as_deref(),
    )?;

    match key {
        Some(key) => {
            log::info!("Token encryption enabled");
            Ok(Some(TokenEncryptor::from_secret(&key)?))
        }
        None => {
            log::warn!("No token key configured; tokens will be stored in plaintext");
            Ok(None)
        }
    }
}
