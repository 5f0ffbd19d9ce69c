use std::path::PathBuf;
use thiserror::Error;

use crate::cluster::ClusterError;
use crate::gitops::ReconcileError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("GitOps config not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Coarse classification of a [`CredentialError`] for callers that map
/// failures onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Infra,
    Serialization,
    ConflictExhausted,
}

impl CredentialError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CredentialError::Validation(_) => ErrorKind::Validation,
            CredentialError::NotFound(_) => ErrorKind::NotFound,
            CredentialError::Store(_) | CredentialError::Cluster(_) => ErrorKind::Infra,
            CredentialError::Reconcile(ReconcileError::Serialization { .. }) => {
                ErrorKind::Serialization
            }
            CredentialError::Reconcile(ReconcileError::ConflictExhausted { .. }) => {
                ErrorKind::ConflictExhausted
            }
            CredentialError::Reconcile(ReconcileError::Cluster(_)) => ErrorKind::Infra,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve token encryption key: {0}")]
    TokenKey(#[from] crate::secrets::SecretError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
