pub mod cluster;
pub mod config;
pub mod db;
pub mod error;
pub mod gitops;
pub mod model;
pub mod secrets;
pub mod service;
pub mod store;
pub mod telemetry;

pub use cluster::{ClusterApi, ClusterConnector, ClusterError, InMemoryCluster, SecretProvisioner};
pub use config::{load_config, ServiceConfig};
pub use error::{ConfigError, CredentialError, ErrorKind, Result};
pub use gitops::{ConfigMapReconciler, ReconcileError, ReconcileOutcome, RetryPolicy};
pub use model::{CredentialRecord, GitOpsConfigDto, GitProvider, GITOPS_SECRET_NAME};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError, TokenEncryptor};
pub use service::{CredentialService, MirrorTarget};
pub use store::{CredentialStore, SqliteCredentialStore, StoreError};
