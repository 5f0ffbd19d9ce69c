//! Test harness for isolated service execution.
//!
//! Each harness owns a temporary directory holding a file-backed SQLite
//! database and an in-memory cluster that already contains the Argo CD
//! config map.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use gitops_creds::cluster::ConfigMap;
use gitops_creds::db::Database;
use gitops_creds::gitops::{decode, RepositoryCredentialEntry, REPOSITORY_CREDENTIALS_KEY};
use gitops_creds::{
    CredentialService, InMemoryCluster, MirrorTarget, SqliteCredentialStore, TokenEncryptor,
};

pub const TEST_TOKEN_KEY: &str =
    "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub db: Database,
    pub cluster: InMemoryCluster,
    pub target: MirrorTarget,
    pub service: CredentialService,
}

impl TestHarness {
    /// Plaintext token storage, empty `argocd-cm`.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Encrypted token storage.
    pub fn encrypted() -> Self {
        let encryptor =
            TokenEncryptor::from_hex_key(TEST_TOKEN_KEY).expect("Failed to build encryptor");
        Self::build(Some(encryptor), None)
    }

    /// `argocd-cm` seeded with `repository.credentials` set to `credentials`.
    pub fn with_credentials(credentials: &str) -> Self {
        Self::build(None, Some(credentials))
    }

    fn build(encryptor: Option<TokenEncryptor>, credentials: Option<&str>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("credentials.db");
        let db = Database::open(&db_path).expect("Failed to open database");

        let target = MirrorTarget::default();
        let cluster = InMemoryCluster::new(target.cluster_name.clone());
        let mut config_map = ConfigMap::new(target.namespace.clone(), target.config_map_name.clone());
        if let Some(credentials) = credentials {
            config_map = config_map.with_data(REPOSITORY_CREDENTIALS_KEY, credentials);
        }
        cluster
            .insert_config_map(config_map)
            .expect("Failed to seed config map");

        let store = match encryptor {
            Some(encryptor) => SqliteCredentialStore::with_encryptor(db.clone(), encryptor),
            None => SqliteCredentialStore::new(db.clone()),
        };
        let service = CredentialService::new(
            Arc::new(store),
            Arc::new(cluster.clone()),
            target.clone(),
        );

        Self {
            temp_dir,
            db_path,
            db,
            cluster,
            target,
            service,
        }
    }

    /// Raw `repository.credentials` text currently stored in the cluster.
    pub fn credentials_text(&self) -> String {
        self.cluster
            .config_map(&self.target.namespace, &self.target.config_map_name)
            .and_then(|cm| cm.data.get(REPOSITORY_CREDENTIALS_KEY).cloned())
            .unwrap_or_default()
    }

    /// Decoded `repository.credentials` list currently stored in the cluster.
    pub fn entries(&self) -> Vec<RepositoryCredentialEntry> {
        decode(&self.credentials_text()).expect("Stored credentials are not valid YAML")
    }

    /// Version of the config map currently stored in the cluster.
    pub fn config_map_version(&self) -> Option<String> {
        self.cluster
            .config_map(&self.target.namespace, &self.target.config_map_name)
            .and_then(|cm| cm.resource_version)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
