//! In-memory cluster with resource-version checks.
//!
//! Behaves like the API server for the handful of calls the sync needs:
//! every successful config map write bumps the resource version, and an
//! update carrying a stale version is rejected. Call counters and fault
//! injection hooks let tests assert exact attempt counts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ClusterApi, ClusterConnector, ClusterError, ConfigMap, Result, Secret};

type ObjectKey = (String, String);

/// Mutation applied by a simulated concurrent writer.
pub type ConcurrentWrite = Arc<dyn Fn(&mut ConfigMap) + Send + Sync>;

#[derive(Default)]
struct State {
    secrets: BTreeMap<ObjectKey, Secret>,
    config_maps: BTreeMap<ObjectKey, ConfigMap>,
    last_version: u64,
    injected_conflicts: u32,
    concurrent_writer: Option<(u32, ConcurrentWrite)>,
    secret_read_failure: Option<ClusterError>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }
}

#[derive(Default)]
struct Counters {
    get_secret: AtomicU32,
    create_secret: AtomicU32,
    get_config_map: AtomicU32,
    update_config_map: AtomicU32,
}

/// Cloneable handle to a shared in-memory cluster.
#[derive(Clone)]
pub struct InMemoryCluster {
    cluster_name: String,
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
}

impl InMemoryCluster {
    /// Creates an empty cluster reachable under `cluster_name`.
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            state: Arc::new(Mutex::new(State::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ClusterError::Api("in-memory cluster lock poisoned".to_string()))
    }

    /// Stores a config map as-is, assigning a fresh resource version.
    pub fn insert_config_map(&self, mut config_map: ConfigMap) -> Result<ConfigMap> {
        let mut state = self.state()?;
        config_map.resource_version = Some(state.next_version());
        let key = (config_map.namespace.clone(), config_map.name.clone());
        state.config_maps.insert(key, config_map.clone());
        Ok(config_map)
    }

    /// Stores a secret as-is.
    pub fn insert_secret(&self, secret: Secret) -> Result<()> {
        let mut state = self.state()?;
        let key = (secret.namespace.clone(), secret.name.clone());
        state.secrets.insert(key, secret);
        Ok(())
    }

    /// Current stored copy of a config map, bypassing call counters.
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        let state = self.state().ok()?;
        let found = state
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned();
        found
    }

    /// Current stored copy of a secret, bypassing call counters.
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        let state = self.state().ok()?;
        let found = state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned();
        found
    }

    /// Rejects the next `count` config map updates with a conflict without
    /// touching the stored object.
    pub fn inject_conflicts(&self, count: u32) -> Result<()> {
        self.state()?.injected_conflicts = count;
        Ok(())
    }

    /// Simulates another writer landing between a caller's read and write:
    /// before each of the next `count` updates, `write` is applied to the
    /// stored config map and its version is bumped.
    pub fn interleave_writer(&self, count: u32, write: ConcurrentWrite) -> Result<()> {
        self.state()?.concurrent_writer = Some((count, write));
        Ok(())
    }

    /// Makes the next secret read fail with `error`.
    pub fn fail_next_secret_read(&self, error: ClusterError) -> Result<()> {
        self.state()?.secret_read_failure = Some(error);
        Ok(())
    }

    pub fn get_secret_calls(&self) -> u32 {
        self.counters.get_secret.load(Ordering::SeqCst)
    }

    pub fn create_secret_calls(&self) -> u32 {
        self.counters.create_secret.load(Ordering::SeqCst)
    }

    pub fn get_config_map_calls(&self) -> u32 {
        self.counters.get_config_map.load(Ordering::SeqCst)
    }

    pub fn update_config_map_calls(&self) -> u32 {
        self.counters.update_config_map.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.counters.get_secret.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state()?;
        if let Some(error) = state.secret_read_failure.take() {
            return Err(error);
        }
        let found = state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned();
        found.ok_or_else(|| ClusterError::NotFound {
            kind: "Secret",
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    async fn create_secret(
        &self,
        namespace: &str,
        name: &str,
        username: &str,
        token: &str,
    ) -> Result<Secret> {
        self.counters.create_secret.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state()?;
        let key = (namespace.to_string(), name.to_string());
        if state.secrets.contains_key(&key) {
            return Err(ClusterError::Api(format!(
                "secret {}/{} already exists",
                namespace, name
            )));
        }

        let mut data = BTreeMap::new();
        data.insert("username".to_string(), username.to_string());
        data.insert("password".to_string(), token.to_string());
        let secret = Secret {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data,
        };
        state.secrets.insert(key, secret.clone());
        Ok(secret)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        self.counters.get_config_map.fetch_add(1, Ordering::SeqCst);
        let state = self.state()?;
        let found = state
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned();
        found.ok_or_else(|| ClusterError::NotFound {
            kind: "ConfigMap",
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        self.counters.update_config_map.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state()?;
        let conflict = || ClusterError::Conflict {
            kind: "ConfigMap",
            namespace: config_map.namespace.clone(),
            name: config_map.name.clone(),
        };

        if state.injected_conflicts > 0 {
            state.injected_conflicts -= 1;
            return Err(conflict());
        }

        let key = (config_map.namespace.clone(), config_map.name.clone());

        if let Some((remaining, write)) = state.concurrent_writer.take() {
            let version = state.next_version();
            if let Some(stored) = state.config_maps.get_mut(&key) {
                (write.as_ref())(stored);
                stored.resource_version = Some(version);
            }
            if remaining > 1 {
                state.concurrent_writer = Some((remaining - 1, write));
            }
        }

        let stored_version = match state.config_maps.get(&key) {
            Some(stored) => stored.resource_version.clone(),
            None => {
                return Err(ClusterError::NotFound {
                    kind: "ConfigMap",
                    namespace: config_map.namespace.clone(),
                    name: config_map.name.clone(),
                })
            }
        };
        if stored_version != config_map.resource_version {
            return Err(conflict());
        }

        let mut updated = config_map.clone();
        updated.resource_version = Some(state.next_version());
        state.config_maps.insert(key, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl ClusterConnector for InMemoryCluster {
    async fn connect(&self, cluster_name: &str) -> Result<Arc<dyn ClusterApi>> {
        if cluster_name != self.cluster_name {
            return Err(ClusterError::UnknownCluster(cluster_name.to_string()));
        }
        let api: Arc<dyn ClusterApi> = Arc::new(self.clone());
        Ok(api)
    }
}
