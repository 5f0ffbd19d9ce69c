//! Reconciliation error types.

use thiserror::Error;

use crate::cluster::ClusterError;

/// Errors that can occur while merging a credential into the mirrored
/// config map.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Malformed repository credentials in config map {namespace}/{name}: {source}")]
    Serialization {
        namespace: String,
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(
        "Config map {namespace}/{name} kept changing underneath us, gave up after {attempts} attempts"
    )]
    ConflictExhausted {
        namespace: String,
        name: String,
        attempts: u32,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ReconcileError {
    /// Returns true if the write lost an optimistic-concurrency race and the
    /// whole read-modify-write can be repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Cluster(e) if e.is_conflict())
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;
