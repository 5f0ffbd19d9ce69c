//! Mirroring of credentials into the Argo CD repository-credentials list.
//!
//! - `repository_credentials`: the embedded YAML list and the host-keyed merge
//! - `retry`: fixed-budget retry combinator
//! - `reconciler`: read-modify-write of the config map under optimistic concurrency

pub mod error;
pub mod reconciler;
pub mod repository_credentials;
pub mod retry;

pub use error::{ReconcileError, Result};
pub use reconciler::{ConfigMapReconciler, ReconcileOutcome, MAX_WRITE_ATTEMPTS};
pub use repository_credentials::{
    decode, encode, merge_credential, MergeOutcome, RepositoryCredentialEntry, SecretKeyRef,
    PASSWORD_KEY, REPOSITORY_CREDENTIALS_KEY, USERNAME_KEY,
};
pub use retry::{Retried, RetryError, RetryPolicy};
