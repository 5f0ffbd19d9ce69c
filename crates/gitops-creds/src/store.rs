//! Durable storage of credential records.
//!
//! [`CredentialStore`] is the seam the service works against;
//! [`SqliteCredentialStore`] is the SQLite-backed implementation, with
//! optional at-rest encryption of tokens.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::db::gitops_config_repo::{self, GitOpsConfigRow};
use crate::db::{Database, DatabaseError};
use crate::model::{AuditLog, CredentialRecord, GitProvider};
use crate::secrets::{SecretError, TokenEncryptor};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Token encryption error: {0}")]
    Secret(#[from] SecretError),

    #[error("Stored record {id} is unreadable: {reason}")]
    Corrupt { id: i64, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// CRUD over credential records. Missing records are `Ok(None)`.
pub trait CredentialStore: Send + Sync {
    /// Persists a new record and returns it with its assigned id.
    fn create(&self, record: CredentialRecord) -> Result<CredentialRecord>;

    /// Overwrites the stored record with the same id.
    fn update(&self, record: &CredentialRecord) -> Result<()>;

    fn get_by_id(&self, id: i64) -> Result<Option<CredentialRecord>>;

    fn get_all(&self) -> Result<Vec<CredentialRecord>>;

    /// The lowest-id record for `provider`.
    fn get_by_provider(&self, provider: GitProvider) -> Result<Option<CredentialRecord>>;
}

pub struct SqliteCredentialStore {
    db: Database,
    encryptor: Option<TokenEncryptor>,
}

impl SqliteCredentialStore {
    /// A store that keeps tokens in plaintext.
    pub fn new(db: Database) -> Self {
        Self { db, encryptor: None }
    }

    /// A store that encrypts tokens before writing them.
    pub fn with_encryptor(db: Database, encryptor: TokenEncryptor) -> Self {
        Self {
            db,
            encryptor: Some(encryptor),
        }
    }

    pub fn encrypts_tokens(&self) -> bool {
        self.encryptor.is_some()
    }

    fn to_row(&self, record: &CredentialRecord) -> Result<GitOpsConfigRow> {
        let plaintext = record.token.expose_secret();
        let (token, token_encrypted) = match &self.encryptor {
            Some(encryptor) => (encryptor.encrypt(plaintext)?, true),
            None => (plaintext.to_owned(), false),
        };

        Ok(GitOpsConfigRow {
            id: record.id,
            provider: record.provider.as_str().to_string(),
            username: record.username.clone(),
            token,
            token_encrypted,
            org_or_group_id: record.org_or_group_id.clone(),
            host: record.host.clone(),
            active: record.active,
            created_by: record.audit.created_by,
            created_on: record.audit.created_on.to_rfc3339(),
            updated_by: record.audit.updated_by,
            updated_on: record.audit.updated_on.to_rfc3339(),
        })
    }

    fn from_row(&self, row: GitOpsConfigRow) -> Result<CredentialRecord> {
        let id = row.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };

        let provider: GitProvider = row.provider.parse().map_err(corrupt)?;

        let token = if row.token_encrypted {
            let encryptor = self.encryptor.as_ref().ok_or_else(|| {
                corrupt("token is encrypted but no token key is configured".to_string())
            })?;
            encryptor.decrypt(&row.token)?
        } else {
            row.token
        };

        Ok(CredentialRecord {
            id,
            provider,
            username: row.username,
            token: SecretString::from(token),
            org_or_group_id: row.org_or_group_id,
            host: row.host,
            active: row.active,
            audit: AuditLog {
                created_by: row.created_by,
                created_on: parse_timestamp(&row.created_on).map_err(corrupt)?,
                updated_by: row.updated_by,
                updated_on: parse_timestamp(&row.updated_on).map_err(corrupt)?,
            },
        })
    }
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
}

impl CredentialStore for SqliteCredentialStore {
    fn create(&self, mut record: CredentialRecord) -> Result<CredentialRecord> {
        let row = self.to_row(&record)?;
        record.id = gitops_config_repo::insert(&self.db, &row)?;
        log::debug!(
            "Stored {} credential {} for {}",
            record.provider,
            record.id,
            record.host
        );
        Ok(record)
    }

    fn update(&self, record: &CredentialRecord) -> Result<()> {
        let row = self.to_row(record)?;
        let changed = gitops_config_repo::update(&self.db, &row)?;
        if changed == 0 {
            log::warn!("Update of credential {} matched no rows", record.id);
        }
        Ok(())
    }

    fn get_by_id(&self, id: i64) -> Result<Option<CredentialRecord>> {
        gitops_config_repo::find_by_id(&self.db, id)?
            .map(|row| self.from_row(row))
            .transpose()
    }

    fn get_all(&self) -> Result<Vec<CredentialRecord>> {
        gitops_config_repo::find_all(&self.db)?
            .into_iter()
            .map(|row| self.from_row(row))
            .collect()
    }

    fn get_by_provider(&self, provider: GitProvider) -> Result<Option<CredentialRecord>> {
        gitops_config_repo::find_by_provider(&self.db, provider.as_str())?
            .map(|row| self.from_row(row))
            .transpose()
    }
}
