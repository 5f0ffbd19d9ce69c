//! GitOps config repository: CRUD operations for the `gitops_config` table.
//!
//! Rows are kept close to the table shape. Conversion to domain records
//! (provider parsing, token decryption) happens in the store layer.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw `gitops_config` row.
#[derive(Debug, Clone, PartialEq)]
pub struct GitOpsConfigRow {
    pub id: i64,
    pub provider: String,
    pub username: String,
    /// Plaintext, or hex ciphertext when `token_encrypted` is set.
    pub token: String,
    pub token_encrypted: bool,
    pub org_or_group_id: String,
    pub host: String,
    pub active: bool,
    pub created_by: i32,
    pub created_on: String,
    pub updated_by: i32,
    pub updated_on: String,
}

const SELECT_COLUMNS: &str = "SELECT id, provider, username, token, token_encrypted, org_or_group_id, host, active,
        created_by, created_on, updated_by, updated_on
 FROM gitops_config";

fn map_row(row: &Row<'_>) -> rusqlite::Result<GitOpsConfigRow> {
    Ok(GitOpsConfigRow {
        id: row.get(0)?,
        provider: row.get(1)?,
        username: row.get(2)?,
        token: row.get(3)?,
        token_encrypted: row.get(4)?,
        org_or_group_id: row.get(5)?,
        host: row.get(6)?,
        active: row.get(7)?,
        created_by: row.get(8)?,
        created_on: row.get(9)?,
        updated_by: row.get(10)?,
        updated_on: row.get(11)?,
    })
}

/// Inserts a row and returns the id SQLite assigned. `row.id` is ignored.
pub fn insert(db: &Database, row: &GitOpsConfigRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO gitops_config (provider, username, token, token_encrypted, org_or_group_id, host, active,
                                        created_by, created_on, updated_by, updated_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.provider,
                row.username,
                row.token,
                row.token_encrypted,
                row.org_or_group_id,
                row.host,
                row.active,
                row.created_by,
                row.created_on,
                row.updated_by,
                row.updated_on,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Overwrites the mutable columns of an existing row. The creation audit
/// fields are left as stored. Returns the number of rows changed.
pub fn update(db: &Database, row: &GitOpsConfigRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE gitops_config SET
               provider = ?2,
               username = ?3,
               token = ?4,
               token_encrypted = ?5,
               org_or_group_id = ?6,
               host = ?7,
               active = ?8,
               updated_by = ?9,
               updated_on = ?10
             WHERE id = ?1",
            params![
                row.id,
                row.provider,
                row.username,
                row.token,
                row.token_encrypted,
                row.org_or_group_id,
                row.host,
                row.active,
                row.updated_by,
                row.updated_on,
            ],
        )?;
        Ok(changed)
    })
}

/// Finds a row by id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<GitOpsConfigRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], map_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns every row, ordered by id.
pub fn find_all(db: &Database) -> Result<Vec<GitOpsConfigRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds the oldest row for a provider.
pub fn find_by_provider(
    db: &Database,
    provider: &str,
) -> Result<Option<GitOpsConfigRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE provider = ?1 ORDER BY id LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![provider], map_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}
