//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for settings and diary entries.
//! - Isolate SQLite query details from the store's locking discipline.
//!
//! # Invariants
//! - Repositories borrow a connection; they never own or cache one.
//! - Repositories only accept connections migrated to the latest schema.
//! - Read paths reject corrupt persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::diary::DiaryEntryId;
use crate::model::settings::SettingsValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod diary_repo;
pub mod settings_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for settings and diary persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(SettingsValidationError),
    Db(DbError),
    NotFound(DiaryEntryId),
    InvalidData(String),
    Serialization(serde_json::Error),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "diary entry not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Serialization(err) => write!(f, "failed to encode record field: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match required {expected_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::UninitializedConnection { .. } => {
                None
            }
        }
    }
}

impl From<SettingsValidationError> for RepoError {
    fn from(value: SettingsValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Rejects connections that have not been through `apply_migrations`.
fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
