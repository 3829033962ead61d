use crate::db::DbError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a store operation. Absent data is never reported as an error.
#[derive(Debug)]
pub enum StoreError {
    /// `initialize` has not succeeded yet, or `cleanup` closed the store.
    NotInitialized,
    Db(DbError),
    Repo(RepoError),
    /// `optimize` could not re-open the shared connection.
    ConnectionLost(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "store is not initialized"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::ConnectionLost(err) => {
                write!(f, "store connection could not be re-opened: {err}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotInitialized => None,
            Self::Db(err) | Self::ConnectionLost(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
