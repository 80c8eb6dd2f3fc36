//! Repository error type

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    /// Row missing, or owned by somebody else
    #[error("not found")]
    NotFound,

    /// A storage constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    /// Value cannot be stored as given
    #[error("invalid value: {0}")]
    Invalid(String),

    #[error(transparent)]
    Db(DbErr),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<DbErr> for RepoError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => RepoError::Conflict(detail),
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => RepoError::Conflict(detail),
            _ => match err {
                DbErr::RecordNotFound(_) => RepoError::NotFound,
                other => RepoError::Db(other),
            },
        }
    }
}

impl RepoError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepoError::Conflict(_))
    }
}
