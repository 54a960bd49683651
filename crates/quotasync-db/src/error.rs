//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// A stored value could not be mapped onto the domain model
    #[error("corrupt row: {0}")]
    Decode(String),
}

/// Result alias for repository calls
pub type DbResult<T> = Result<T, DbError>;
