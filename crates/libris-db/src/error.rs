//! Errors raised by the storage layer.
//!
//! sqlx failures are sorted by constraint kind so callers can turn the
//! ones they expect (a taken ISBN, a loan that blocks a delete) into domain
//! errors. Domain rejections raised by a repository itself travel as
//! [`DbError::Rejected`]. The loan ledger never returns `DbError`: it logs
//! the cause and reports `CoreError::ProcessingFailed` instead.

use libris_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `columns` is SQLite's list, e.g. `loans.user_id, loans.book_id`.
    #[error("unique constraint failed on {columns}")]
    UniqueViolation { columns: String },

    /// A loan still points at the row, or a link points at nothing.
    #[error("foreign key constraint failed: {message}")]
    ForeignKeyViolation { message: String },

    /// Copy bounds or a status value outside the schema's CHECK.
    #[error("check constraint failed: {message}")]
    CheckViolation { message: String },

    #[error("cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether a unique index covering `column` (e.g. `"books.isbn"`) fired.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { columns } if columns.contains(column))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        columns: message
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or(&message)
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    ErrorKind::CheckViolation => DbError::CheckViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DbError::ConnectionFailed(err.to_string())
            }
            other => DbError::Internal(other.to_string()),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::ConflictReason;

    #[test]
    fn test_unique_violation_lookup() {
        let err = DbError::UniqueViolation {
            columns: "loans.user_id, loans.book_id".to_string(),
        };
        assert!(err.is_unique_violation_on("loans.user_id"));
        assert!(!err.is_unique_violation_on("books.isbn"));
    }

    #[test]
    fn test_core_error_passes_through() {
        let err: DbError = CoreError::Conflict(ConflictReason::InUse {
            entity: "Book".to_string(),
        })
        .into();
        assert_eq!(err.to_string(), "Book has loan history and cannot be deleted");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
