//! Error types for SQLite operations.

use rowkeeper_query::QueryError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Errors raised by the SQLite driver.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Opening the database file failed.
    #[error("connection error: {path}: {source}")]
    Open {
        /// Database path.
        path: String,
        /// Driver error.
        source: rusqlite::Error,
    },

    /// A placeholder without a bound value, or a value without a placeholder.
    #[error("parameter error: {0}")]
    Parameter(String),
}

impl SqliteError {
    /// Create a parameter error.
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    /// Whether SQLite rejected the statement on a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }
}

impl From<SqliteError> for QueryError {
    fn from(err: SqliteError) -> Self {
        let message = err.to_string();
        match err {
            SqliteError::Open { .. } => QueryError::connection(message),
            SqliteError::Parameter(_) => QueryError::invalid_input("vars", message),
            ref e if e.is_unique_violation() => {
                QueryError::new(rowkeeper_query::ErrorCode::UniqueConstraint, message)
            }
            SqliteError::Sqlite(_) => QueryError::database(message),
        }
    }
}
