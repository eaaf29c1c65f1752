//! Error types for PostgreSQL operations.

use rowkeeper_query::{ErrorCode, QueryError};
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// The private runtime could not be started.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl PgError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Runtime(_) => true,
            Self::Postgres(e) => e.is_closed(),
        }
    }
}

impl From<PgError> for QueryError {
    fn from(err: PgError) -> Self {
        if err.is_connection_error() {
            return QueryError::connection(err.to_string());
        }
        match &err {
            PgError::Postgres(e) => match e.code().map(|c| c.code()) {
                // unique_violation
                Some("23505") => QueryError::new(ErrorCode::UniqueConstraint, e.to_string()),
                // not_null_violation
                Some("23502") => QueryError::invalid_input("", e.to_string()),
                _ => QueryError::database(e.to_string()),
            },
            _ => QueryError::database(err.to_string()),
        }
    }
}
