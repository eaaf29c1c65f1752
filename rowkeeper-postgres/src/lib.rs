//! # rowkeeper-postgres
//!
//! PostgreSQL driver for rowkeeper.
//!
//! Statements are sent over the simple query protocol with their `:pN`
//! placeholders inlined as literals, so the server infers every value's
//! type from context exactly as it does for literal rendering. Values come
//! back as text and convert through [`Value`](rowkeeper_query::Value)'s
//! accessors.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowkeeper_query::{ConnectionManager, Driver};
//! use rowkeeper_query::connection::DirectoryConfigSource;
//! use rowkeeper_postgres::PgConnector;
//!
//! let manager = ConnectionManager::new(DirectoryConfigSource::new("config"))
//!     .with_connector(Driver::Postgres, PgConnector);
//! let conn = manager.open("erp")?;
//! ```

pub mod connection;
pub mod error;
pub mod inline;

pub use connection::{PgConnection, PgConnector};
pub use error::{PgError, PgResult};

/// Register the PostgreSQL connector on `manager`.
pub fn register(manager: &rowkeeper_query::ConnectionManager) {
    manager.register(rowkeeper_query::Driver::Postgres, PgConnector);
}
