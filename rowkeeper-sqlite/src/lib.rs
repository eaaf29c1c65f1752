//! SQLite driver for rowkeeper.
//!
//! Statements arrive from `rowkeeper-query` fully rendered; placeholders keep
//! their `:pN` names and are bound by name through `rusqlite`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rowkeeper_query::connection::{DatabaseConfig, Driver, MemoryConfigSource};
//! use rowkeeper_query::{ConnectionManager, PreparedVars, TransactionManager};
//! use rowkeeper_sqlite::SqliteConnector;
//!
//! let configs = MemoryConfigSource::new().with("app", DatabaseConfig::sqlite(":memory:"));
//! let manager = ConnectionManager::new(configs).with_connector(Driver::Sqlite, SqliteConnector);
//!
//! let mut tx = TransactionManager::new(Arc::new(manager));
//! tx.open("app").unwrap();
//! tx.execute_sql("CREATE TABLE t (id INTEGER)", &PreparedVars::new()).unwrap();
//! tx.close().unwrap();
//! ```

pub mod connection;
pub mod error;
pub mod types;

pub use connection::{SqliteConnection, SqliteConnector};
pub use error::{SqliteError, SqliteResult};

/// Register the SQLite connector on `manager`.
pub fn register(manager: &rowkeeper_query::ConnectionManager) {
    manager.register(rowkeeper_query::Driver::Sqlite, SqliteConnector);
}
