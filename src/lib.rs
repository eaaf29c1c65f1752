//! # rowkeeper
//!
//! Active Record persistence with composable criteria, nested transactions
//! and per-dialect SQL.
//!
//! rowkeeper provides:
//! - Entities backed by a column/value record with soft deletes, global
//!   scopes, audit stamps, column whitelists, object caching and relations
//! - Repositories with fluent filtering, pagination and aggregates
//! - A LIFO stack of database frames, each with its own transaction
//! - Named database configurations read from TOML files
//! - SQLite and PostgreSQL drivers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rowkeeper::prelude::*;
//! use rowkeeper::connection::MemoryConfigSource;
//!
//! struct City(Record);
//!
//! impl ActiveRecord for City {
//!     const SCHEMA: EntitySchema = EntitySchema::new("City", "city", "id");
//!
//!     fn from_record(record: Record) -> Self { Self(record) }
//!     fn record(&self) -> &Record { &self.0 }
//!     fn record_mut(&mut self) -> &mut Record { &mut self.0 }
//! }
//!
//! let configs = MemoryConfigSource::new().with("app", DatabaseConfig::sqlite(":memory:"));
//! let mut tx = TransactionManager::new(Arc::new(rowkeeper::connection_manager(configs)));
//! tx.open("app").unwrap();
//! rowkeeper::tasks::create_table(&tx, "city", &[("id", "INTEGER PRIMARY KEY"), ("name", "TEXT")]).unwrap();
//!
//! let mut city = City::new();
//! city.set("name", "Lajeado");
//! city.store(&tx).unwrap();
//!
//! let found = Repository::<City>::new().where_("name", "=", "Lajeado").first(&tx).unwrap();
//! assert!(found.is_some());
//! tx.close().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::PathBuf;

pub use rowkeeper_query::{
    cache, connection, criteria, dialect, error, filter, logging, record, repository, session,
    sql, statement, tasks, transaction, types, value,
};

use rowkeeper_query::connection::{ConfigSource, DirectoryConfigSource};
use rowkeeper_query::ConnectionManager;

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use rowkeeper_sqlite::*;
}

/// PostgreSQL driver.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use rowkeeper_postgres::*;
}

/// Connection manager over `source` with every compiled-in driver registered.
pub fn connection_manager(source: impl ConfigSource + 'static) -> ConnectionManager {
    let manager = ConnectionManager::new(source);
    #[cfg(feature = "sqlite")]
    rowkeeper_sqlite::register(&manager);
    #[cfg(feature = "postgres")]
    rowkeeper_postgres::register(&manager);
    manager
}

/// Connection manager reading `<name>.toml` files from `dir`.
pub fn from_directory(dir: impl Into<PathBuf>) -> ConnectionManager {
    connection_manager(DirectoryConfigSource::new(dir))
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use rowkeeper_query::prelude::*;
}

// Re-export key types at the crate root
pub use rowkeeper_query::{
    ActiveRecord, Criteria, DatabaseConfig, Driver, EntitySchema, Filter, QueryError,
    QueryResult, Record, Repository, TransactionManager, Value,
};
