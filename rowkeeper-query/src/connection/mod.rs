//! Connections, their configuration and the manager that opens them.
//!
//! # Configuration
//!
//! ```rust
//! use rowkeeper_query::connection::{ConnectOptions, DatabaseConfig, Driver};
//!
//! let config = DatabaseConfig::new("pgsql")
//!     .with_host("localhost")
//!     .with_name("erp")
//!     .with_credentials("app", "secret");
//! let options = ConnectOptions::from_config(&config).unwrap();
//! assert_eq!(options.driver, Driver::Postgres);
//! assert!(options.dsn.starts_with("host=localhost"));
//! ```
//!
//! # Drivers
//!
//! ```rust
//! use rowkeeper_query::connection::Driver;
//!
//! assert_eq!(Driver::from_name("fbird").unwrap(), Driver::Firebird);
//! assert_eq!(Driver::Oracle.default_port(), Some(1521));
//! assert_eq!(Driver::Sqlite.dialect().name(), "sqlite");
//! ```

mod config;
mod driver;
mod env;
mod manager;
mod options;

pub use config::{CaseFolding, ConfigSource, DatabaseConfig, DirectoryConfigSource, MemoryConfigSource};
pub use driver::Driver;
pub use env::{EnvExpander, EnvSource, MapEnvSource, StdEnvSource};
pub use manager::ConnectionManager;
pub use options::ConnectOptions;

use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::QueryResult;
use crate::value::{PreparedVars, Row, Value};

/// A live database connection.
///
/// Statements arrive fully rendered; `vars` holds the values of any `:pN`
/// placeholders in them (empty when the statement was rendered with literals).
pub trait Connection: Send + Sync {
    /// Driver behind this connection.
    fn driver(&self) -> Driver;

    /// Dialect used to render statements for this connection.
    fn dialect(&self) -> &'static dyn Dialect {
        self.driver().dialect()
    }

    /// Quote a string literal the way the driver does.
    fn quote(&self, value: &str) -> String {
        self.dialect().quote_string(value)
    }

    /// Run a statement, returning the affected row count.
    fn execute(&self, sql: &str, vars: &PreparedVars) -> QueryResult<u64>;

    /// Run a query, returning every row.
    fn query(&self, sql: &str, vars: &PreparedVars) -> QueryResult<Vec<Row>>;

    /// Start a native transaction.
    fn begin(&self) -> QueryResult<()> {
        self.execute(self.dialect().begin_sql(), &PreparedVars::new())
            .map(|_| ())
    }

    /// Commit the native transaction.
    fn commit(&self) -> QueryResult<()> {
        self.execute(self.dialect().commit_sql(), &PreparedVars::new())
            .map(|_| ())
    }

    /// Roll back the native transaction.
    fn rollback(&self) -> QueryResult<()> {
        self.execute(self.dialect().rollback_sql(), &PreparedVars::new())
            .map(|_| ())
    }

    /// Key generated by the last INSERT into `table`.
    ///
    /// The default reads `max(pk)`, which is correct inside the inserting
    /// transaction for sequential keys.
    fn last_insert_id(&self, table: &str, primary_key: &str) -> QueryResult<Option<Value>> {
        let sql = format!("SELECT max({}) AS id FROM {}", primary_key, table);
        let rows = self.query(&sql, &PreparedVars::new())?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, v)| v))
            .filter(|v| !v.is_null()))
    }
}

/// Opens connections for one driver.
pub trait Connector: Send + Sync {
    /// Open a connection.
    fn connect(&self, options: &ConnectOptions) -> QueryResult<Arc<dyn Connection>>;
}

impl<F> Connector for F
where
    F: Fn(&ConnectOptions) -> QueryResult<Arc<dyn Connection>> + Send + Sync,
{
    fn connect(&self, options: &ConnectOptions) -> QueryResult<Arc<dyn Connection>> {
        self(options)
    }
}

/// Wraps a connection so fetched column names are case-folded.
pub struct CaseFoldingConnection {
    inner: Arc<dyn Connection>,
    case: CaseFolding,
}

impl CaseFoldingConnection {
    /// Fold the column names returned by `inner`.
    pub fn new(inner: Arc<dyn Connection>, case: CaseFolding) -> Self {
        Self { inner, case }
    }
}

impl Connection for CaseFoldingConnection {
    fn driver(&self) -> Driver {
        self.inner.driver()
    }

    fn dialect(&self) -> &'static dyn Dialect {
        self.inner.dialect()
    }

    fn quote(&self, value: &str) -> String {
        self.inner.quote(value)
    }

    fn execute(&self, sql: &str, vars: &PreparedVars) -> QueryResult<u64> {
        self.inner.execute(sql, vars)
    }

    fn query(&self, sql: &str, vars: &PreparedVars) -> QueryResult<Vec<Row>> {
        let rows = self.inner.query(sql, vars)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(name, value)| (self.case.apply(&name), value))
                    .collect()
            })
            .collect())
    }

    fn begin(&self) -> QueryResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> QueryResult<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> QueryResult<()> {
        self.inner.rollback()
    }

    fn last_insert_id(&self, table: &str, primary_key: &str) -> QueryResult<Option<Value>> {
        self.inner.last_insert_id(table, primary_key)
    }
}
