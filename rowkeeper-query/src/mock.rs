//! Recording connection used by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::{
    ConnectOptions, Connection, ConnectionManager, DatabaseConfig, Driver, MemoryConfigSource,
};
use crate::error::{QueryError, QueryResult};
use crate::transaction::TransactionManager;
use crate::value::{PreparedVars, Row, Value};

/// Records every statement and answers queries from a queue of canned results.
pub struct MockConnection {
    driver: Driver,
    log: Mutex<Vec<(String, PreparedVars)>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    queries: Mutex<usize>,
    fail_on: Mutex<Option<String>>,
}

impl MockConnection {
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            log: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            queries: Mutex::new(0),
            fail_on: Mutex::new(None),
        }
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.results.lock().push_back(rows);
    }

    /// Every statement seen so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.log.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    /// Every statement with its bound values.
    pub fn entries(&self) -> Vec<(String, PreparedVars)> {
        self.log.lock().clone()
    }

    /// Fail every statement containing `pattern` with `message`.
    pub fn fail_on(&self, pattern: &str) {
        *self.fail_on.lock() = Some(pattern.to_string());
    }

    fn check(&self, sql: &str) -> QueryResult<()> {
        match &*self.fail_on.lock() {
            Some(pattern) if sql.contains(pattern.as_str()) => Err(QueryError::database(format!(
                "UNIQUE constraint failed: duplicate value in {}",
                pattern
            ))),
            _ => Ok(()),
        }
    }

    /// Drain the statement log.
    pub fn take_statements(&self) -> Vec<String> {
        self.log.lock().drain(..).map(|(sql, _)| sql).collect()
    }

    /// Number of queries answered.
    pub fn query_count(&self) -> usize {
        *self.queries.lock()
    }
}

/// Transaction stack with one open frame named `test` on a fresh mock.
///
/// The BEGIN issued by the frame is drained from the log.
pub fn transaction(config: DatabaseConfig) -> (TransactionManager, Arc<MockConnection>) {
    let driver = config.driver().unwrap_or(Driver::Sqlite);
    let shared = Arc::new(MockConnection::new(driver));
    let conn = Arc::clone(&shared);
    let connections = ConnectionManager::new(MemoryConfigSource::new().with("test", config))
        .with_connector(
            driver,
            move |_: &ConnectOptions| -> QueryResult<Arc<dyn Connection>> {
                Ok(Arc::clone(&conn) as Arc<dyn Connection>)
            },
        );
    let mut tx = TransactionManager::new(Arc::new(connections));
    tx.open("test").unwrap();
    shared.take_statements();
    (tx, shared)
}

/// Build a row from `(column, value)` pairs.
pub fn row<V: Into<Value>>(pairs: impl IntoIterator<Item = (&'static str, V)>) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into()))
        .collect()
}

impl Connection for MockConnection {
    fn driver(&self) -> Driver {
        self.driver
    }

    fn execute(&self, sql: &str, vars: &PreparedVars) -> QueryResult<u64> {
        self.log.lock().push((sql.to_string(), vars.clone()));
        self.check(sql)?;
        Ok(1)
    }

    fn query(&self, sql: &str, vars: &PreparedVars) -> QueryResult<Vec<Row>> {
        self.log.lock().push((sql.to_string(), vars.clone()));
        *self.queries.lock() += 1;
        self.check(sql)?;
        Ok(self.results.lock().pop_front().unwrap_or_default())
    }
}
