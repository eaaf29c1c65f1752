//! Nested transactions over a stack of connection frames.
//!
//! Set `ROWKEEPER_DEBUG=true` to see frame transitions in the tracing output.
//!
//! A [`TransactionManager`] holds a LIFO stack of frames. Each frame binds a
//! logical database name to an open connection and, unless it is a *fake*
//! frame, a native transaction on it. Every operation runs against the top
//! frame, so code can open database B while A is still open and resume A once
//! B is closed:
//!
//! ```rust,ignore
//! let mut tx = TransactionManager::new(manager);
//! tx.open("erp")?;
//! tx.open("audit")?;          // top frame: audit
//! tx.execute_sql("INSERT INTO audit_log (msg) VALUES ('x')", &Default::default())?;
//! tx.close()?;                // commits audit, top frame: erp again
//! tx.close()?;                // commits erp, stack empty
//! ```
//!
//! The stack is owned by one execution context and is not shared between
//! threads. Callers pair every `open` with exactly one `close` or `rollback`.
//!
//! # Statement logging
//!
//! Each frame may carry a [`TransactionLogger`]. With the global log enabled
//! the manager also records a [`StatementLogEntry`] (timestamp, database,
//! statement, elapsed time, call site) for every statement it runs.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionManager, DatabaseConfig};
use crate::dialect::ROW_NUMBER_COLUMN;
use crate::error::{QueryError, QueryResult};
use crate::session::SessionSource;
use crate::statement::{Rendered, Statement};
use crate::value::{PreparedVars, Row};

/// Receives the statements run on a frame.
pub trait TransactionLogger: Send + Sync {
    /// Record one message.
    fn write(&self, message: &str);
}

/// Emits each message as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TransactionLogger for TracingLogger {
    fn write(&self, message: &str) {
        info!(target: "rowkeeper::sql", "{}", message);
    }
}

/// Collects messages in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl TransactionLogger for MemoryLogger {
    fn write(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

/// Appends timestamped lines to a text file.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogger {
    /// Open (or create) `path` for appending.
    pub fn new(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionLogger for FileLogger {
    fn write(&self, message: &str) {
        let line = format!("{} :: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        if let Err(e) = self.file.lock().write_all(line.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "Failed to write transaction log");
        }
    }
}

/// Forwards messages to a closure.
pub struct CallbackLogger<F>
where
    F: Fn(&str) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackLogger<F>
where
    F: Fn(&str) + Send + Sync,
{
    /// Wrap `callback`.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> TransactionLogger for CallbackLogger<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn write(&self, message: &str) {
        (self.callback)(message)
    }
}

/// One statement recorded by the global log.
#[derive(Debug, Clone)]
pub struct StatementLogEntry {
    /// When the statement finished.
    pub timestamp: DateTime<Local>,
    /// Logical database of the frame.
    pub database: String,
    /// SQL text.
    pub statement: String,
    /// Execution time.
    pub elapsed: Duration,
    /// Call site that issued the statement.
    pub location: String,
}

struct Frame {
    database: String,
    config: DatabaseConfig,
    connection: Arc<dyn Connection>,
    fake: bool,
    logger: Option<Arc<dyn TransactionLogger>>,
}

/// Entries kept by the global log unless another capacity is requested.
pub const DEFAULT_GLOBAL_LOG_CAPACITY: usize = 10_000;

struct GlobalLog {
    entries: VecDeque<StatementLogEntry>,
    capacity: usize,
}

impl GlobalLog {
    fn push(&mut self, entry: StatementLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Stack of open transaction frames.
pub struct TransactionManager {
    connections: Arc<ConnectionManager>,
    session: Option<Arc<dyn SessionSource>>,
    stack: Vec<Frame>,
    global_log: Option<Mutex<GlobalLog>>,
}

impl TransactionManager {
    /// Create an empty stack opening connections through `connections`.
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self {
            connections,
            session: None,
            stack: Vec::new(),
            global_log: None,
        }
    }

    /// Attach the session used for `{session.key}` tokens and audit columns.
    pub fn with_session(mut self, session: Arc<dyn SessionSource>) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the session.
    pub fn set_session(&mut self, session: Option<Arc<dyn SessionSource>>) {
        self.session = session;
    }

    /// The attached session.
    pub fn session(&self) -> Option<&dyn SessionSource> {
        self.session.as_deref()
    }

    /// Connection manager behind this stack.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    // ============== Frame stack ==============

    /// Open the logical database `database` and start a transaction on it.
    pub fn open(&mut self, database: &str) -> QueryResult<()> {
        let config = self.connections.config(database)?;
        self.push(database, config, false)
    }

    /// Open a frame with explicit parameters instead of the configured ones.
    pub fn open_with(&mut self, database: &str, config: DatabaseConfig) -> QueryResult<()> {
        self.push(database, config, false)
    }

    /// Open a frame that never begins, commits or rolls back.
    pub fn open_fake(&mut self, database: &str) -> QueryResult<()> {
        let config = self.connections.config(database)?;
        self.push(database, config, true)
    }

    fn push(&mut self, database: &str, config: DatabaseConfig, fake: bool) -> QueryResult<()> {
        let connection = self.connections.open_with(&config)?;
        if !fake {
            connection.begin().map_err(|e| {
                QueryError::transaction(format!("could not begin transaction on '{}'", database))
                    .with_source(e)
            })?;
        }

        // the logger of the enclosing frame carries over
        let logger = self.stack.last().and_then(|f| f.logger.clone());
        self.stack.push(Frame {
            database: database.to_string(),
            config,
            connection,
            fake,
            logger,
        });
        debug!(database = %database, fake, depth = self.stack.len(), "Transaction opened");
        Ok(())
    }

    /// Commit the top frame and pop it. No-op on an empty stack.
    pub fn close(&mut self) -> QueryResult<()> {
        let Some(frame) = self.stack.pop() else {
            debug!("close() called without an open transaction");
            return Ok(());
        };
        if !frame.fake {
            frame.connection.commit()?;
        }
        Self::frame_log(&frame, "COMMIT");
        debug!(database = %frame.database, depth = self.stack.len(), "Transaction closed");
        Ok(())
    }

    /// Roll back the top frame and pop it. No-op on an empty stack.
    pub fn rollback(&mut self) -> QueryResult<()> {
        let Some(frame) = self.stack.pop() else {
            debug!("rollback() called without an open transaction");
            return Ok(());
        };
        if !frame.fake {
            frame.connection.rollback()?;
        }
        Self::frame_log(&frame, "ROLLBACK");
        debug!(database = %frame.database, depth = self.stack.len(), "Transaction rolled back");
        Ok(())
    }

    /// Commit and pop every frame, top first. The first failure is returned
    /// after the whole stack is drained.
    pub fn close_all(&mut self) -> QueryResult<()> {
        let mut first_error = None;
        while !self.stack.is_empty() {
            if let Err(e) = self.close() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Roll back and pop every frame, top first.
    pub fn rollback_all(&mut self) -> QueryResult<()> {
        let mut first_error = None;
        while !self.stack.is_empty() {
            if let Err(e) = self.rollback() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Commit the work of the top frame and start a new transaction on it,
    /// keeping the frame open. No-op on a fake frame.
    pub fn commit_retaining(&self) -> QueryResult<()> {
        let frame = self.top()?;
        if frame.fake {
            return Ok(());
        }
        frame.connection.commit()?;
        Self::frame_log(frame, "COMMIT");
        frame.connection.begin()
    }

    /// Roll back the work of the top frame and start a new transaction on
    /// it, keeping the frame open. No-op on a fake frame.
    pub fn rollback_retaining(&self) -> QueryResult<()> {
        let frame = self.top()?;
        if frame.fake {
            return Ok(());
        }
        frame.connection.rollback()?;
        Self::frame_log(frame, "ROLLBACK");
        frame.connection.begin()
    }

    /// Set savepoint `name` in the top frame. No-op on a fake frame.
    #[track_caller]
    pub fn savepoint(&self, name: &str) -> QueryResult<()> {
        let frame = self.top()?;
        if frame.fake {
            return Ok(());
        }
        let sql = frame.connection.dialect().savepoint_sql(name);
        self.execute_sql(&sql, &PreparedVars::new()).map(|_| ())
    }

    /// Undo the top frame's work after savepoint `name`. No-op on a fake
    /// frame.
    #[track_caller]
    pub fn rollback_to_savepoint(&self, name: &str) -> QueryResult<()> {
        let frame = self.top()?;
        if frame.fake {
            return Ok(());
        }
        let sql = frame.connection.dialect().rollback_to_savepoint_sql(name);
        self.execute_sql(&sql, &PreparedVars::new()).map(|_| ())
    }

    /// Discard savepoint `name`, keeping its work. No-op on a fake frame and
    /// on engines without a release statement.
    #[track_caller]
    pub fn release_savepoint(&self, name: &str) -> QueryResult<()> {
        let frame = self.top()?;
        if frame.fake {
            return Ok(());
        }
        match frame.connection.dialect().release_savepoint_sql(name) {
            Some(sql) => self.execute_sql(&sql, &PreparedVars::new()).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Connection of the top frame.
    pub fn get(&self) -> Option<Arc<dyn Connection>> {
        self.stack.last().map(|f| Arc::clone(&f.connection))
    }

    /// Connection of the top frame, or a no-active-transaction error.
    pub fn connection(&self) -> QueryResult<Arc<dyn Connection>> {
        self.get().ok_or_else(QueryError::no_active_transaction)
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether the top frame is fake.
    pub fn is_fake(&self) -> bool {
        self.stack.last().is_some_and(|f| f.fake)
    }

    /// Logical database of the top frame.
    pub fn database_name(&self) -> Option<&str> {
        self.stack.last().map(|f| f.database.as_str())
    }

    /// Parameter summary of the top frame (no password).
    pub fn database_info(&self) -> Option<HashMap<String, String>> {
        self.stack.last().map(|f| f.config.info())
    }

    /// Alias of [`database_info`](Self::database_info).
    pub fn get_database_info(&self) -> Option<HashMap<String, String>> {
        self.database_info()
    }

    /// Whether the top frame uses the same parameters as `database`.
    pub fn is_open(&self, database: &str) -> bool {
        let Some(frame) = self.stack.last() else {
            return false;
        };
        self.connections
            .config(database)
            .is_ok_and(|c| c.serialized() == frame.config.serialized())
    }

    /// Whether any frame on the stack uses the same parameters as `database`.
    pub fn has_connection(&self, database: &str) -> bool {
        let Ok(candidate) = self.connections.config(database) else {
            return false;
        };
        let serialized = candidate.serialized();
        self.stack.iter().any(|f| f.config.serialized() == serialized)
    }

    /// Whether statements on the top frame are rendered with placeholders.
    pub fn prepared(&self) -> bool {
        self.stack.last().is_some_and(|f| f.config.prepared)
    }

    // ============== Logging ==============

    /// Set the logger of the top frame.
    pub fn set_logger(&mut self, logger: Arc<dyn TransactionLogger>) {
        if let Some(frame) = self.stack.last_mut() {
            frame.logger = Some(logger);
        }
    }

    /// Log the top frame's statements through `callback`.
    pub fn set_logger_function<F>(&mut self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.set_logger(Arc::new(CallbackLogger::new(callback)));
    }

    /// Remove the top frame's logger.
    pub fn clear_logger(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.logger = None;
        }
    }

    /// Write a message to the top frame's logger.
    pub fn log(&self, message: &str) {
        if let Some(frame) = self.stack.last() {
            Self::frame_log(frame, message);
        }
    }

    fn frame_log(frame: &Frame, message: &str) {
        if let Some(logger) = &frame.logger {
            logger.write(message);
        }
    }

    /// Start recording every statement with timing and call site, keeping
    /// the latest [`DEFAULT_GLOBAL_LOG_CAPACITY`] entries.
    pub fn enable_global_log(&mut self) {
        self.enable_global_log_with_capacity(DEFAULT_GLOBAL_LOG_CAPACITY);
    }

    /// Start recording, keeping at most `capacity` entries. Older entries are
    /// dropped first. Re-enabling keeps what was recorded and applies the new
    /// capacity.
    pub fn enable_global_log_with_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        match &self.global_log {
            Some(log) => {
                let mut log = log.lock();
                log.capacity = capacity;
                while log.entries.len() > capacity {
                    log.entries.pop_front();
                }
            }
            None => {
                self.global_log = Some(Mutex::new(GlobalLog {
                    entries: VecDeque::new(),
                    capacity,
                }));
            }
        }
    }

    /// Stop recording and discard the recorded statements.
    pub fn disable_global_log(&mut self) {
        self.global_log = None;
    }

    /// Statements recorded by the global log.
    pub fn statement_log(&self) -> Vec<StatementLogEntry> {
        self.global_log
            .as_ref()
            .map(|log| log.lock().entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return the recorded statements; recording continues.
    pub fn take_statement_log(&self) -> Vec<StatementLogEntry> {
        self.global_log
            .as_ref()
            .map(|log| log.lock().entries.drain(..).collect())
            .unwrap_or_default()
    }

    // ============== Execution ==============

    /// Render a statement for the top frame.
    pub fn render(&self, statement: &dyn Statement) -> QueryResult<Rendered> {
        let frame = self.top()?;
        statement.get_instruction(&*frame.connection, frame.config.prepared, self.session())
    }

    /// Run a statement on the top frame, returning the affected row count.
    #[track_caller]
    pub fn execute(&self, statement: &dyn Statement) -> QueryResult<u64> {
        let location = Location::caller();
        let rendered = self.render(statement)?;
        self.run(&rendered, location, |conn, r| conn.execute(&r.sql, &r.vars))
    }

    /// Run a query on the top frame, returning its rows.
    #[track_caller]
    pub fn query(&self, statement: &dyn Statement) -> QueryResult<Vec<Row>> {
        let location = Location::caller();
        let rendered = self.render(statement)?;
        self.run(&rendered, location, |conn, r| conn.query(&r.sql, &r.vars))
            .map(strip_helper_columns)
    }

    /// Run raw SQL on the top frame.
    #[track_caller]
    pub fn execute_sql(&self, sql: &str, vars: &PreparedVars) -> QueryResult<u64> {
        let location = Location::caller();
        let rendered = Rendered {
            sql: sql.to_string(),
            vars: vars.clone(),
        };
        self.run(&rendered, location, |conn, r| conn.execute(&r.sql, &r.vars))
    }

    /// Run a raw query on the top frame.
    #[track_caller]
    pub fn query_sql(&self, sql: &str, vars: &PreparedVars) -> QueryResult<Vec<Row>> {
        let location = Location::caller();
        let rendered = Rendered {
            sql: sql.to_string(),
            vars: vars.clone(),
        };
        self.run(&rendered, location, |conn, r| conn.query(&r.sql, &r.vars))
            .map(strip_helper_columns)
    }

    fn top(&self) -> QueryResult<&Frame> {
        self.stack.last().ok_or_else(QueryError::no_active_transaction)
    }

    fn run<T>(
        &self,
        rendered: &Rendered,
        location: &Location<'_>,
        op: impl FnOnce(&dyn Connection, &Rendered) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let frame = self.top()?;
        Self::frame_log(frame, &rendered.sql);

        let started = Instant::now();
        let result = op(&*frame.connection, rendered);
        let elapsed = started.elapsed();

        debug!(
            database = %frame.database,
            sql = %rendered.sql,
            params = rendered.vars.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Statement executed"
        );

        if let Some(log) = &self.global_log {
            log.lock().push(StatementLogEntry {
                timestamp: Local::now(),
                database: frame.database.clone(),
                statement: rendered.sql.clone(),
                elapsed,
                location: format!("{}:{}", location.file(), location.line()),
            });
        }

        result.map_err(|e| {
            if frame.logger.is_some() && e.context.sql.is_none() {
                e.with_sql(rendered.sql.clone())
            } else {
                e
            }
        })
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("depth", &self.stack.len())
            .field("database", &self.database_name())
            .finish()
    }
}

fn strip_helper_columns(mut rows: Vec<Row>) -> Vec<Row> {
    for row in &mut rows {
        row.shift_remove(ROW_NUMBER_COLUMN);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectOptions, Driver, MemoryConfigSource};
    use crate::error::ErrorCode;
    use crate::mock::{MockConnection, row};
    use crate::statement::SelectStatement;
    use crate::value::Value;

    fn manager() -> (TransactionManager, Arc<MockConnection>) {
        let shared = Arc::new(MockConnection::new(Driver::Sqlite));
        let conn = Arc::clone(&shared);
        let source = MemoryConfigSource::new()
            .with("a", DatabaseConfig::sqlite("a.db"))
            .with("b", DatabaseConfig::sqlite("b.db").prepared(true))
            .with("a2", DatabaseConfig::sqlite("a.db"));
        let connections = ConnectionManager::new(source).with_connector(
            Driver::Sqlite,
            move |_: &ConnectOptions| -> QueryResult<Arc<dyn Connection>> {
                Ok(Arc::clone(&conn) as Arc<dyn Connection>)
            },
        );
        (TransactionManager::new(Arc::new(connections)), shared)
    }

    #[test]
    fn test_stack_balance() {
        let (mut tx, conn) = manager();
        assert!(tx.get().is_none());

        tx.open("a").unwrap();
        tx.open("b").unwrap();
        assert_eq!(tx.depth(), 2);
        assert_eq!(tx.database_name(), Some("b"));

        tx.close().unwrap();
        assert_eq!(tx.database_name(), Some("a"));
        tx.close().unwrap();

        assert!(tx.get().is_none());
        assert_eq!(tx.depth(), 0);

        let statements = conn.statements();
        let begins = statements.iter().filter(|s| *s == "BEGIN").count();
        let commits = statements.iter().filter(|s| *s == "COMMIT").count();
        assert_eq!(begins, 2);
        assert_eq!(commits, 2);
    }

    #[test]
    fn test_fake_frame_skips_native_transaction() {
        let (mut tx, conn) = manager();
        tx.open_fake("a").unwrap();
        assert!(tx.is_fake());
        tx.rollback().unwrap();
        assert!(!conn.statements().iter().any(|s| s == "BEGIN" || s == "ROLLBACK"));
    }

    #[test]
    fn test_no_active_transaction() {
        let (tx, _) = manager();
        let err = tx.execute_sql("SELECT 1", &PreparedVars::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoActiveTransaction);
        assert_eq!(tx.connection().err().unwrap().code, ErrorCode::NoActiveTransaction);
    }

    #[test]
    fn test_is_open_compares_parameters() {
        let (mut tx, _) = manager();
        assert!(!tx.is_open("a"));
        tx.open("a").unwrap();
        assert!(tx.is_open("a"));
        assert!(tx.is_open("a2"));
        assert!(!tx.is_open("b"));

        tx.open("b").unwrap();
        assert!(!tx.is_open("a"));
        assert!(tx.has_connection("a"));
        assert!(!tx.has_connection("missing"));
        tx.rollback_all().unwrap();
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn test_prepared_flag_per_frame() {
        let (mut tx, conn) = manager();
        let mut select = SelectStatement::new("t");
        let mut criteria = crate::criteria::Criteria::new();
        criteria.where_("id", "=", 1);
        select.set_criteria(criteria);

        tx.open("a").unwrap();
        tx.query(&select).unwrap();
        tx.open("b").unwrap();
        tx.query(&select).unwrap();
        tx.close_all().unwrap();

        let entries = conn.entries();
        let selects: Vec<_> = entries.iter().filter(|(s, _)| s.starts_with("SELECT")).collect();
        assert_eq!(selects[0].0, "SELECT * FROM t WHERE (id = 1)");
        assert_eq!(selects[1].0, "SELECT * FROM t WHERE (id = :p1)");
        assert_eq!(selects[1].1[":p1"], Value::Int(1));
    }

    #[test]
    fn test_loggers_and_global_log() {
        let (mut tx, conn) = manager();
        let memory = Arc::new(MemoryLogger::new());
        tx.open("a").unwrap();
        tx.set_logger(memory.clone());
        tx.enable_global_log();

        tx.execute_sql("DELETE FROM t", &PreparedVars::new()).unwrap();
        tx.log("custom note");
        tx.close().unwrap();

        assert_eq!(memory.lines(), vec!["DELETE FROM t", "custom note", "COMMIT"]);
        let log = tx.statement_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].database, "a");
        assert!(log[0].location.contains("transaction.rs"));
        assert!(conn.statements().contains(&"DELETE FROM t".to_string()));
    }

    #[test]
    fn test_global_log_capacity_and_drain() {
        let (mut tx, _) = manager();
        tx.open_fake("a").unwrap();
        tx.enable_global_log_with_capacity(2);
        for table in ["t1", "t2", "t3"] {
            tx.execute_sql(&format!("DELETE FROM {}", table), &PreparedVars::new())
                .unwrap();
        }

        let kept: Vec<_> = tx.statement_log().into_iter().map(|e| e.statement).collect();
        assert_eq!(kept, vec!["DELETE FROM t2", "DELETE FROM t3"]);
        assert_eq!(tx.take_statement_log().len(), 2);
        assert!(tx.statement_log().is_empty());

        tx.execute_sql("DELETE FROM t4", &PreparedVars::new()).unwrap();
        assert_eq!(tx.statement_log().len(), 1);
        tx.close().unwrap();
    }

    #[test]
    fn test_retaining_commit_keeps_the_frame() {
        let (mut tx, conn) = manager();
        tx.open("a").unwrap();
        conn.take_statements();
        tx.commit_retaining().unwrap();
        tx.rollback_retaining().unwrap();
        assert_eq!(tx.depth(), 1);
        tx.close().unwrap();
        assert_eq!(
            conn.take_statements(),
            vec!["COMMIT", "BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]
        );

        tx.open_fake("a").unwrap();
        conn.take_statements();
        tx.commit_retaining().unwrap();
        tx.savepoint("row_1").unwrap();
        assert!(conn.statements().is_empty());
        tx.close().unwrap();
    }

    #[test]
    fn test_savepoint_statements() {
        let (mut tx, conn) = manager();
        tx.open("a").unwrap();
        conn.take_statements();
        tx.savepoint("row_1").unwrap();
        tx.rollback_to_savepoint("row_1").unwrap();
        tx.release_savepoint("row_1").unwrap();
        assert_eq!(
            conn.take_statements(),
            vec!["SAVEPOINT row_1", "ROLLBACK TO SAVEPOINT row_1", "RELEASE SAVEPOINT row_1"]
        );
        tx.close().unwrap();
    }

    #[test]
    fn test_row_number_column_is_stripped() {
        let (mut tx, conn) = manager();
        conn.push_rows(vec![row([
            ("__ROWNUMBER__", Value::from(1)),
            ("id", Value::from(7)),
        ])]);
        tx.open("a").unwrap();
        let rows = tx.query_sql("SELECT ...", &PreparedVars::new()).unwrap();
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0]["id"], Value::Int(7));
        tx.close().unwrap();
    }

    #[test]
    fn test_callback_logger() {
        let (mut tx, _) = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tx.open_fake("a").unwrap();
        tx.set_logger_function(move |m| sink.lock().push(m.to_string()));
        tx.execute_sql("UPDATE t SET a = 1", &PreparedVars::new()).unwrap();
        tx.close().unwrap();
        assert_eq!(seen.lock().first().map(String::as_str), Some("UPDATE t SET a = 1"));
    }

    #[test]
    fn test_file_logger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sql.log");
        let logger = FileLogger::new(&path).unwrap();
        logger.write("SELECT 1");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_end().ends_with(":: SELECT 1"));
    }
}
