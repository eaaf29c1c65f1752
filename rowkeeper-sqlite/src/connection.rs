//! SQLite connection wrapper.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use rowkeeper_query::connection::{ConnectOptions, Connection, Connector, Driver};
use rowkeeper_query::{PreparedVars, QueryError, QueryResult, Row, Value};

use crate::error::{SqliteError, SqliteResult};
use crate::types::{from_sqlite, to_sqlite};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One SQLite database handle.
///
/// `rusqlite::Connection` is not `Sync`, so statements are serialized
/// through a mutex.
pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
    path: String,
}

impl SqliteConnection {
    /// Open the database file at `path`, or a private in-memory database for
    /// `:memory:`.
    pub fn open(path: &str) -> SqliteResult<Self> {
        let conn = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(|source| SqliteError::Open {
            path: path.to_string(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!(path = %path, "SQLite database opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        })
    }

    /// Path the database was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn run_execute(&self, sql: &str, vars: &PreparedVars) -> SqliteResult<u64> {
        let conn = self.conn.lock();
        let mut stmt = prepare(&conn, sql, vars)?;
        match stmt.raw_execute() {
            Ok(changed) => Ok(changed as u64),
            // PRAGMA and friends may answer with a row
            Err(rusqlite::Error::ExecuteReturnedResults) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn run_query(&self, sql: &str, vars: &PreparedVars) -> SqliteResult<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = prepare(&conn, sql, vars)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut result = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut record = Row::with_capacity(columns.len());
            for (index, name) in columns.iter().enumerate() {
                record.insert(name.clone(), from_sqlite(row.get_ref(index)?));
            }
            result.push(record);
        }
        Ok(result)
    }
}

/// Prepare `sql` and bind every `:pN` placeholder by name.
fn prepare<'c>(
    conn: &'c rusqlite::Connection,
    sql: &str,
    vars: &PreparedVars,
) -> SqliteResult<rusqlite::Statement<'c>> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.parameter_count() != vars.len() {
        return Err(SqliteError::parameter(format!(
            "statement has {} placeholders but {} values were bound",
            stmt.parameter_count(),
            vars.len()
        )));
    }
    for (name, value) in vars {
        let index = stmt
            .parameter_index(name)?
            .ok_or_else(|| SqliteError::parameter(format!("{} does not appear in the statement", name)))?;
        stmt.raw_bind_parameter(index, to_sqlite(value))?;
    }
    Ok(stmt)
}

impl Connection for SqliteConnection {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn execute(&self, sql: &str, vars: &PreparedVars) -> QueryResult<u64> {
        trace!(sql = %sql, vars = vars.len(), "SQLite execute");
        self.run_execute(sql, vars)
            .map_err(|e| QueryError::from(e).with_sql(sql))
    }

    fn query(&self, sql: &str, vars: &PreparedVars) -> QueryResult<Vec<Row>> {
        trace!(sql = %sql, vars = vars.len(), "SQLite query");
        self.run_query(sql, vars)
            .map_err(|e| QueryError::from(e).with_sql(sql))
    }

    fn last_insert_id(&self, _table: &str, _primary_key: &str) -> QueryResult<Option<Value>> {
        let id = self.conn.lock().last_insert_rowid();
        Ok((id != 0).then_some(Value::Int(id)))
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish()
    }
}

/// Opens [`SqliteConnection`]s for a
/// [`ConnectionManager`](rowkeeper_query::ConnectionManager).
///
/// The DSN is the database path; the manager runs the init statements
/// (`PRAGMA foreign_keys = ON`) after connecting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    fn connect(&self, options: &ConnectOptions) -> QueryResult<Arc<dyn Connection>> {
        Ok(Arc::new(SqliteConnection::open(&options.dsn)?))
    }
}
