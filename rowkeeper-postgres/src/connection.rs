//! PostgreSQL connection over a private runtime.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, trace, warn};

use rowkeeper_query::connection::{ConnectOptions, Connection, Connector, Driver};
use rowkeeper_query::{PreparedVars, QueryError, QueryResult, Row, Value};

use crate::error::{PgError, PgResult};
use crate::inline::inline_vars;

/// A PostgreSQL client driven synchronously.
///
/// Each connection owns a current-thread Tokio runtime that runs the
/// protocol task while a statement is in flight. Calling it from inside
/// another Tokio runtime panics; use `spawn_blocking` there.
pub struct PgConnection {
    client: Client,
    runtime: Runtime,
}

impl PgConnection {
    /// Connect with a libpq keyword/value DSN (`host=.. dbname=..`).
    pub fn connect(dsn: &str, user: Option<&str>, password: Option<&str>) -> PgResult<Self> {
        let mut config: tokio_postgres::Config = dsn.parse()?;
        if let Some(user) = user.filter(|_| config.get_user().is_none()) {
            config.user(user);
        }
        if let Some(password) = password.filter(|_| config.get_password().is_none()) {
            config.password(password);
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (client, connection) = runtime.block_on(config.connect(NoTls))?;
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "PostgreSQL connection closed with an error");
            }
        });
        debug!(dbname = ?config.get_dbname(), "PostgreSQL connection established");

        Ok(Self { client, runtime })
    }

    fn simple_query(&self, sql: &str) -> PgResult<Vec<SimpleQueryMessage>> {
        if self.client.is_closed() {
            return Err(PgError::connection("connection already closed"));
        }
        Ok(self.runtime.block_on(self.client.simple_query(sql))?)
    }
}

impl Connection for PgConnection {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn execute(&self, sql: &str, vars: &PreparedVars) -> QueryResult<u64> {
        let sql = inline_vars(sql, vars);
        trace!(sql = %sql, "PostgreSQL execute");
        let messages = self
            .simple_query(&sql)
            .map_err(|e| QueryError::from(e).with_sql(sql.as_str()))?;
        Ok(messages
            .iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => Some(*n),
                _ => None,
            })
            .last()
            .unwrap_or(0))
    }

    fn query(&self, sql: &str, vars: &PreparedVars) -> QueryResult<Vec<Row>> {
        let sql = inline_vars(sql, vars);
        trace!(sql = %sql, "PostgreSQL query");
        let messages = self
            .simple_query(&sql)
            .map_err(|e| QueryError::from(e).with_sql(sql.as_str()))?;

        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let mut record = Row::with_capacity(row.len());
                for (index, column) in row.columns().iter().enumerate() {
                    let value = row
                        .get(index)
                        .map_or(Value::Null, |text| Value::Text(text.to_string()));
                    record.insert(column.name().to_string(), value);
                }
                rows.push(record);
            }
        }
        Ok(rows)
    }

    fn last_insert_id(&self, table: &str, primary_key: &str) -> QueryResult<Option<Value>> {
        let sql = format!(
            "SELECT currval(pg_get_serial_sequence({}, {})) AS id",
            self.quote(table),
            self.quote(primary_key)
        );
        Ok(self
            .query(&sql, &PreparedVars::new())?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, v)| v))
            .filter(|v| !v.is_null()))
    }
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

/// Opens [`PgConnection`]s for a
/// [`ConnectionManager`](rowkeeper_query::ConnectionManager).
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl Connector for PgConnector {
    fn connect(&self, options: &ConnectOptions) -> QueryResult<Arc<dyn Connection>> {
        let conn = PgConnection::connect(
            &options.dsn,
            options.user.as_deref(),
            options.password.as_deref(),
        )?;
        Ok(Arc::new(conn))
    }
}
