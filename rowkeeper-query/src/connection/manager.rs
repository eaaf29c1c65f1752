//! Resolves logical database names to open connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::config::{CaseFolding, ConfigSource, DatabaseConfig};
use super::driver::Driver;
use super::options::ConnectOptions;
use super::{CaseFoldingConnection, Connection, Connector};
use crate::error::{QueryError, QueryResult};
use crate::value::PreparedVars;

/// Opens connections by logical database name.
///
/// Configurations are read once per name and cached. Connectors are
/// registered per driver. Connections opened from a configuration with
/// `keep = true` are cached by the fingerprint of the full parameter set and
/// handed out again on later opens, so every holder shares one physical
/// connection and its transaction state.
pub struct ConnectionManager {
    source: Box<dyn ConfigSource>,
    configs: RwLock<HashMap<String, DatabaseConfig>>,
    connectors: RwLock<HashMap<Driver, Arc<dyn Connector>>>,
    kept: Mutex<HashMap<u64, Arc<dyn Connection>>>,
}

impl ConnectionManager {
    /// Create a manager reading configurations from `source`.
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            configs: RwLock::new(HashMap::new()),
            connectors: RwLock::new(HashMap::new()),
            kept: Mutex::new(HashMap::new()),
        }
    }

    /// Register the connector used for `driver`.
    ///
    /// Registering for [`Driver::Mssql`] registers the platform's concrete
    /// SQL Server driver.
    pub fn register(&self, driver: Driver, connector: impl Connector + 'static) {
        self.connectors
            .write()
            .insert(driver.resolve(), Arc::new(connector));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_connector(self, driver: Driver, connector: impl Connector + 'static) -> Self {
        self.register(driver, connector);
        self
    }

    /// Whether a connector is registered for `driver`.
    pub fn supports(&self, driver: Driver) -> bool {
        self.connectors.read().contains_key(&driver.resolve())
    }

    /// Configuration of the logical database `name`.
    pub fn config(&self, name: &str) -> QueryResult<DatabaseConfig> {
        if let Some(config) = self.configs.read().get(name) {
            return Ok(config.clone());
        }

        let config = self
            .source
            .load(name)?
            .ok_or_else(|| QueryError::configuration_not_found(name))?;
        self.configs
            .write()
            .insert(name.to_string(), config.clone());
        Ok(config)
    }

    /// Open the logical database `name`.
    pub fn open(&self, name: &str) -> QueryResult<Arc<dyn Connection>> {
        let config = self.config(name)?;
        self.open_with(&config)
    }

    /// Open a connection for explicit parameters.
    pub fn open_with(&self, config: &DatabaseConfig) -> QueryResult<Arc<dyn Connection>> {
        let fingerprint = config.keep.then(|| config.fingerprint());
        if let Some(key) = fingerprint {
            if let Some(conn) = self.kept.lock().get(&key) {
                debug!(driver = %config.driver, "Reusing kept connection");
                return Ok(Arc::clone(conn));
            }
        }

        let options = ConnectOptions::from_config(config)?;
        let connector = self
            .connectors
            .read()
            .get(&options.driver)
            .cloned()
            .ok_or_else(|| {
                QueryError::unsupported_driver(options.driver.name())
                    .with_help("register a connector for this driver on the ConnectionManager")
            })?;

        let conn = connector.connect(&options)?;
        for statement in &options.init_statements {
            conn.execute(statement, &PreparedVars::new())?;
        }

        let conn: Arc<dyn Connection> = match options.case {
            CaseFolding::Natural => conn,
            case => Arc::new(CaseFoldingConnection::new(conn, case)),
        };

        info!(driver = %options.driver, keep = config.keep, "Connection opened");

        if let Some(key) = fingerprint {
            self.kept.lock().insert(key, Arc::clone(&conn));
        }
        Ok(conn)
    }

    /// Number of cached kept connections.
    pub fn kept_count(&self) -> usize {
        self.kept.lock().len()
    }

    /// Drop every cached kept connection.
    pub fn close_kept(&self) {
        let dropped = {
            let mut kept = self.kept.lock();
            let count = kept.len();
            kept.clear();
            count
        };
        debug!(count = dropped, "Kept connections closed");
    }

    /// Forget cached configurations so the next open re-reads them.
    pub fn clear_config_cache(&self) {
        self.configs.write().clear();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("configs", &self.configs.read().len())
            .field("connectors", &self.connectors.read().len())
            .field("kept", &self.kept.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConfigSource;
    use crate::error::ErrorCode;
    use crate::mock::MockConnection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager(opened: Arc<AtomicUsize>) -> ConnectionManager {
        let source = MemoryConfigSource::new()
            .with("main", DatabaseConfig::sqlite(":memory:"))
            .with("kept", DatabaseConfig::sqlite("kept.db").keep(true))
            .with(
                "upper",
                DatabaseConfig::sqlite("up.db").with_case(CaseFolding::Upper),
            )
            .with("oracle", DatabaseConfig::new("oracle").with_name("XE"));

        ConnectionManager::new(source).with_connector(
            Driver::Sqlite,
            move |_: &ConnectOptions| -> QueryResult<Arc<dyn Connection>> {
                opened.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MockConnection::new(Driver::Sqlite)))
            },
        )
    }

    #[test]
    fn test_missing_configuration() {
        let m = manager(Arc::default());
        let err = m.open("nope").err().unwrap();
        assert_eq!(err.code, ErrorCode::ConfigurationNotFound);
    }

    #[test]
    fn test_unregistered_driver() {
        let m = manager(Arc::default());
        let err = m.open("oracle").err().unwrap();
        assert_eq!(err.code, ErrorCode::UnsupportedDriver);
    }

    #[test]
    fn test_kept_connections_are_reused() {
        let opened = Arc::new(AtomicUsize::new(0));
        let m = manager(Arc::clone(&opened));

        let a = m.open("kept").unwrap();
        let b = m.open("kept").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(m.kept_count(), 1);

        m.open("main").unwrap();
        m.open("main").unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 3);

        m.close_kept();
        assert_eq!(m.kept_count(), 0);
        m.open("kept").unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_case_folding_wrapper() {
        let m = manager(Arc::default());
        let conn = m.open("upper").unwrap();
        assert_eq!(conn.driver(), Driver::Sqlite);
    }
}
