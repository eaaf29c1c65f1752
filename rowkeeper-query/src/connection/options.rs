//! Driver-specific connection parameters.
//!
//! [`ConnectOptions::from_config`] turns a [`DatabaseConfig`] into the DSN a
//! driver understands plus the session statements that must run right after
//! connecting.

use super::config::{CaseFolding, DatabaseConfig};
use super::driver::Driver;
use crate::error::{QueryError, QueryResult};

/// Everything a [`Connector`](super::Connector) needs to open a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    /// Concrete driver (`mssql` already resolved).
    pub driver: Driver,
    /// DSN in the driver's native format.
    pub dsn: String,
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Statements executed once after connecting.
    pub init_statements: Vec<String>,
    /// Column-name case folding.
    pub case: CaseFolding,
}

impl ConnectOptions {
    /// Build the options for `config`.
    pub fn from_config(config: &DatabaseConfig) -> QueryResult<Self> {
        let mut config = config.clone();
        config.apply_url()?;
        let driver = config.driver()?.resolve();

        let (dsn, init_statements) = match driver {
            Driver::Postgres => postgres(&config),
            Driver::MySql => mysql(&config),
            Driver::Sqlite => sqlite(&config)?,
            Driver::Ibase | Driver::Firebird => firebird(&config),
            Driver::Oracle => oracle(&config),
            Driver::Sqlsrv => sqlsrv(&config),
            Driver::Dblib | Driver::Mssql => dblib(&config),
            Driver::Odbc => odbc(&config)?,
        };

        Ok(Self {
            driver,
            dsn,
            user: config.user.clone(),
            password: config.password.clone(),
            init_statements,
            case: config.case,
        })
    }
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// libpq keyword/value quoting: `\` and `'` are backslash-escaped inside
/// single quotes. SQL-style `''` doubling is not understood there.
fn libpq_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn libpq_value(value: &str) -> String {
    let plain = !value.is_empty()
        && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\');
    if plain {
        value.to_string()
    } else {
        libpq_quoted(value)
    }
}

fn host(config: &DatabaseConfig) -> &str {
    config.host.as_deref().unwrap_or("localhost")
}

fn name(config: &DatabaseConfig) -> &str {
    config.name.as_deref().unwrap_or_default()
}

fn append_options(dsn: &mut String, options: Option<&str>, separator: char) {
    if let Some(options) = options.filter(|o| !o.trim().is_empty()) {
        dsn.push(separator);
        dsn.push_str(options.trim());
    }
}

/// libpq keyword/value DSN.
fn postgres(config: &DatabaseConfig) -> (String, Vec<String>) {
    let mut parts = vec![format!("host={}", libpq_value(host(config)))];
    if let Some(port) = config.port {
        parts.push(format!("port={}", port));
    }
    parts.push(format!("dbname={}", libpq_value(name(config))));
    if let Some(user) = &config.user {
        parts.push(format!("user={}", libpq_value(user)));
    }
    if let Some(password) = &config.password {
        parts.push(format!("password={}", libpq_quoted(password)));
    }
    let mut dsn = parts.join(" ");
    append_options(&mut dsn, config.options.as_deref(), ' ');

    let mut init = Vec::new();
    if let Some(charset) = &config.charset {
        init.push(format!("SET client_encoding TO {}", quoted(charset)));
    }
    if let Some(zone) = &config.timezone {
        init.push(format!("SET TIME ZONE {}", quoted(zone)));
    }
    (dsn, init)
}

/// `mysql://host:port/name` URL; the charset is applied with `SET NAMES`.
fn mysql(config: &DatabaseConfig) -> (String, Vec<String>) {
    let mut dsn = format!("mysql://{}", host(config));
    if let Some(port) = config.port {
        dsn.push_str(&format!(":{}", port));
    }
    dsn.push('/');
    dsn.push_str(name(config));
    append_options(&mut dsn, config.options.as_deref(), '?');

    let mut init = Vec::new();
    if let Some(charset) = config.charset.as_deref().map(str::to_lowercase) {
        let names = if charset.starts_with("iso") || charset.starts_with("latin1") {
            "latin1"
        } else if charset == "utf8mb4" {
            "utf8mb4"
        } else {
            "utf8"
        };
        init.push(format!("SET NAMES {}", names));
    }
    if let Some(zone) = &config.timezone {
        init.push(format!("SET time_zone = {}", quoted(zone)));
    }
    (dsn, init)
}

/// File path (or `:memory:`); foreign keys are switched on unless disabled.
fn sqlite(config: &DatabaseConfig) -> QueryResult<(String, Vec<String>)> {
    let path = config
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            QueryError::invalid_configuration("SQLite configuration needs a database path in 'name'")
        })?;
    let init = if config.foreign_keys {
        vec!["PRAGMA foreign_keys = ON".to_string()]
    } else {
        Vec::new()
    };
    Ok((path, init))
}

/// `host/port:path;charset=X` as understood by Firebird and Interbase clients.
fn firebird(config: &DatabaseConfig) -> (String, Vec<String>) {
    let mut dsn = host(config).to_string();
    if let Some(port) = config.port {
        dsn.push_str(&format!("/{}", port));
    }
    dsn.push(':');
    dsn.push_str(name(config));
    if let Some(charset) = &config.charset {
        dsn.push_str(&format!(";charset={}", charset));
    }
    append_options(&mut dsn, config.options.as_deref(), ';');
    (dsn, Vec::new())
}

/// TNS name when given, EZConnect `//host:port/service` otherwise.
fn oracle(config: &DatabaseConfig) -> (String, Vec<String>) {
    let mut dsn = match &config.tns_name {
        Some(tns) => tns.clone(),
        None => format!(
            "//{}:{}/{}",
            host(config),
            config.port.or(Driver::Oracle.default_port()).unwrap_or(1521),
            name(config)
        ),
    };
    if let Some(charset) = &config.charset {
        dsn.push_str(&format!(";charset={}", charset));
    }

    let mut init = Vec::new();
    if let Some(date) = &config.date_format {
        init.push(format!("ALTER SESSION SET NLS_DATE_FORMAT = {}", quoted(date)));
    }
    if let Some(time) = &config.time_format {
        init.push(format!("ALTER SESSION SET NLS_TIMESTAMP_FORMAT = {}", quoted(time)));
    }
    if let Some(nsep) = &config.numeric_separators {
        init.push(format!("ALTER SESSION SET NLS_NUMERIC_CHARACTERS = {}", quoted(nsep)));
    }
    (dsn, init)
}

/// Microsoft driver `Server=host,port;Database=name`.
fn sqlsrv(config: &DatabaseConfig) -> (String, Vec<String>) {
    let mut dsn = format!("Server={}", host(config));
    if let Some(port) = config.port {
        dsn.push_str(&format!(",{}", port));
    }
    dsn.push_str(&format!(";Database={}", name(config)));
    append_options(&mut dsn, config.options.as_deref(), ';');
    (dsn, Vec::new())
}

/// FreeTDS `host=h:port;dbname=name;charset=X`.
fn dblib(config: &DatabaseConfig) -> (String, Vec<String>) {
    let mut dsn = format!("host={}", host(config));
    if let Some(port) = config.port {
        dsn.push_str(&format!(":{}", port));
    }
    dsn.push_str(&format!(";dbname={}", name(config)));
    if let Some(charset) = &config.charset {
        dsn.push_str(&format!(";charset={}", charset));
    }
    append_options(&mut dsn, config.options.as_deref(), ';');
    (dsn, Vec::new())
}

/// ODBC data source name, or a full connection string in `opts`.
fn odbc(config: &DatabaseConfig) -> QueryResult<(String, Vec<String>)> {
    let dsn = config
        .options
        .clone()
        .filter(|o| !o.trim().is_empty())
        .or_else(|| config.name.clone())
        .ok_or_else(|| {
            QueryError::invalid_configuration("ODBC configuration needs a data source in 'name' or 'opts'")
        })?;
    Ok((dsn, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_postgres_options() {
        let mut config = DatabaseConfig::new("pgsql")
            .with_host("db")
            .with_port(5432)
            .with_name("erp")
            .with_credentials("app", "it's");
        config.timezone = Some("UTC".into());
        let opts = ConnectOptions::from_config(&config).unwrap();
        assert_eq!(opts.driver, Driver::Postgres);
        assert_eq!(opts.dsn, "host=db port=5432 dbname=erp user=app password='it\\'s'");
        assert_eq!(opts.init_statements, vec!["SET TIME ZONE 'UTC'"]);
    }

    #[test]
    fn test_postgres_dsn_escapes() {
        let config = DatabaseConfig::new("pgsql")
            .with_name("sales 2024")
            .with_credentials("o'hara", r"back\slash");
        let opts = ConnectOptions::from_config(&config).unwrap();
        assert_eq!(
            opts.dsn,
            r"host=localhost dbname='sales 2024' user='o\'hara' password='back\\slash'"
        );
    }

    #[test]
    fn test_mysql_charsets() {
        let mut config = DatabaseConfig::new("mysql").with_name("shop");
        config.charset = Some("utf8mb4".into());
        let opts = ConnectOptions::from_config(&config).unwrap();
        assert_eq!(opts.dsn, "mysql://localhost/shop");
        assert_eq!(opts.init_statements, vec!["SET NAMES utf8mb4"]);

        config.charset = Some("ISO-8859-1".into());
        let opts = ConnectOptions::from_config(&config).unwrap();
        assert_eq!(opts.init_statements, vec!["SET NAMES latin1"]);
    }

    #[test]
    fn test_sqlite_foreign_keys() {
        let opts = ConnectOptions::from_config(&DatabaseConfig::sqlite(":memory:")).unwrap();
        assert_eq!(opts.dsn, ":memory:");
        assert_eq!(opts.init_statements, vec!["PRAGMA foreign_keys = ON"]);

        let mut config = DatabaseConfig::sqlite("app.db");
        config.foreign_keys = false;
        assert!(ConnectOptions::from_config(&config).unwrap().init_statements.is_empty());

        assert!(ConnectOptions::from_config(&DatabaseConfig::new("sqlite")).is_err());
    }

    #[test]
    fn test_oracle_session() {
        let mut config = DatabaseConfig::new("oracle").with_host("ora").with_name("XE");
        config.date_format = Some("YYYY-MM-DD".into());
        config.numeric_separators = Some(".,".into());
        let opts = ConnectOptions::from_config(&config).unwrap();
        assert_eq!(opts.dsn, "//ora:1521/XE");
        assert_eq!(
            opts.init_statements,
            vec![
                "ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD'",
                "ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'",
            ]
        );

        config.tns_name = Some("PROD".into());
        assert_eq!(ConnectOptions::from_config(&config).unwrap().dsn, "PROD");
    }

    #[test]
    fn test_firebird_and_sqlserver() {
        let config = DatabaseConfig::new("fbird")
            .with_host("fb")
            .with_port(3050)
            .with_name("/data/erp.fdb");
        assert_eq!(ConnectOptions::from_config(&config).unwrap().dsn, "fb/3050:/data/erp.fdb");

        let config = DatabaseConfig::new("sqlsrv").with_host("sql").with_port(1433).with_name("erp");
        assert_eq!(
            ConnectOptions::from_config(&config).unwrap().dsn,
            "Server=sql,1433;Database=erp"
        );

        let config = DatabaseConfig::new("mssql").with_host("sql").with_name("erp");
        let opts = ConnectOptions::from_config(&config).unwrap();
        assert_ne!(opts.driver, Driver::Mssql);
    }

    #[test]
    fn test_odbc_requires_source() {
        assert!(ConnectOptions::from_config(&DatabaseConfig::new("odbc")).is_err());
        let config = DatabaseConfig::new("odbc").with_name("LEGACY");
        assert_eq!(ConnectOptions::from_config(&config).unwrap().dsn, "LEGACY");
    }
}
