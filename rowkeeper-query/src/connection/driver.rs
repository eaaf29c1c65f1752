//! Database driver identification.

use std::fmt;

use crate::dialect::{
    AnsiDialect, Dialect, FirebirdDialect, MySqlDialect, OracleDialect, PostgresDialect,
    SqlServerDialect, SqliteDialect,
};
use crate::error::{QueryError, QueryResult};

static POSTGRES: PostgresDialect = PostgresDialect;
static MYSQL: MySqlDialect = MySqlDialect;
static SQLITE: SqliteDialect = SqliteDialect;
static ANSI: AnsiDialect = AnsiDialect;
static SQLSERVER: SqlServerDialect = SqlServerDialect;
static ORACLE: OracleDialect = OracleDialect;
static FIREBIRD: FirebirdDialect = FirebirdDialect;

/// Database driver type, as written in the `type` config field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    /// PostgreSQL (`pgsql`)
    Postgres,
    /// MySQL / MariaDB (`mysql`)
    MySql,
    /// SQLite (`sqlite`)
    Sqlite,
    /// Interbase (`ibase`)
    Ibase,
    /// Firebird (`fbird`)
    Firebird,
    /// Oracle (`oracle`)
    Oracle,
    /// SQL Server, native driver picked by platform (`mssql`)
    Mssql,
    /// SQL Server over FreeTDS (`dblib`)
    Dblib,
    /// SQL Server over the Microsoft driver (`sqlsrv`)
    Sqlsrv,
    /// Generic ODBC data source (`odbc`)
    Odbc,
}

impl Driver {
    /// Every driver, in config-name order.
    pub const ALL: [Driver; 10] = [
        Self::Postgres,
        Self::MySql,
        Self::Sqlite,
        Self::Ibase,
        Self::Firebird,
        Self::Oracle,
        Self::Mssql,
        Self::Dblib,
        Self::Sqlsrv,
        Self::Odbc,
    ];

    /// Parse a config `type` value.
    pub fn from_name(name: &str) -> QueryResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "ibase" => Ok(Self::Ibase),
            "fbird" | "firebird" => Ok(Self::Firebird),
            "oracle" | "oci" => Ok(Self::Oracle),
            "mssql" => Ok(Self::Mssql),
            "dblib" => Ok(Self::Dblib),
            "sqlsrv" => Ok(Self::Sqlsrv),
            "odbc" => Ok(Self::Odbc),
            other => Err(QueryError::unsupported_driver(other)),
        }
    }

    /// Canonical config name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "pgsql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Ibase => "ibase",
            Self::Firebird => "fbird",
            Self::Oracle => "oracle",
            Self::Mssql => "mssql",
            Self::Dblib => "dblib",
            Self::Sqlsrv => "sqlsrv",
            Self::Odbc => "odbc",
        }
    }

    /// Get the default port for this driver.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySql => Some(3306),
            Self::Ibase | Self::Firebird => Some(3050),
            Self::Oracle => Some(1521),
            Self::Mssql | Self::Dblib | Self::Sqlsrv => Some(1433),
            Self::Sqlite | Self::Odbc => None,
        }
    }

    /// Concrete driver: `mssql` becomes `sqlsrv` on Windows and `dblib` elsewhere.
    pub fn resolve(self) -> Self {
        match self {
            Self::Mssql if cfg!(windows) => Self::Sqlsrv,
            Self::Mssql => Self::Dblib,
            other => other,
        }
    }

    /// SQL dialect spoken by this driver.
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            Self::Postgres => &POSTGRES,
            Self::MySql => &MYSQL,
            Self::Sqlite => &SQLITE,
            Self::Ibase | Self::Firebird => &FIREBIRD,
            Self::Oracle => &ORACLE,
            Self::Mssql | Self::Dblib | Self::Sqlsrv => &SQLSERVER,
            Self::Odbc => &ANSI,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Driver {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_names_round_trip() {
        for driver in Driver::ALL {
            assert_eq!(Driver::from_name(driver.name()).unwrap(), driver);
        }
        assert_eq!(Driver::from_name("PostgreSQL").unwrap(), Driver::Postgres);
    }

    #[test]
    fn test_unknown_driver() {
        let err = Driver::from_name("db2").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedDriver);
    }

    #[test]
    fn test_mssql_resolution() {
        let resolved = Driver::Mssql.resolve();
        if cfg!(windows) {
            assert_eq!(resolved, Driver::Sqlsrv);
        } else {
            assert_eq!(resolved, Driver::Dblib);
        }
        assert_eq!(Driver::Odbc.resolve(), Driver::Odbc);
    }

    #[test]
    fn test_dialects() {
        assert_eq!(Driver::Ibase.dialect().name(), "firebird");
        assert_eq!(Driver::Dblib.dialect().name(), "sqlserver");
        assert_eq!(Driver::Odbc.dialect().name(), "ansi");
    }
}
