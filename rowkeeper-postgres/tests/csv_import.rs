//! CSV import against a live PostgreSQL server.
//!
//! Run with `ROWKEEPER_PG_DSN="host=.. dbname=.." cargo test -p rowkeeper-postgres -- --ignored`.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rowkeeper_postgres::PgConnection;
use rowkeeper_query::connection::{ConnectOptions, Connection, Connector, MemoryConfigSource};
use rowkeeper_query::tasks::{CsvOptions, count_data, create_table, drop_table, import_csv};
use rowkeeper_query::{ConnectionManager, DatabaseConfig, Driver, QueryResult, TransactionManager};

/// Connects with the DSN from the environment instead of the configuration.
struct EnvDsn(String);

impl Connector for EnvDsn {
    fn connect(&self, _options: &ConnectOptions) -> QueryResult<Arc<dyn Connection>> {
        Ok(Arc::new(PgConnection::connect(&self.0, None, None)?))
    }
}

fn transaction() -> TransactionManager {
    let dsn = std::env::var("ROWKEEPER_PG_DSN").unwrap();
    let configs = MemoryConfigSource::new().with("pg", DatabaseConfig::new("pgsql").with_name("rowkeeper"));
    let connections = ConnectionManager::new(configs).with_connector(Driver::Postgres, EnvDsn(dsn));
    TransactionManager::new(Arc::new(connections))
}

#[test]
#[ignore]
fn test_skipped_duplicates_do_not_abort_later_rows() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("people.csv");
    std::fs::write(&file, "id,name\n1,Ana\n2,Bruno\n1,Ana again\n3,Carla\n4,Davi\n").unwrap();

    let mut tx = transaction();
    tx.open("pg").unwrap();
    drop_table(&tx, "rk_csv_person", true).unwrap();
    create_table(&tx, "rk_csv_person", &[("id", "INTEGER PRIMARY KEY"), ("name", "TEXT")]).unwrap();

    let options = CsvOptions::default().skip_duplicates(true).commit_every(2);
    let report = import_csv(&tx, &file, "rk_csv_person", &options).unwrap();
    assert_eq!(report.inserted, 4);
    assert_eq!(report.skipped, 1);
    assert_eq!(count_data(&tx, "rk_csv_person", None).unwrap(), 4);

    drop_table(&tx, "rk_csv_person", false).unwrap();
    tx.close().unwrap();
}
