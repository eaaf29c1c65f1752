//! Schema changes on the active frame.

use tracing::info;

use crate::error::{QueryError, QueryResult};
use crate::transaction::TransactionManager;
use crate::value::PreparedVars;

/// `CREATE TABLE table (name type, ...)`
pub fn create_table(tx: &TransactionManager, table: &str, columns: &[(&str, &str)]) -> QueryResult<()> {
    if columns.is_empty() {
        return Err(QueryError::invalid_input(
            "columns",
            format!("table {} needs at least one column", table),
        ));
    }
    let definitions: Vec<String> = columns
        .iter()
        .map(|(name, kind)| format!("{} {}", name, kind))
        .collect();
    tx.execute_sql(
        &format!("CREATE TABLE {} ({})", table, definitions.join(", ")),
        &PreparedVars::new(),
    )?;
    info!(table = %table, "Table created");
    Ok(())
}

/// `DROP TABLE [IF EXISTS] table`
pub fn drop_table(tx: &TransactionManager, table: &str, if_exists: bool) -> QueryResult<()> {
    let sql = if if_exists {
        format!("DROP TABLE IF EXISTS {}", table)
    } else {
        format!("DROP TABLE {}", table)
    };
    tx.execute_sql(&sql, &PreparedVars::new())?;
    info!(table = %table, "Table dropped");
    Ok(())
}

/// `ALTER TABLE table ADD column type [options]`
pub fn add_column(tx: &TransactionManager, table: &str, column: &str, kind: &str, options: &str) -> QueryResult<()> {
    let mut sql = format!("ALTER TABLE {} ADD {} {}", table, column, kind);
    if !options.trim().is_empty() {
        sql.push(' ');
        sql.push_str(options.trim());
    }
    tx.execute_sql(&sql, &PreparedVars::new())?;
    Ok(())
}

/// `ALTER TABLE table DROP COLUMN column`
pub fn drop_column(tx: &TransactionManager, table: &str, column: &str) -> QueryResult<()> {
    tx.execute_sql(
        &format!("ALTER TABLE {} DROP COLUMN {}", table, column),
        &PreparedVars::new(),
    )?;
    Ok(())
}

/// Whether `table` exists, looked up in the driver's catalog.
pub fn table_exists(tx: &TransactionManager, table: &str) -> QueryResult<bool> {
    let connection = tx.connection()?;
    let sql = connection.dialect().table_exists_sql(table);
    Ok(!tx.query_sql(&sql, &PreparedVars::new())?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseConfig;
    use crate::mock::{row, transaction};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ddl_statements() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        create_table(&tx, "city", &[("id", "INTEGER PRIMARY KEY"), ("name", "TEXT")]).unwrap();
        add_column(&tx, "city", "state", "CHAR(2)", "NOT NULL DEFAULT 'RS'").unwrap();
        drop_column(&tx, "city", "state").unwrap();
        drop_table(&tx, "city", true).unwrap();

        assert_eq!(
            conn.statements(),
            vec![
                "CREATE TABLE city (id INTEGER PRIMARY KEY, name TEXT)",
                "ALTER TABLE city ADD state CHAR(2) NOT NULL DEFAULT 'RS'",
                "ALTER TABLE city DROP COLUMN state",
                "DROP TABLE IF EXISTS city",
            ]
        );
    }

    #[test]
    fn test_table_exists_uses_dialect_catalog() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        conn.push_rows(vec![row([("1", 1)])]);
        assert!(table_exists(&tx, "city").unwrap());
        assert!(!table_exists(&tx, "ghost").unwrap());
        assert_eq!(
            conn.statements()[0],
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'city'"
        );
    }

    #[test]
    fn test_create_table_requires_columns() {
        let (tx, _conn) = transaction(DatabaseConfig::sqlite("t.db"));
        assert!(create_table(&tx, "empty", &[]).is_err());
    }
}
