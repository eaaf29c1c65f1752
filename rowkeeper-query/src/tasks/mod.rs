//! Table-level helpers working on raw table names.
//!
//! These functions skip the entity layer entirely: no schema, hooks, scopes
//! or cache. The row-level and DDL helpers run on the top frame of a
//! [`TransactionManager`]; [`copy_data`] opens its own connections.

mod copy;
mod csv;
mod ddl;

pub use self::copy::{BatchPolicy, CopyOptions, CopyReport, copy_data};
pub use self::csv::{CsvOptions, ImportReport, export_csv, export_csv_with, import_csv, import_csv_with};
pub use self::ddl::{add_column, create_table, drop_column, drop_table, table_exists};

use crate::criteria::Criteria;
use crate::error::{QueryError, QueryResult};
use crate::statement::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use crate::transaction::TransactionManager;
use crate::value::{Row, Value};

/// Where rows are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSource {
    /// Every row of a table.
    Table(String),
    /// A raw SELECT.
    Query(String),
}

impl RowSource {
    /// Every row of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self::Table(table.into())
    }

    /// Rows of a raw SELECT.
    pub fn query(sql: impl Into<String>) -> Self {
        Self::Query(sql.into())
    }

    pub(crate) fn sql(&self) -> String {
        match self {
            Self::Table(table) => format!("SELECT * FROM {}", table),
            Self::Query(sql) => sql.clone(),
        }
    }
}

/// INSERT one row into `table`.
pub fn insert_data(tx: &TransactionManager, table: &str, row: &Row) -> QueryResult<u64> {
    let mut insert = InsertStatement::new(table);
    for (column, value) in row {
        insert.set_row_data(column.clone(), value.clone());
    }
    tx.execute(&insert)
}

/// UPDATE the rows of `table` matching `criteria` with `values`.
pub fn update_data(tx: &TransactionManager, table: &str, values: &Row, criteria: Criteria) -> QueryResult<u64> {
    if criteria.is_empty() {
        return Err(QueryError::invalid_input(
            "criteria",
            format!("refusing to update every row of {}", table),
        ));
    }
    let mut update = UpdateStatement::new(table);
    for (column, value) in values {
        update.set_row_data(column.clone(), value.clone());
    }
    update.set_criteria(criteria);
    tx.execute(&update)
}

/// DELETE the rows of `table` matching `criteria`.
pub fn delete_data(tx: &TransactionManager, table: &str, criteria: Criteria) -> QueryResult<u64> {
    if criteria.is_empty() {
        return Err(QueryError::invalid_input(
            "criteria",
            format!("refusing to delete every row of {}", table),
        ));
    }
    let mut delete = DeleteStatement::new(table);
    delete.set_criteria(criteria);
    tx.execute(&delete)
}

/// SELECT `columns` (all when empty) from `table`.
pub fn get_data(
    tx: &TransactionManager,
    table: &str,
    columns: &[&str],
    criteria: Option<Criteria>,
) -> QueryResult<Vec<Row>> {
    let mut select = SelectStatement::new(table);
    select.set_columns(columns.iter().copied());
    if let Some(criteria) = criteria {
        select.set_criteria(criteria);
    }
    tx.query(&select)
}

/// Number of rows of `table` matching `criteria`.
pub fn count_data(tx: &TransactionManager, table: &str, criteria: Option<Criteria>) -> QueryResult<u64> {
    let mut select = SelectStatement::new(table);
    select.add_column("count(*) AS count");
    if let Some(mut criteria) = criteria {
        criteria.reset_properties();
        select.set_criteria(criteria);
    }
    let count = tx
        .query(&select)?
        .first()
        .and_then(|row| row.values().next())
        .and_then(Value::as_i64)
        .unwrap_or(0);
    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseConfig;
    use crate::filter::Filter;
    use crate::mock::{row, transaction};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_level_helpers() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        insert_data(&tx, "city", &row([("id", Value::from(1)), ("name", Value::from("Lajeado"))])).unwrap();
        update_data(
            &tx,
            "city",
            &row([("name", "Estrela")]),
            Criteria::from_pairs([("id", 1)]),
        )
        .unwrap();
        get_data(&tx, "city", &["id", "name"], Some(Criteria::from_pairs([("id", 1)]))).unwrap();
        delete_data(&tx, "city", Criteria::from_pairs([("id", 1)])).unwrap();

        assert_eq!(
            conn.statements(),
            vec![
                "INSERT INTO city (id, name) VALUES (1, 'Lajeado')",
                "UPDATE city SET name = 'Estrela' WHERE (id = 1)",
                "SELECT id, name FROM city WHERE (id = 1)",
                "DELETE FROM city WHERE (id = 1)",
            ]
        );
    }

    #[test]
    fn test_unfiltered_writes_are_refused() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        assert!(delete_data(&tx, "city", Criteria::new()).is_err());
        assert!(update_data(&tx, "city", &row([("a", 1)]), Criteria::new()).is_err());
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn test_count_data() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        conn.push_rows(vec![row([("count", "7")])]);
        let mut criteria = Criteria::new();
        criteria.add(Filter::eq("state", "RS")).set_limit(2);
        assert_eq!(count_data(&tx, "city", Some(criteria)).unwrap(), 7);
        assert_eq!(
            conn.statements(),
            vec!["SELECT count(*) AS count FROM city WHERE (state = 'RS')"]
        );
    }

    #[test]
    fn test_row_source_sql() {
        assert_eq!(RowSource::table("city").sql(), "SELECT * FROM city");
        assert_eq!(RowSource::query("SELECT id FROM city").sql(), "SELECT id FROM city");
    }
}
