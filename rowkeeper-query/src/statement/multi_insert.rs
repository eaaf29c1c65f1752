//! Multi-row INSERT builder for bulk loads.

use super::{Rendered, Statement};
use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::sql::SqlWriter;
use crate::value::{Row, Value};

/// Default rows per INSERT.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// `INSERT INTO entity (columns) VALUES (...), (...), ...`, split in batches.
///
/// The column list is fixed by the first row; later rows are aligned to it by
/// name and missing columns are written as NULL. Dialects without multi-row
/// VALUES lists (Oracle) get one statement per row.
#[derive(Debug, Clone)]
pub struct MultiInsertStatement {
    entity: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    batch_size: usize,
}

impl MultiInsertStatement {
    /// Insert into `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per statement (the dialect may lower it).
    pub fn set_batch_size(&mut self, size: usize) -> &mut Self {
        self.batch_size = size.max(1);
        self
    }

    /// Queue one row.
    pub fn add_row(&mut self, row: &Row) -> &mut Self {
        if self.columns.is_empty() {
            self.columns = row.keys().cloned().collect();
        }
        let values = self
            .columns
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(values);
        self
    }

    /// Number of queued rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row is queued.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop queued rows, keeping the column list.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    fn write_batch(&self, rows: &[Vec<Value>], writer: &mut SqlWriter<'_>) -> String {
        let tuples: Vec<String> = rows
            .iter()
            .map(|values| {
                let rendered: Vec<String> = values.iter().map(|v| writer.operand(v)).collect();
                format!("({})", rendered.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.entity,
            self.columns.join(", "),
            tuples.join(", ")
        )
    }

    fn batches(&self, dialect: &dyn Dialect) -> std::slice::Chunks<'_, Vec<Value>> {
        self.rows.chunks(dialect.max_insert_batch(self.batch_size))
    }

    /// Render every batch for `dialect`.
    pub fn render_batches(&self, dialect: &dyn Dialect, prepared: bool) -> Vec<Rendered> {
        self.batches(dialect)
            .map(|rows| {
                let mut writer = SqlWriter::new(dialect, prepared);
                let sql = self.write_batch(rows, &mut writer);
                Rendered {
                    sql,
                    vars: writer.finish(),
                }
            })
            .collect()
    }

    /// Render every batch for a live connection.
    pub fn get_instructions(&self, connection: &dyn Connection, prepared: bool) -> Vec<Rendered> {
        self.batches(connection.dialect())
            .map(|rows| {
                let mut writer = SqlWriter::for_connection(connection, prepared);
                let sql = self.write_batch(rows, &mut writer);
                Rendered {
                    sql,
                    vars: writer.finish(),
                }
            })
            .collect()
    }
}

impl Statement for MultiInsertStatement {
    fn entity(&self) -> &str {
        &self.entity
    }

    /// Render all rows as one statement, ignoring the batch size.
    fn write(&self, writer: &mut SqlWriter<'_>) -> QueryResult<String> {
        if self.rows.is_empty() {
            return Err(QueryError::invalid_input(
                "rows",
                format!("multi-row INSERT into {} has no rows", self.entity),
            ));
        }
        Ok(self.write_batch(&self.rows, writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect};
    use crate::mock::row;
    use pretty_assertions::assert_eq;

    fn statement() -> MultiInsertStatement {
        let mut insert = MultiInsertStatement::new("city");
        insert.set_batch_size(2);
        insert.add_row(&row([("id", Value::from(1)), ("name", Value::from("A"))]));
        insert.add_row(&row([("name", Value::from("B")), ("id", Value::from(2))]));
        insert.add_row(&row([("id", Value::from(3))]));
        insert
    }

    #[test]
    fn test_batches() {
        let batches = statement().render_batches(&PostgresDialect, false);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[0].sql,
            "INSERT INTO city (id, name) VALUES (1, 'A'), (2, 'B')"
        );
        assert_eq!(batches[1].sql, "INSERT INTO city (id, name) VALUES (3, NULL)");
    }

    #[test]
    fn test_prepared_batches_restart_numbering() {
        let batches = statement().render_batches(&PostgresDialect, true);
        assert_eq!(batches[1].sql, "INSERT INTO city (id, name) VALUES (:p1, :p2)");
        assert_eq!(batches[1].vars[":p2"], Value::Null);
    }

    #[test]
    fn test_oracle_single_row() {
        let batches = statement().render_batches(&OracleDialect, false);
        assert_eq!(batches.len(), 3);
    }
}
