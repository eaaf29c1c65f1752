//! INSERT builder.

use indexmap::IndexMap;

use super::Statement;
use crate::error::{QueryError, QueryResult};
use crate::sql::SqlWriter;
use crate::value::Value;

/// `INSERT INTO entity (columns) VALUES (values)`.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    entity: String,
    row: IndexMap<String, Value>,
    returning: Option<String>,
}

impl InsertStatement {
    /// Insert into `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            row: IndexMap::new(),
            returning: None,
        }
    }

    /// Set the value of one column.
    pub fn set_row_data(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.row.insert(column.into(), value.into());
        self
    }

    /// Remove a column.
    pub fn unset_row_data(&mut self, column: &str) -> &mut Self {
        self.row.shift_remove(column);
        self
    }

    /// Ask for `column` back where the dialect supports `RETURNING`.
    pub fn set_returning(&mut self, column: impl Into<String>) -> &mut Self {
        self.returning = Some(column.into());
        self
    }

    /// Columns and values to insert.
    pub fn row_data(&self) -> &IndexMap<String, Value> {
        &self.row
    }

    /// Whether rendering for `writer` appends a `RETURNING` clause.
    pub fn returns_key(&self, writer: &SqlWriter<'_>) -> bool {
        self.returning.is_some() && writer.dialect().supports_returning()
    }
}

impl Statement for InsertStatement {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn write(&self, writer: &mut SqlWriter<'_>) -> QueryResult<String> {
        if self.row.is_empty() {
            return Err(QueryError::invalid_input(
                "columns",
                format!("INSERT into {} has no column values", self.entity),
            ));
        }

        let columns: Vec<&str> = self.row.keys().map(String::as_str).collect();
        let values: Vec<String> = self.row.values().map(|v| writer.operand(v)).collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.entity,
            columns.join(", "),
            values.join(", ")
        );
        if self.returns_key(writer) {
            if let Some(pk) = &self.returning {
                sql.push_str(" RETURNING ");
                sql.push_str(pk);
            }
        }
        Ok(sql)
    }
}
