//! UPDATE builder.

use indexmap::IndexMap;

use super::{Statement, push_where};
use crate::criteria::Criteria;
use crate::error::{QueryError, QueryResult};
use crate::sql::SqlWriter;
use crate::value::Value;

/// `UPDATE entity SET column = value, ... WHERE criteria`.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    entity: String,
    row: IndexMap<String, Value>,
    criteria: Option<Criteria>,
}

impl UpdateStatement {
    /// Update `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            row: IndexMap::new(),
            criteria: None,
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

    /// Set the criteria.
    pub fn set_criteria(&mut self, criteria: Criteria) -> &mut Self {
        self.criteria = Some(criteria);
        self
    }

    /// Columns and values to write.
    pub fn row_data(&self) -> &IndexMap<String, Value> {
        &self.row
    }
}

impl Statement for UpdateStatement {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn write(&self, writer: &mut SqlWriter<'_>) -> QueryResult<String> {
        if self.row.is_empty() {
            return Err(QueryError::invalid_input(
                "columns",
                format!("UPDATE of {} has no column values", self.entity),
            ));
        }

        let assignments: Vec<String> = self
            .row
            .iter()
            .map(|(column, value)| format!("{} = {}", column, writer.operand(value)))
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.entity, assignments.join(", "));
        push_where(&mut sql, self.criteria.as_ref(), writer);
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::filter::Filter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_update() {
        let mut criteria = Criteria::new();
        criteria.add(Filter::eq("id", 4));
        let mut update = UpdateStatement::new("customer");
        update
            .set_row_data("name", "Bia")
            .set_row_data("active", false)
            .set_criteria(criteria);

        let r = update.render(&SqliteDialect, true).unwrap();
        assert_eq!(r.sql, "UPDATE customer SET name = :p1, active = :p2 WHERE (id = :p3)");
        assert_eq!(r.vars.len(), 3);

        let r = update.render(&SqliteDialect, false).unwrap();
        assert_eq!(r.sql, "UPDATE customer SET name = 'Bia', active = 0 WHERE (id = 4)");
    }

    #[test]
    fn test_null_assignment_is_literal_null() {
        let mut update = UpdateStatement::new("customer");
        update.set_row_data("deleted_at", Value::Null);
        let r = update.render(&SqliteDialect, false).unwrap();
        assert_eq!(r.sql, "UPDATE customer SET deleted_at = NULL");
    }
}
