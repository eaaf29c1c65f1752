//! SELECT builder.

use super::Statement;
use crate::criteria::Criteria;
use crate::dialect::SelectParts;
use crate::error::QueryResult;
use crate::sql::SqlWriter;

/// `SELECT columns FROM entity` with criteria, grouping, ordering and paging.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    entity: String,
    columns: Vec<String>,
    criteria: Option<Criteria>,
}

impl SelectStatement {
    /// Select from `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            columns: Vec::new(),
            criteria: None,
        }
    }

    /// Add a column or expression to the select list.
    pub fn add_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.columns.push(column.into());
        self
    }

    /// Replace the select list.
    pub fn set_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the criteria.
    pub fn set_criteria(&mut self, criteria: Criteria) -> &mut Self {
        self.criteria = Some(criteria);
        self
    }

    /// The criteria, if any.
    pub fn criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    /// Selected columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Statement for SelectStatement {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn write(&self, writer: &mut SqlWriter<'_>) -> QueryResult<String> {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };

        let where_clause = self
            .criteria
            .as_ref()
            .map(|c| c.write(writer))
            .filter(|w| !w.is_empty());
        let order = self.criteria.as_ref().and_then(Criteria::order_clause);

        let mut parts = SelectParts::new(&columns, &self.entity);
        parts.where_clause = where_clause.as_deref();
        parts.order = order.as_deref();
        if let Some(criteria) = &self.criteria {
            parts.group = criteria.group();
            parts.limit = criteria.limit();
            parts.offset = criteria.offset();
        }

        Ok(writer.dialect().select(&parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Driver;
    use crate::dialect::{FirebirdDialect, PostgresDialect, SqlServerDialect};
    use crate::filter::Filter;
    use crate::mock::MockConnection;
    use crate::types::SortOrder;
    use pretty_assertions::assert_eq;

    fn paged() -> SelectStatement {
        let mut criteria = Criteria::new();
        criteria
            .where_("state", "=", "SP")
            .set_order("name")
            .set_direction(SortOrder::Asc)
            .set_limit(10)
            .set_offset(20);
        let mut select = SelectStatement::new("city");
        select.set_columns(["id", "name"]).set_criteria(criteria);
        select
    }

    #[test]
    fn test_standard() {
        let r = paged().render(&PostgresDialect, true).unwrap();
        assert_eq!(
            r.sql,
            "SELECT id, name FROM city WHERE (state = :p1) ORDER BY name asc LIMIT 10 OFFSET 20"
        );
        assert_eq!(r.vars.len(), 1);
    }

    #[test]
    fn test_sqlserver() {
        let r = paged().render(&SqlServerDialect, false).unwrap();
        assert_eq!(
            r.sql,
            "SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY name asc) AS __ROWNUMBER__, id, name \
             FROM city WHERE (state = 'SP')) AS TAB WHERE __ROWNUMBER__ BETWEEN 21 AND 30 \
             ORDER BY __ROWNUMBER__"
        );
    }

    #[test]
    fn test_firebird() {
        let r = paged().render(&FirebirdDialect, false).unwrap();
        assert!(r.sql.starts_with("SELECT FIRST 10 SKIP 20 id, name FROM city"));
    }

    #[test]
    fn test_without_criteria() {
        let r = SelectStatement::new("city").render(&PostgresDialect, false).unwrap();
        assert_eq!(r.sql, "SELECT * FROM city");
    }

    #[test]
    fn test_connection_quoting() {
        let conn = MockConnection::new(Driver::MySql);
        let mut criteria = Criteria::new();
        criteria.add(Filter::eq("path", "c:\\tmp"));
        let mut select = SelectStatement::new("files");
        select.set_criteria(criteria);
        let r = select.get_instruction(&conn, false, None).unwrap();
        assert_eq!(r.sql, "SELECT * FROM files WHERE (path = 'c:\\\\tmp')");
    }
}
