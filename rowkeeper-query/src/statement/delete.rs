//! DELETE builder.

use super::{Statement, push_where};
use crate::criteria::Criteria;
use crate::error::QueryResult;
use crate::sql::SqlWriter;

/// `DELETE FROM entity WHERE criteria`.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    entity: String,
    criteria: Option<Criteria>,
}

impl DeleteStatement {
    /// Delete from `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            criteria: None,
        }
    }

    /// Set the criteria.
    pub fn set_criteria(&mut self, criteria: Criteria) -> &mut Self {
        self.criteria = Some(criteria);
        self
    }
}

impl Statement for DeleteStatement {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn write(&self, writer: &mut SqlWriter<'_>) -> QueryResult<String> {
        let mut sql = format!("DELETE FROM {}", self.entity);
        push_where(&mut sql, self.criteria.as_ref(), writer);
        Ok(sql)
    }
}
