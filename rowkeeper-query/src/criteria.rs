//! Composable filter trees with ordering and paging properties.
//!
//! ```rust
//! use rowkeeper_query::criteria::Criteria;
//! use rowkeeper_query::dialect::PostgresDialect;
//! use rowkeeper_query::filter::Filter;
//!
//! let mut inner = Criteria::new();
//! inner.add(Filter::eq("state", "SP"));
//! inner.or(Filter::eq("state", "RJ"));
//!
//! let mut criteria = Criteria::new();
//! criteria.add(Filter::new("population", ">", 100_000));
//! criteria.add(inner);
//!
//! let (sql, vars) = criteria.dump(&PostgresDialect, true);
//! assert_eq!(sql, "(population > :p1 AND (state = :p2 OR state = :p3))");
//! assert_eq!(vars.len(), 3);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::dialect::Dialect;
use crate::filter::{Filter, Operator};
use crate::sql::SqlWriter;
use crate::types::{JoinOp, SortOrder};
use crate::value::{PreparedVars, Value};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one criteria instance.
///
/// Clones receive a fresh id, so bookkeeping keyed by it (such as "global
/// scopes already applied") never leaks from a criteria to its copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CriteriaId(u64);

impl CriteriaId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A node of the criteria tree.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Leaf comparison.
    Filter(Filter),
    /// Nested, parenthesised group.
    Criteria(Criteria),
}

impl From<Filter> for Expression {
    fn from(filter: Filter) -> Self {
        Self::Filter(filter)
    }
}

impl From<Criteria> for Expression {
    fn from(criteria: Criteria) -> Self {
        Self::Criteria(criteria)
    }
}

impl Expression {
    fn write(&self, writer: &mut SqlWriter<'_>) -> String {
        match self {
            Self::Filter(filter) => filter.write(writer),
            Self::Criteria(criteria) => criteria.write(writer),
        }
    }
}

/// Ordered list of expressions joined by AND/OR, plus query properties.
#[derive(Debug)]
pub struct Criteria {
    id: CriteriaId,
    entries: Vec<(Expression, JoinOp)>,
    order: Option<String>,
    direction: Option<SortOrder>,
    limit: Option<u64>,
    offset: Option<u64>,
    group: Option<String>,
}

impl Clone for Criteria {
    fn clone(&self) -> Self {
        Self {
            id: CriteriaId::next(),
            entries: self.entries.clone(),
            order: self.order.clone(),
            direction: self.direction,
            limit: self.limit,
            offset: self.offset,
            group: self.group.clone(),
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::new()
    }
}

impl Criteria {
    /// Create an empty criteria.
    pub fn new() -> Self {
        Self {
            id: CriteriaId::next(),
            entries: Vec::new(),
            order: None,
            direction: None,
            limit: None,
            offset: None,
            group: None,
        }
    }

    /// Build an AND-ed equality criteria from `(column, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut criteria = Self::new();
        for (field, value) in pairs {
            criteria.add(Filter::eq(field, value));
        }
        criteria
    }

    /// Identity of this instance.
    pub fn id(&self) -> CriteriaId {
        self.id
    }

    /// Append an expression with `op`; the first entry's operator is ignored.
    pub fn add_with(&mut self, expression: impl Into<Expression>, op: JoinOp) -> &mut Self {
        self.entries.push((expression.into(), op));
        self
    }

    /// Append an expression joined with AND.
    pub fn add(&mut self, expression: impl Into<Expression>) -> &mut Self {
        self.add_with(expression, JoinOp::And)
    }

    /// Append an expression joined with OR.
    pub fn or(&mut self, expression: impl Into<Expression>) -> &mut Self {
        self.add_with(expression, JoinOp::Or)
    }

    /// Append `field op value` joined with AND.
    pub fn where_(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.add(Filter::new(field, operator, value))
    }

    /// Append `field op value` joined with OR.
    pub fn or_where(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.or(Filter::new(field, operator, value))
    }

    /// Whether no expression was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level expressions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Top-level expressions with their join operators.
    pub fn entries(&self) -> &[(Expression, JoinOp)] {
        &self.entries
    }

    /// Drop all expressions, keeping properties.
    pub fn clear_expressions(&mut self) {
        self.entries.clear();
    }

    /// Group the current expressions into one nested criteria when they mix
    /// AND and OR, so entries appended afterwards constrain the whole of it.
    ///
    /// Identity and properties are unchanged.
    pub fn nest(&mut self) {
        let mixes_or = self.entries.iter().skip(1).any(|(_, op)| *op == JoinOp::Or);
        if !mixes_or {
            return;
        }
        let mut group = Criteria::new();
        group.entries = std::mem::take(&mut self.entries);
        self.entries.push((Expression::Criteria(group), JoinOp::And));
    }

    /// Set the ORDER BY expression.
    pub fn set_order(&mut self, order: impl Into<String>) -> &mut Self {
        self.order = Some(order.into());
        self
    }

    /// Set the ORDER BY direction.
    pub fn set_direction(&mut self, direction: SortOrder) -> &mut Self {
        self.direction = Some(direction);
        self
    }

    /// Set the maximum row count.
    pub fn set_limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Set the number of rows to skip.
    pub fn set_offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Set the GROUP BY expression.
    pub fn set_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.group = Some(group.into());
        self
    }

    /// Clear order, direction, limit, offset and group.
    pub fn reset_properties(&mut self) {
        self.order = None;
        self.direction = None;
        self.limit = None;
        self.offset = None;
        self.group = None;
    }

    /// ORDER BY expression.
    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    /// ORDER BY direction.
    pub fn direction(&self) -> Option<SortOrder> {
        self.direction
    }

    /// Row limit.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Row offset.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// GROUP BY expression.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// ORDER BY clause body: the order expression followed by the direction.
    pub fn order_clause(&self) -> Option<String> {
        let order = self.order.as_deref().filter(|o| !o.trim().is_empty())?;
        Some(match self.direction {
            Some(direction) => format!("{} {}", order, direction.as_sql().to_lowercase()),
            None => order.to_string(),
        })
    }

    /// Render into `writer`; empty criteria render as an empty string.
    pub fn write(&self, writer: &mut SqlWriter<'_>) -> String {
        let mut sql = String::new();
        for (expression, op) in &self.entries {
            let part = expression.write(writer);
            if part.is_empty() {
                continue;
            }
            if !sql.is_empty() {
                sql.push(' ');
                sql.push_str(op.as_sql());
                sql.push(' ');
            }
            sql.push_str(&part);
        }
        if sql.is_empty() {
            sql
        } else {
            format!("({})", sql)
        }
    }

    /// Render standalone, returning SQL and placeholders.
    pub fn dump(&self, dialect: &dyn Dialect, prepared: bool) -> (String, PreparedVars) {
        let mut writer = SqlWriter::new(dialect, prepared);
        let sql = self.write(&mut writer);
        (sql, writer.finish())
    }
}
