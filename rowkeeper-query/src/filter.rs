//! Leaf predicates of a criteria tree.
//!
//! A [`Filter`] compares one column against an operand:
//!
//! ```rust
//! use rowkeeper_query::dialect::PostgresDialect;
//! use rowkeeper_query::filter::{Filter, Operator};
//! use rowkeeper_query::Value;
//!
//! let filter = Filter::new("name", Operator::Like, "ana%").case_insensitive();
//! let (sql, vars) = filter.dump(&PostgresDialect, true);
//! assert_eq!(sql, "UPPER(name) LIKE UPPER(:p1)");
//! assert_eq!(vars[":p1"], Value::from("ana%"));
//!
//! let (sql, _) = Filter::new("state_id", "in", vec![1, 2, 3]).dump(&PostgresDialect, false);
//! assert_eq!(sql, "state_id IN (1, 2, 3)");
//! ```
//!
//! Text operands are inspected before binding: sub-selects (`(SELECT ...`),
//! `NOESC:`-prefixed raw SQL and `{session.key}` tokens are handled by
//! [`SqlWriter::operand`].

use std::fmt;

use crate::dialect::Dialect;
use crate::sql::{SqlWriter, is_subselect};
use crate::value::{PreparedVars, Value};

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `ILIKE`
    ILike,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `BETWEEN`
    Between,
    /// `EXISTS` (the operand is a sub-select)
    Exists,
    /// `NOT EXISTS`
    NotExists,
    /// Any other operator, written as given.
    Custom(String),
}

impl Operator {
    /// SQL text of the operator.
    pub fn as_sql(&self) -> &str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::ILike => "ILIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::Between => "BETWEEN",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT EXISTS",
            Self::Custom(op) => op,
        }
    }

    /// LIKE, NOT LIKE and ILIKE.
    pub fn is_like_family(&self) -> bool {
        matches!(self, Self::Like | Self::NotLike | Self::ILike)
    }

    /// IN and NOT IN.
    pub fn is_membership(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl From<&str> for Operator {
    fn from(op: &str) -> Self {
        let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Self::Eq,
            "<>" | "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "ILIKE" => Self::ILike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "IS" => Self::Is,
            "IS NOT" => Self::IsNot,
            "BETWEEN" => Self::Between,
            "EXISTS" => Self::Exists,
            "NOT EXISTS" => Self::NotExists,
            _ => Self::Custom(normalized),
        }
    }
}

impl From<String> for Operator {
    fn from(op: String) -> Self {
        Self::from(op.as_str())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    operator: Operator,
    value: Value,
    value2: Option<Value>,
    case_insensitive: bool,
}

impl Filter {
    /// Create a filter `field operator value`.
    pub fn new(field: impl Into<String>, operator: impl Into<Operator>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            value2: None,
            case_insensitive: false,
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// `field IN (values)`
    pub fn in_list(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::new(field, Operator::In, values)
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::Is, Value::Null)
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNot, Value::Null)
    }

    /// `field BETWEEN low AND high`
    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        let mut filter = Self::new(field, Operator::Between, low);
        filter.value2 = Some(high.into());
        filter
    }

    /// `EXISTS (subselect)`
    pub fn exists(subselect: impl Into<String>) -> Self {
        Self::new(String::new(), Operator::Exists, Value::Text(subselect.into()))
    }

    /// Compare both sides uppercased; ILIKE becomes LIKE.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Column name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Operator.
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Operand.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Upper bound of a BETWEEN.
    pub fn value2(&self) -> Option<&Value> {
        self.value2.as_ref()
    }

    /// Whether case-insensitive comparison is on.
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Render into `writer`.
    pub fn write(&self, writer: &mut SqlWriter<'_>) -> String {
        match &self.operator {
            Operator::Exists | Operator::NotExists => {
                let operand = writer.operand(&self.value);
                format!("{} {}", self.operator, operand)
            }
            Operator::Is | Operator::IsNot if self.value.is_null() => {
                format!("{} {} NULL", self.field, self.operator)
            }
            Operator::Between => {
                let low = writer.operand(&self.value);
                let high = writer.operand(self.value2.as_ref().unwrap_or(&Value::Null));
                format!("{} BETWEEN {} AND {}", self.field, low, high)
            }
            // `IN ()` is not valid SQL; an empty list becomes a constant predicate.
            op if op.is_membership() && matches!(&self.value, Value::List(items) if items.is_empty()) => {
                let always = if *op == Operator::In { "1=0" } else { "1=1" };
                always.to_string()
            }
            op if op.is_membership() => {
                let operand = match &self.value {
                    Value::List(_) => writer.operand(&self.value),
                    Value::Text(text) if is_subselect(text) => writer.operand(&self.value),
                    scalar => format!("({})", writer.operand(scalar)),
                };
                format!("{} {} {}", self.field, op, operand)
            }
            op if op.is_like_family() && self.case_insensitive => {
                let operand = writer.operand(&self.value);
                let op = if *op == Operator::ILike { "LIKE" } else { op.as_sql() };
                format!("UPPER({}) {} UPPER({})", self.field, op, operand)
            }
            op => {
                let operand = writer.operand(&self.value);
                format!("{} {} {}", self.field, op, operand)
            }
        }
    }

    /// Render standalone, returning SQL and placeholders.
    pub fn dump(&self, dialect: &dyn Dialect, prepared: bool) -> (String, PreparedVars) {
        let mut writer = SqlWriter::new(dialect, prepared);
        let sql = self.write(&mut writer);
        (sql, writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operator_parsing() {
        assert_eq!(Operator::from("like"), Operator::Like);
        assert_eq!(Operator::from("not   in"), Operator::NotIn);
        assert_eq!(Operator::from("!="), Operator::Ne);
        assert_eq!(Operator::from("is not"), Operator::IsNot);
        assert_eq!(Operator::from("@>"), Operator::Custom("@>".into()));
    }

    #[test]
    fn test_literal_and_prepared_agree() {
        let cases: Vec<Value> = vec![
            Value::from("Ana"),
            Value::from(12),
            Value::from(2.5),
            Value::from(true),
            Value::from(vec![1, 2]),
        ];
        for value in cases {
            let filter = Filter::new("col", Operator::Eq, value.clone());
            let (literal, vars) = filter.dump(&PostgresDialect, false);
            assert!(vars.is_empty());
            assert!(literal.starts_with("col = "));

            let (prepared, vars) = filter.dump(&PostgresDialect, true);
            for (name, bound) in &vars {
                assert!(prepared.contains(name.as_str()));
                match &value {
                    Value::List(items) => assert!(items.contains(bound)),
                    other => assert_eq!(bound, other),
                }
            }
            assert!(!vars.is_empty());
        }
    }

    #[test]
    fn test_null_with_is() {
        let (sql, vars) = Filter::is_null("deleted_at").dump(&PostgresDialect, true);
        assert_eq!(sql, "deleted_at IS NULL");
        assert!(vars.is_empty());

        let (sql, _) = Filter::is_not_null("deleted_at").dump(&PostgresDialect, false);
        assert_eq!(sql, "deleted_at IS NOT NULL");
    }

    #[test]
    fn test_null_with_eq_is_bound() {
        let (sql, vars) = Filter::eq("x", Value::Null).dump(&PostgresDialect, true);
        assert_eq!(sql, "x = :p1");
        assert_eq!(vars[":p1"], Value::Null);
    }

    #[test]
    fn test_between() {
        let (sql, vars) = Filter::between("age", 18, 65).dump(&PostgresDialect, true);
        assert_eq!(sql, "age BETWEEN :p1 AND :p2");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_in_subselect() {
        let filter = Filter::in_list("id", "(SELECT city_id FROM address)");
        let (sql, vars) = filter.dump(&PostgresDialect, true);
        assert_eq!(sql, "id IN (SELECT city_id FROM address)");
        assert!(vars.is_empty());
    }

    #[test]
    fn test_in_scalar_is_wrapped() {
        let (sql, _) = Filter::in_list("id", 4).dump(&SqliteDialect, false);
        assert_eq!(sql, "id IN (4)");
    }

    #[test]
    fn test_empty_membership_lists() {
        let empty: Vec<i64> = Vec::new();
        let (sql, vars) = Filter::in_list("id", empty.clone()).dump(&PostgresDialect, true);
        assert_eq!(sql, "1=0");
        assert!(vars.is_empty());

        let (sql, _) = Filter::new("id", Operator::NotIn, empty).dump(&SqliteDialect, false);
        assert_eq!(sql, "1=1");
    }

    #[test]
    fn test_case_insensitive_ilike() {
        let filter = Filter::new("name", "ilike", "%ana%").case_insensitive();
        let (sql, _) = filter.dump(&SqliteDialect, false);
        assert_eq!(sql, "UPPER(name) LIKE UPPER('%ana%')");
    }

    #[test]
    fn test_exists() {
        let (sql, _) = Filter::exists("(SELECT 1 FROM t WHERE t.a = b.a)").dump(&PostgresDialect, true);
        assert_eq!(sql, "EXISTS (SELECT 1 FROM t WHERE t.a = b.a)");
    }
}
