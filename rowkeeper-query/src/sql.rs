//! SQL rendering state shared by filters, criteria and statements.

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::session::{SessionSource, has_session_token, resolve_session_tokens};
use crate::value::{PreparedVars, Value};

/// Prefix marking a value that must be embedded without escaping.
pub const NO_ESCAPE_PREFIX: &str = "NOESC:";

/// Accumulates placeholders while one statement is rendered.
///
/// In prepared mode every operand becomes a `:pN` placeholder recorded in
/// [`vars`](Self::vars); otherwise operands are written as literals, quoted by
/// the live connection when one is attached. A single writer is used for the
/// whole statement, so the two modes never mix.
pub struct SqlWriter<'a> {
    dialect: &'a dyn Dialect,
    connection: Option<&'a dyn Connection>,
    session: Option<&'a dyn SessionSource>,
    prepared: bool,
    vars: PreparedVars,
    counter: usize,
}

impl<'a> SqlWriter<'a> {
    /// Create a writer for `dialect`.
    pub fn new(dialect: &'a dyn Dialect, prepared: bool) -> Self {
        Self {
            dialect,
            connection: None,
            session: None,
            prepared,
            vars: PreparedVars::new(),
            counter: 0,
        }
    }

    /// Create a writer for a live connection, using its dialect and quoting.
    pub fn for_connection(connection: &'a dyn Connection, prepared: bool) -> Self {
        Self {
            dialect: connection.dialect(),
            connection: Some(connection),
            session: None,
            prepared,
            vars: PreparedVars::new(),
            counter: 0,
        }
    }

    /// Attach a session used to resolve `{session.key}` tokens.
    pub fn with_session(mut self, session: Option<&'a dyn SessionSource>) -> Self {
        self.session = session;
        self
    }

    /// The dialect being rendered.
    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    /// Whether operands become placeholders.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Placeholders recorded so far.
    pub fn vars(&self) -> &PreparedVars {
        &self.vars
    }

    /// Consume the writer, returning the recorded placeholders.
    pub fn finish(self) -> PreparedVars {
        self.vars
    }

    /// Quote a string literal.
    pub fn quote(&self, text: &str) -> String {
        match self.connection {
            Some(conn) => conn.quote(text),
            None => self.dialect.quote_string(text),
        }
    }

    /// Render a value as a literal regardless of mode.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => self.dialect.bool_literal(*b).to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => self.quote(s),
            Value::List(items) => format!(
                "({})",
                items
                    .iter()
                    .map(|v| self.literal(v))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Render a value in the writer's mode: a placeholder or a literal.
    ///
    /// Lists render as `(a, b)` with one placeholder per element.
    pub fn bind(&mut self, value: Value) -> String {
        if !self.prepared {
            return self.literal(&value);
        }
        match value {
            Value::List(items) => {
                let parts: Vec<String> = items.into_iter().map(|v| self.bind(v)).collect();
                format!("({})", parts.join(", "))
            }
            other => {
                self.counter += 1;
                let name = format!(":p{}", self.counter);
                self.vars.insert(name.clone(), other);
                name
            }
        }
    }

    /// Render a filter operand.
    ///
    /// Text operands get special handling before binding: a leading `(SELECT`
    /// embeds a sub-select verbatim (comment markers stripped), the `NOESC:`
    /// prefix embeds the remainder verbatim, and `{session.key}` tokens are
    /// substituted from the attached session.
    pub fn operand(&mut self, value: &Value) -> String {
        match value {
            Value::Text(text) => {
                if is_subselect(text) {
                    return strip_comment_markers(text);
                }
                if let Some(raw) = text.strip_prefix(NO_ESCAPE_PREFIX) {
                    return raw.to_string();
                }
                if has_session_token(text) {
                    let resolved = resolve_session_tokens(text, self.session);
                    return self.bind(resolved);
                }
                self.bind(value.clone())
            }
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.operand(v)).collect();
                format!("({})", parts.join(", "))
            }
            other => self.bind(other.clone()),
        }
    }
}

/// Check whether a text operand is a sub-select.
pub fn is_subselect(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed
        .get(..7)
        .is_some_and(|head| head.eq_ignore_ascii_case("(SELECT"))
}

/// Remove `#`, `--` and `/*` sequences from embedded SQL.
pub fn strip_comment_markers(text: &str) -> String {
    text.replace('#', "").replace("--", "").replace("/*", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::session::MemorySession;

    #[test]
    fn test_literal_mode() {
        let mut w = SqlWriter::new(&PostgresDialect, false);
        assert_eq!(w.bind(Value::from("O'Neil")), "'O''Neil'");
        assert_eq!(w.bind(Value::from(true)), "TRUE");
        assert_eq!(w.bind(Value::Null), "NULL");
        assert_eq!(w.bind(Value::from(vec![1, 2, 3])), "(1, 2, 3)");
        assert!(w.finish().is_empty());
    }

    #[test]
    fn test_prepared_mode() {
        let mut w = SqlWriter::new(&PostgresDialect, true);
        assert_eq!(w.bind(Value::from(5)), ":p1");
        assert_eq!(w.bind(Value::from(vec!["a", "b"])), "(:p2, :p3)");
        let vars = w.finish();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars[":p3"], Value::from("b"));
    }

    #[test]
    fn test_subselect_is_verbatim() {
        let mut w = SqlWriter::new(&PostgresDialect, true);
        let out = w.operand(&Value::from("(select id from city -- x\n)"));
        assert_eq!(out, "(select id from city  x\n)");
        assert!(w.vars().is_empty());
    }

    #[test]
    fn test_no_escape_prefix() {
        let mut w = SqlWriter::new(&MySqlDialect, true);
        assert_eq!(w.operand(&Value::from("NOESC:now()")), "now()");
    }

    #[test]
    fn test_session_operand() {
        let session = MemorySession::new().with("userid", 9);
        let mut w = SqlWriter::new(&PostgresDialect, false).with_session(Some(&session));
        assert_eq!(w.operand(&Value::from("{session.userid}")), "9");
    }
}
