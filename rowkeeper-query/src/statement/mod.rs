//! SQL statement builders.
//!
//! Every builder renders through a [`SqlWriter`], so one statement is either
//! entirely literal or entirely placeholder-based.
//!
//! ```rust
//! use rowkeeper_query::criteria::Criteria;
//! use rowkeeper_query::dialect::OracleDialect;
//! use rowkeeper_query::statement::{SelectStatement, Statement};
//!
//! let mut criteria = Criteria::new();
//! criteria.where_("active", "=", true).set_limit(10).set_offset(20);
//!
//! let mut select = SelectStatement::new("customer");
//! select.add_column("*").set_criteria(criteria);
//!
//! let rendered = select.render(&OracleDialect, false).unwrap();
//! assert!(rendered.sql.contains("rownum <= 30"));
//! ```

mod delete;
mod insert;
mod multi_insert;
mod select;
mod update;

pub use delete::DeleteStatement;
pub use insert::InsertStatement;
pub use multi_insert::{DEFAULT_BATCH_SIZE, MultiInsertStatement};
pub use select::SelectStatement;
pub use update::UpdateStatement;

use crate::connection::Connection;
use crate::dialect::Dialect;
use crate::error::QueryResult;
use crate::session::SessionSource;
use crate::sql::SqlWriter;
use crate::value::PreparedVars;

/// Final SQL text and the values of its placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    /// SQL text.
    pub sql: String,
    /// Placeholder values; empty for literal rendering.
    pub vars: PreparedVars,
}

/// A renderable SQL statement.
pub trait Statement {
    /// Target table.
    fn entity(&self) -> &str;

    /// Render into `writer`.
    fn write(&self, writer: &mut SqlWriter<'_>) -> QueryResult<String>;

    /// Render for a dialect without a connection.
    fn render(&self, dialect: &dyn Dialect, prepared: bool) -> QueryResult<Rendered> {
        let mut writer = SqlWriter::new(dialect, prepared);
        let sql = self.write(&mut writer)?;
        Ok(Rendered {
            sql,
            vars: writer.finish(),
        })
    }

    /// Render for a live connection, quoting through it and resolving
    /// session tokens from `session`.
    fn get_instruction(
        &self,
        connection: &dyn Connection,
        prepared: bool,
        session: Option<&dyn SessionSource>,
    ) -> QueryResult<Rendered> {
        let mut writer = SqlWriter::for_connection(connection, prepared).with_session(session);
        let sql = self.write(&mut writer)?;
        Ok(Rendered {
            sql,
            vars: writer.finish(),
        })
    }
}

/// Append ` WHERE <criteria>` when the criteria renders to anything.
pub(crate) fn push_where(
    sql: &mut String,
    criteria: Option<&crate::criteria::Criteria>,
    writer: &mut SqlWriter<'_>,
) {
    if let Some(criteria) = criteria {
        let clause = criteria.write(writer);
        if !clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
    }
}
