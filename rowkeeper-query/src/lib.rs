//! # rowkeeper-query
//!
//! Criteria engine, statement builders, connection handling and Active Record
//! core for rowkeeper.
//!
//! This crate provides:
//! - Filters and nested criteria rendered to SQL for eight driver families
//! - SELECT/INSERT/UPDATE/DELETE builders with per-dialect pagination
//! - A connection manager reading named database configurations
//! - A nested transaction stack with statement logging
//! - Active Record entities with soft deletes, global scopes, audit stamps,
//!   whitelists, object caching and relations
//! - Repositories with aggregates and table-level task helpers
//!
//! Drivers live in their own crates (`rowkeeper-sqlite`, `rowkeeper-postgres`)
//! and plug in through [`Connector`](connection::Connector).
//!
//! ## Filters
//!
//! ```rust
//! use rowkeeper_query::{Criteria, Filter};
//! use rowkeeper_query::dialect::SqliteDialect;
//!
//! let mut criteria = Criteria::new();
//! criteria
//!     .add(Filter::eq("state", "RS"))
//!     .add(Filter::new("population", ">", 10_000))
//!     .set_order("name");
//!
//! let (sql, vars) = criteria.dump(&SqliteDialect, false);
//! assert_eq!(sql, "(state = 'RS' AND population > 10000)");
//! assert!(vars.is_empty());
//! ```
//!
//! ## Statements
//!
//! ```rust
//! use rowkeeper_query::statement::{SelectStatement, Statement};
//! use rowkeeper_query::dialect::SqliteDialect;
//! use rowkeeper_query::Criteria;
//!
//! let mut select = SelectStatement::new("city");
//! select.set_columns(["id", "name"]);
//! select.set_criteria(Criteria::from_pairs([("state", "RS")]));
//!
//! let rendered = select.render(&SqliteDialect, false).unwrap();
//! assert_eq!(rendered.sql, "SELECT id, name FROM city WHERE (state = 'RS')");
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use rowkeeper_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::not_found("Customer");
//! assert_eq!(err.code, ErrorCode::RecordNotFound);
//! assert!(err.is_not_found());
//! ```

pub mod cache;
pub mod connection;
pub mod criteria;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod logging;
pub mod record;
pub mod repository;
pub mod session;
pub mod sql;
pub mod statement;
pub mod tasks;
pub mod transaction;
pub mod types;
pub mod value;

#[cfg(test)]
mod mock;

pub use cache::{MemoryCache, NoopCache, ObjectCache};
pub use connection::{Connection, ConnectionManager, Connector, DatabaseConfig, Driver};
pub use criteria::{Criteria, CriteriaId, Expression};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult, Suggestion};
pub use filter::{Filter, Operator};
pub use record::{ActiveRecord, EntitySchema, IdPolicy, Record, Relations};
pub use repository::{Aggregate, Aggregated, Repository, TrashedMode};
pub use session::{MemorySession, SessionSource};
pub use statement::Statement;
pub use transaction::{TransactionLogger, TransactionManager};
pub use types::{JoinOp, SortOrder};
pub use value::{PreparedVars, Row, Value};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::connection::{ConnectionManager, DatabaseConfig, DirectoryConfigSource, Driver};
    pub use crate::criteria::Criteria;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::filter::Filter;
    pub use crate::record::{ActiveRecord, EntitySchema, IdPolicy, Operation, Record, Relations};
    pub use crate::repository::{Repository, TrashedMode};
    pub use crate::transaction::TransactionManager;
    pub use crate::types::SortOrder;
    pub use crate::value::{Row, Value};
}
