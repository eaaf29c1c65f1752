//! SQL dialect strategies.
//!
//! A connection picks its [`Dialect`] once, when it is opened. Statement
//! builders call into it for the parts of the grammar that differ between
//! engines: pagination, boolean literals, string quoting, `RETURNING` support,
//! multi-row insert batching and transaction keywords.
//!
//! Four pagination strategies exist:
//!
//! | Dialect | Pagination |
//! |---------|------------|
//! | PostgreSQL, MySQL, SQLite, ANSI/ODBC | trailing `LIMIT n OFFSET m` |
//! | SQL Server | `ROW_NUMBER() OVER (ORDER BY ...)` wrapper |
//! | Oracle | nested `rownum` wrapper |
//! | Firebird/Interbase | `FIRST n SKIP m` after `SELECT` |
//!
//! ```rust
//! use rowkeeper_query::dialect::{Dialect, SelectParts, SqlServerDialect};
//!
//! let parts = SelectParts::new("*", "customer").order("name").limit(10).offset(20);
//! let sql = SqlServerDialect.select(&parts);
//! assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY name)"));
//! assert!(sql.contains("BETWEEN 21 AND 30"));
//! ```

use std::fmt;

/// Helper column added by the SQL Server and Oracle pagination wrappers.
pub const ROW_NUMBER_COLUMN: &str = "__ROWNUMBER__";

/// The clauses of a SELECT, already rendered, ready for a dialect to assemble.
#[derive(Debug, Clone, Default)]
pub struct SelectParts<'a> {
    /// Column list (`*` when empty).
    pub columns: &'a str,
    /// Table or view name.
    pub entity: &'a str,
    /// Rendered criteria without the `WHERE` keyword.
    pub where_clause: Option<&'a str>,
    /// Rendered GROUP BY expression.
    pub group: Option<&'a str>,
    /// Rendered ORDER BY expression including direction.
    pub order: Option<&'a str>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
}

impl<'a> SelectParts<'a> {
    /// Start a SELECT of `columns` from `entity`.
    pub fn new(columns: &'a str, entity: &'a str) -> Self {
        Self {
            columns,
            entity,
            ..Default::default()
        }
    }

    /// Set the WHERE expression.
    pub fn where_clause(mut self, clause: &'a str) -> Self {
        self.where_clause = Some(clause);
        self
    }

    /// Set the GROUP BY expression.
    pub fn group(mut self, group: &'a str) -> Self {
        self.group = Some(group);
        self
    }

    /// Set the ORDER BY expression.
    pub fn order(mut self, order: &'a str) -> Self {
        self.order = Some(order);
        self
    }

    /// Set the row limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn is_paginated(&self) -> bool {
        self.limit.is_some() || self.offset.is_some_and(|o| o > 0)
    }

    /// `SELECT cols FROM entity [WHERE] [GROUP BY]`.
    fn base(&self) -> String {
        self.base_with_columns(self.columns)
    }

    fn base_with_columns(&self, columns: &str) -> String {
        let columns = if columns.is_empty() { "*" } else { columns };
        let mut sql = format!("SELECT {} FROM {}", columns, self.entity);
        if let Some(clause) = self.where_clause.filter(|c| !c.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        if let Some(group) = self.group.filter(|g| !g.is_empty()) {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }
        sql
    }

    fn push_order(&self, sql: &mut String) {
        if let Some(order) = self.order.filter(|o| !o.is_empty()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
    }
}

/// Dialect-specific SQL rendering.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Dialect name used in logs.
    fn name(&self) -> &'static str;

    /// Assemble a complete SELECT, applying this dialect's pagination.
    fn select(&self, parts: &SelectParts<'_>) -> String {
        standard_select(parts, None)
    }

    /// Literal for a boolean value.
    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    /// Quote a string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Whether INSERT can return the generated key with `RETURNING`.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Rows per multi-row INSERT for a requested batch size.
    fn max_insert_batch(&self, requested: usize) -> usize {
        requested.max(1)
    }

    /// Statement opening a native transaction.
    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    /// Statement committing a native transaction.
    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    /// Statement rolling back a native transaction.
    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Statement setting savepoint `name` inside the open transaction.
    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT {}", name)
    }

    /// Statement undoing everything after savepoint `name`.
    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", name)
    }

    /// Statement discarding savepoint `name`, when the engine has one.
    fn release_savepoint_sql(&self, name: &str) -> Option<String> {
        Some(format!("RELEASE SAVEPOINT {}", name))
    }

    /// Catalog query returning one row when `table` exists.
    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT 1 FROM information_schema.tables WHERE table_name = {}",
            self.quote_string(table)
        )
    }
}

/// Trailing `LIMIT`/`OFFSET` pagination.
///
/// `unbounded` is the LIMIT value written when only an offset is requested, for
/// engines that refuse OFFSET without LIMIT.
pub fn standard_select(parts: &SelectParts<'_>, unbounded: Option<&str>) -> String {
    let mut sql = parts.base();
    parts.push_order(&mut sql);

    match (parts.limit, parts.offset) {
        (Some(limit), offset) => {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = offset.filter(|o| *o > 0) {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
        (None, Some(offset)) if offset > 0 => {
            if let Some(unbounded) = unbounded {
                sql.push_str(&format!(" LIMIT {}", unbounded));
            }
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        _ => {}
    }
    sql
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn select(&self, parts: &SelectParts<'_>) -> String {
        standard_select(parts, Some("18446744073709551615"))
    }

    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = {}",
            self.quote_string(table)
        )
    }
}

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn select(&self, parts: &SelectParts<'_>) -> String {
        standard_select(parts, Some("-1"))
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = {}",
            self.quote_string(table)
        )
    }
}

/// Generic ANSI SQL, used for ODBC sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }
}

/// SQL Server family (mssql, dblib, sqlsrv).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn select(&self, parts: &SelectParts<'_>) -> String {
        if !parts.is_paginated() {
            let mut sql = parts.base();
            parts.push_order(&mut sql);
            return sql;
        }

        // ROW_NUMBER() needs an ORDER BY even when the caller gave none
        let order = parts.order.filter(|o| !o.is_empty()).unwrap_or("(SELECT 0)");
        let columns = if parts.columns.is_empty() { "*" } else { parts.columns };
        let numbered = format!(
            "ROW_NUMBER() OVER (ORDER BY {}) AS {}, {}",
            order, ROW_NUMBER_COLUMN, columns
        );
        let inner = parts.base_with_columns(&numbered);

        let offset = parts.offset.unwrap_or(0);
        let range = match parts.limit {
            Some(limit) => format!(
                "{} BETWEEN {} AND {}",
                ROW_NUMBER_COLUMN,
                offset.saturating_add(1),
                offset.saturating_add(limit)
            ),
            None => format!("{} > {}", ROW_NUMBER_COLUMN, offset),
        };

        format!(
            "SELECT * FROM ({}) AS TAB WHERE {} ORDER BY {}",
            inner, range, ROW_NUMBER_COLUMN
        )
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {}", name)
    }

    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {}", name)
    }

    fn release_savepoint_sql(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn select(&self, parts: &SelectParts<'_>) -> String {
        let mut base = parts.base();
        parts.push_order(&mut base);
        if !parts.is_paginated() {
            return base;
        }

        let offset = parts.offset.unwrap_or(0);
        let mut inner = format!(
            "SELECT rownum \"{}\", A.* FROM ({}) A",
            ROW_NUMBER_COLUMN, base
        );
        if let Some(limit) = parts.limit {
            inner.push_str(&format!(" WHERE rownum <= {}", offset.saturating_add(limit)));
        }
        format!(
            "SELECT * FROM ({}) WHERE \"{}\" > {}",
            inner, ROW_NUMBER_COLUMN, offset
        )
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    // multi-row VALUES lists are not valid Oracle syntax
    fn max_insert_batch(&self, _requested: usize) -> usize {
        1
    }

    fn release_savepoint_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn begin_sql(&self) -> &'static str {
        "SET TRANSACTION READ WRITE"
    }

    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT 1 FROM user_tables WHERE table_name = UPPER({})",
            self.quote_string(table)
        )
    }
}

/// Firebird and Interbase.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirebirdDialect;

impl Dialect for FirebirdDialect {
    fn name(&self) -> &'static str {
        "firebird"
    }

    fn select(&self, parts: &SelectParts<'_>) -> String {
        let mut head = String::from("SELECT");
        if let Some(limit) = parts.limit {
            head.push_str(&format!(" FIRST {}", limit));
        }
        if let Some(offset) = parts.offset.filter(|o| *o > 0) {
            head.push_str(&format!(" SKIP {}", offset));
        }

        let mut sql = parts.base();
        sql.replace_range(0.."SELECT".len(), &head);
        parts.push_order(&mut sql);
        sql
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn begin_sql(&self) -> &'static str {
        "SET TRANSACTION"
    }

    fn table_exists_sql(&self, table: &str) -> String {
        format!(
            "SELECT 1 FROM rdb$relations WHERE rdb$relation_name = UPPER({})",
            self.quote_string(table)
        )
    }
}
