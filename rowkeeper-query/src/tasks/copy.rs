//! Row copy between two logical databases.

use indexmap::IndexMap;
use tracing::{info, warn};

use super::RowSource;
use crate::connection::{Connection, ConnectionManager};
use crate::error::QueryResult;
use crate::statement::{DEFAULT_BATCH_SIZE, MultiInsertStatement};
use crate::value::{PreparedVars, Row};

/// When copied rows are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Commit every `commit_every` rows; a failure rolls back only the
    /// uncommitted part.
    #[default]
    BestEffort,
    /// Commit once at the end; a failure rolls back everything.
    AllOrNothing,
}

/// Tuning of [`copy_data`].
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Rows per multi-row INSERT.
    pub batch_size: usize,
    /// Rows per commit under [`BatchPolicy::BestEffort`].
    pub commit_every: usize,
    /// Commit policy.
    pub policy: BatchPolicy,
    /// Source column to target column; empty copies every column as is.
    pub column_map: IndexMap<String, String>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            commit_every: 1000,
            policy: BatchPolicy::default(),
            column_map: IndexMap::new(),
        }
    }
}

impl CopyOptions {
    /// Rows per INSERT.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Rows per commit.
    pub fn commit_every(mut self, rows: usize) -> Self {
        self.commit_every = rows.max(1);
        self
    }

    /// Commit policy.
    pub fn policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Copy `source` into `target`; unmapped columns are dropped once any
    /// mapping is declared.
    pub fn map_column(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.column_map.insert(source.into(), target.into());
        self
    }
}

/// Outcome of a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Rows fetched from the source.
    pub rows_read: u64,
    /// Rows inserted into the target.
    pub rows_written: u64,
    /// Commits issued on the target.
    pub commits: u64,
}

/// Copy the rows of `source` in database `source_db` into `target_table` of
/// `target_db`.
///
/// Both connections come from `connections` and run outside any
/// [`TransactionManager`](crate::transaction::TransactionManager) stack; the
/// target gets its own transactions according to `options.policy`.
pub fn copy_data(
    connections: &ConnectionManager,
    source_db: &str,
    source: &RowSource,
    target_db: &str,
    target_table: &str,
    options: &CopyOptions,
) -> QueryResult<CopyReport> {
    let source_conn = connections.open(source_db)?;
    let target_config = connections.config(target_db)?;
    let target = connections.open_with(&target_config)?;

    let rows: Vec<Row> = source_conn
        .query(&source.sql(), &PreparedVars::new())?
        .into_iter()
        .map(|row| map_columns(row, &options.column_map))
        .collect();

    let mut report = CopyReport {
        rows_read: rows.len() as u64,
        ..Default::default()
    };
    let chunk_size = match options.policy {
        BatchPolicy::BestEffort => options.commit_every.max(1),
        BatchPolicy::AllOrNothing => rows.len().max(1),
    };
    let chunks: Vec<&[Row]> = rows.chunks(chunk_size).collect();

    target.begin()?;
    for (index, chunk) in chunks.iter().enumerate() {
        if let Err(e) = write_chunk(&*target, target_table, chunk, options.batch_size, target_config.prepared) {
            if let Err(rollback) = target.rollback() {
                warn!(error = %rollback, "Rollback after failed copy also failed");
            }
            return Err(e.with_context(format!(
                "copy into {} ({} rows committed before the failure)",
                target_table, report.rows_written
            )));
        }
        report.rows_written += chunk.len() as u64;
        if index + 1 < chunks.len() {
            target.commit()?;
            report.commits += 1;
            target.begin()?;
        }
    }
    target.commit()?;
    report.commits += 1;

    info!(
        source = %source_db,
        target = %target_db,
        table = %target_table,
        rows = report.rows_written,
        commits = report.commits,
        "Copy finished"
    );
    Ok(report)
}

fn map_columns(row: Row, map: &IndexMap<String, String>) -> Row {
    if map.is_empty() {
        return row;
    }
    let mut row = row;
    map.iter()
        .filter_map(|(from, to)| row.shift_remove(from).map(|v| (to.clone(), v)))
        .collect()
}

fn write_chunk(
    target: &dyn Connection,
    table: &str,
    rows: &[Row],
    batch_size: usize,
    prepared: bool,
) -> QueryResult<()> {
    let mut insert = MultiInsertStatement::new(table);
    insert.set_batch_size(batch_size);
    for row in rows {
        insert.add_row(row);
    }
    for batch in insert.get_instructions(target, prepared) {
        target.execute(&batch.sql, &batch.vars)?;
    }
    Ok(())
}
