//! CSV import and export through the active frame.
//!
//! Imports commit on the active frame as they go (see [`BatchPolicy`]), so
//! work done earlier in that frame is committed with the first batch. The
//! frame itself stays open for the caller to close.

use std::path::Path;

use ::csv::{ReaderBuilder, Trim, WriterBuilder};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::{BatchPolicy, RowSource};
use crate::error::{QueryError, QueryResult};
use crate::statement::InsertStatement;
use crate::transaction::TransactionManager;
use crate::value::{PreparedVars, Value};

/// CSV layout and import behaviour.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field separator.
    pub separator: u8,
    /// CSV header to table column. When empty every header maps to the column
    /// of the same name; otherwise unmapped fields are ignored.
    pub column_map: IndexMap<String, String>,
    /// Count rows rejected as duplicates instead of failing.
    pub skip_duplicates: bool,
    /// Import empty fields as NULL.
    pub empty_as_null: bool,
    /// Rows per commit under [`BatchPolicy::BestEffort`].
    pub commit_every: usize,
    /// Commit policy of imports.
    pub policy: BatchPolicy,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            column_map: IndexMap::new(),
            skip_duplicates: false,
            empty_as_null: true,
            commit_every: 1000,
            policy: BatchPolicy::default(),
        }
    }
}

impl CsvOptions {
    /// Use `separator` between fields.
    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Map CSV header `header` to table column `column`.
    pub fn map_column(mut self, header: impl Into<String>, column: impl Into<String>) -> Self {
        self.column_map.insert(header.into(), column.into());
        self
    }

    /// Skip rows the database rejects as duplicates.
    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }

    /// Keep empty fields as empty strings.
    pub fn keep_empty_strings(mut self) -> Self {
        self.empty_as_null = false;
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
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows inserted.
    pub inserted: u64,
    /// Rows skipped as duplicates.
    pub skipped: u64,
    /// Commits issued on the active frame.
    pub commits: u64,
}

const ROW_SAVEPOINT: &str = "rowkeeper_csv_row";

/// Insert every record of the CSV file at `path` into `table`.
///
/// Under [`BatchPolicy::BestEffort`] the frame commits every
/// `commit_every` rows and a failure rolls back only the rows since the
/// last commit. Under [`BatchPolicy::AllOrNothing`] it commits once at the
/// end and a failure rolls back the whole import. With `skip_duplicates`
/// each row runs under a savepoint, so a rejected row does not abort the
/// surrounding transaction on engines such as PostgreSQL.
pub fn import_csv(
    tx: &TransactionManager,
    path: impl AsRef<Path>,
    table: &str,
    options: &CsvOptions,
) -> QueryResult<ImportReport> {
    import_csv_with(tx, path, table, options, |_, value| value)
}

/// Like [`import_csv`], passing each `(column, value)` through `transform`
/// before it is inserted.
pub fn import_csv_with<F>(
    tx: &TransactionManager,
    path: impl AsRef<Path>,
    table: &str,
    options: &CsvOptions,
    mut transform: F,
) -> QueryResult<ImportReport>
where
    F: FnMut(&str, Value) -> Value,
{
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(options.separator)
        .trim(Trim::All)
        .from_path(path)?;

    let columns: Vec<Option<String>> = reader
        .headers()?
        .iter()
        .map(|header| {
            if options.column_map.is_empty() {
                Some(header.to_string())
            } else {
                options.column_map.get(header).cloned()
            }
        })
        .collect();

    let mut report = ImportReport::default();
    let mut committed = 0u64;
    let mut pending = 0usize;
    for record in reader.records() {
        let outcome = record.map_err(QueryError::from).and_then(|record| {
            let line = record.position().map_or(0, |p| p.line());
            let mut insert = InsertStatement::new(table);
            for (field, column) in record.iter().zip(&columns) {
                let Some(column) = column else { continue };
                let value = if field.is_empty() && options.empty_as_null {
                    Value::Null
                } else {
                    Value::from(field)
                };
                insert.set_row_data(column.clone(), transform(column, value));
            }
            insert_row(tx, &insert, options, table, line, &mut report)
                .map_err(|e| e.with_context(format!("import of {} line {}", path.display(), line)))
        });

        if let Err(e) = outcome {
            if let Err(rollback) = tx.rollback_retaining() {
                warn!(error = %rollback, "Rollback after failed import also failed");
            }
            warn!(
                file = %path.display(),
                committed,
                "CSV import failed; rows since the last commit were rolled back"
            );
            return Err(e);
        }

        pending += 1;
        if options.policy == BatchPolicy::BestEffort && pending >= options.commit_every {
            tx.commit_retaining()?;
            report.commits += 1;
            committed = report.inserted;
            pending = 0;
        }
    }
    if pending > 0 || report.commits == 0 {
        tx.commit_retaining()?;
        report.commits += 1;
    }

    info!(
        file = %path.display(),
        table = %table,
        inserted = report.inserted,
        skipped = report.skipped,
        "CSV imported"
    );
    Ok(report)
}

fn insert_row(
    tx: &TransactionManager,
    insert: &InsertStatement,
    options: &CsvOptions,
    table: &str,
    line: u64,
    report: &mut ImportReport,
) -> QueryResult<()> {
    if !options.skip_duplicates {
        tx.execute(insert)?;
        report.inserted += 1;
        return Ok(());
    }

    tx.savepoint(ROW_SAVEPOINT)?;
    match tx.execute(insert) {
        Ok(_) => report.inserted += 1,
        Err(e) if e.is_duplicate() => {
            tx.rollback_to_savepoint(ROW_SAVEPOINT)?;
            debug!(line, table = %table, "Duplicate row skipped");
            report.skipped += 1;
        }
        Err(e) => return Err(e),
    }
    tx.release_savepoint(ROW_SAVEPOINT)
}

/// Write the rows of `source` to a CSV file at `path`, returning the number
/// of data rows written.
///
/// `column_map` maps table columns to CSV headers; when set, only mapped
/// columns are exported.
pub fn export_csv(
    tx: &TransactionManager,
    source: &RowSource,
    path: impl AsRef<Path>,
    options: &CsvOptions,
) -> QueryResult<u64> {
    export_csv_with(tx, source, path, options, |_, value| value)
}

/// Like [`export_csv`], passing each `(column, value)` through `transform`
/// before it is written.
pub fn export_csv_with<F>(
    tx: &TransactionManager,
    source: &RowSource,
    path: impl AsRef<Path>,
    options: &CsvOptions,
    mut transform: F,
) -> QueryResult<u64>
where
    F: FnMut(&str, Value) -> Value,
{
    let path = path.as_ref();
    let rows = tx.query_sql(&source.sql(), &PreparedVars::new())?;

    let columns: Vec<(String, String)> = if options.column_map.is_empty() {
        rows.first()
            .map(|row| row.keys().map(|k| (k.clone(), k.clone())).collect())
            .unwrap_or_default()
    } else {
        options
            .column_map
            .iter()
            .map(|(column, header)| (column.clone(), header.clone()))
            .collect()
    };

    let mut writer = WriterBuilder::new()
        .delimiter(options.separator)
        .from_path(path)?;
    if !columns.is_empty() {
        writer.write_record(columns.iter().map(|(_, header)| header.as_str()))?;
    }
    for row in &rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|(column, _)| {
                let value = row.get(column).cloned().unwrap_or_default();
                transform(column, value).to_text().into_owned()
            })
            .collect();
        writer.write_record(&fields)?;
    }
    writer.flush()?;

    info!(file = %path.display(), rows = rows.len(), "CSV exported");
    Ok(rows.len() as u64)
}
