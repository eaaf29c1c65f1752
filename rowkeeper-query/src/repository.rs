//! Collection queries over one entity type.
//!
//! A [`Repository`] accumulates a [`Criteria`] through fluent builder calls
//! and runs it with a terminal operation against the open transaction:
//!
//! ```rust,ignore
//! let active = Repository::<Customer>::new()
//!     .where_("city_id", "=", 4)
//!     .or_where("vip", "=", true)
//!     .order_by("name", SortOrder::Asc)
//!     .take(20)
//!     .load(&tx)?;
//!
//! let total = Repository::<Invoice>::new()
//!     .where_("status", "=", "open")
//!     .sum_by(&tx, "amount", Some("total"))?;
//! ```
//!
//! Before the first terminal call on a criteria, the entity's global scopes
//! and the soft-delete filter are AND-ed to it. This happens once per
//! criteria instance: calling several terminals on the same repository does
//! not stack the filters.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use tracing::debug;

use crate::criteria::{Criteria, CriteriaId};
use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, Operator};
use crate::record::scope::{Operation, global_scopes};
use crate::record::{ActiveRecord, Actor, Record, cache_forget, ensure_allowed, timestamp};
use crate::statement::{DeleteStatement, SelectStatement, UpdateStatement};
use crate::transaction::TransactionManager;
use crate::types::SortOrder;
use crate::value::{Row, Value};

/// Which rows a soft-deleting entity's queries see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedMode {
    /// Live rows only.
    #[default]
    Without,
    /// Live and soft-deleted rows.
    With,
    /// Soft-deleted rows only.
    Only,
}

/// SQL aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// `count(col)`
    Count,
    /// `count(distinct col)`
    CountDistinct,
    /// `sum(col)`
    Sum,
    /// `avg(col)`
    Avg,
    /// `min(col)`
    Min,
    /// `max(col)`
    Max,
}

impl Aggregate {
    /// Lowercase function name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count | Self::CountDistinct => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Call expression over `column`.
    pub fn apply(&self, column: &str) -> String {
        match self {
            Self::CountDistinct => format!("count(distinct {})", column),
            other => format!("{}({})", other.name(), column),
        }
    }
}

/// Result of an aggregate query.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    /// One aggregate without grouping.
    Value(Value),
    /// Several aggregates without grouping, keyed by alias.
    Row(Row),
    /// One row per group: group columns followed by the aggregates.
    Rows(Vec<Row>),
}

impl Aggregated {
    /// The single value, if this is [`Aggregated::Value`].
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Flatten into rows.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Value(v) => vec![std::iter::once(("value".to_string(), v)).collect()],
            Self::Row(row) => vec![row],
            Self::Rows(rows) => rows,
        }
    }
}

struct AggregateColumn {
    function: Aggregate,
    column: String,
    alias: String,
}

/// Fluent query over entity `E`.
pub struct Repository<E: ActiveRecord> {
    criteria: Criteria,
    columns: Vec<String>,
    assignments: IndexMap<String, Value>,
    trashed: TrashedMode,
    skipped_scopes: HashSet<String>,
    skip_all_scopes: bool,
    load_hook: bool,
    scoped: HashSet<CriteriaId>,
    aggregates: Vec<AggregateColumn>,
    entity: PhantomData<fn() -> E>,
}

impl<E: ActiveRecord> Default for Repository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ActiveRecord> Repository<E> {
    /// Query over every row of `E`.
    pub fn new() -> Self {
        Self {
            criteria: Criteria::new(),
            columns: Vec::new(),
            assignments: IndexMap::new(),
            trashed: TrashedMode::default(),
            skipped_scopes: HashSet::new(),
            skip_all_scopes: false,
            load_hook: true,
            scoped: HashSet::new(),
            aggregates: Vec::new(),
            entity: PhantomData,
        }
    }

    // ============== Builders ==============

    /// AND `field op value`.
    pub fn where_(mut self, field: impl Into<String>, operator: impl Into<Operator>, value: impl Into<Value>) -> Self {
        self.criteria.where_(field, operator, value);
        self
    }

    /// OR `field op value`.
    pub fn or_where(mut self, field: impl Into<String>, operator: impl Into<Operator>, value: impl Into<Value>) -> Self {
        self.criteria.or_where(field, operator, value);
        self
    }

    /// AND a prebuilt filter.
    pub fn where_filter(mut self, filter: Filter) -> Self {
        self.criteria.add(filter);
        self
    }

    /// OR a prebuilt filter.
    pub fn or_where_filter(mut self, filter: Filter) -> Self {
        self.criteria.or(filter);
        self
    }

    /// Replace the criteria.
    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// ORDER BY `column` in `direction`.
    pub fn order_by(mut self, column: impl Into<String>, direction: SortOrder) -> Self {
        self.criteria.set_order(column).set_direction(direction);
        self
    }

    /// GROUP BY `columns` (comma separated).
    pub fn group_by(mut self, columns: impl Into<String>) -> Self {
        self.criteria.set_group(columns);
        self
    }

    /// Limit the number of rows.
    pub fn take(mut self, limit: u64) -> Self {
        self.criteria.set_limit(limit);
        self
    }

    /// Skip leading rows.
    pub fn skip(mut self, offset: u64) -> Self {
        self.criteria.set_offset(offset);
        self
    }

    /// Columns fetched by [`load`](Self::load); all columns by default.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Stage an assignment for [`update`](Self::update).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.insert(column.into(), value.into());
        self
    }

    /// Include soft-deleted rows.
    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedMode::With;
        self
    }

    /// Only soft-deleted rows.
    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedMode::Only;
        self
    }

    /// Skip the global scope called `name`.
    pub fn without_global_scope(mut self, name: impl Into<String>) -> Self {
        self.skipped_scopes.insert(name.into());
        self
    }

    /// Skip every global scope.
    pub fn without_global_scopes(mut self) -> Self {
        self.skip_all_scopes = true;
        self
    }

    /// Do not run [`ActiveRecord::on_load`] on loaded entities.
    pub fn without_load_hook(mut self) -> Self {
        self.load_hook = false;
        self
    }

    /// The criteria built so far.
    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Criteria with global scopes and the trashed filter applied.
    fn scoped(&mut self) -> &Criteria {
        if self.scoped.insert(self.criteria.id()) {
            let mut extra: Vec<Filter> = Vec::new();
            if !self.skip_all_scopes {
                extra.extend(
                    global_scopes::<E>()
                        .into_iter()
                        .filter(|s| !self.skipped_scopes.contains(&s.name))
                        .map(|s| s.filter),
                );
            }
            if let Some(column) = E::SCHEMA.deleted_at {
                match self.trashed {
                    TrashedMode::Without => extra.push(Filter::is_null(column)),
                    TrashedMode::Only => extra.push(Filter::is_not_null(column)),
                    TrashedMode::With => {}
                }
            }
            if !extra.is_empty() {
                self.criteria.nest();
                for filter in extra {
                    self.criteria.add(filter);
                }
            }
        }
        &self.criteria
    }

    /// Scoped criteria without order, group or paging.
    fn scoped_filter(&mut self) -> Criteria {
        let mut criteria = self.scoped().clone();
        criteria.reset_properties();
        criteria
    }

    fn hydrate(&self, tx: &TransactionManager, rows: Vec<Row>) -> QueryResult<Vec<E>> {
        rows.into_iter()
            .map(|row| {
                let mut entity = E::from_row(row);
                if self.load_hook {
                    entity.on_load(tx)?;
                }
                Ok(entity)
            })
            .collect()
    }

    fn select_rows(&self, tx: &TransactionManager, criteria: Criteria, columns: Vec<String>) -> QueryResult<Vec<Row>> {
        let mut select = SelectStatement::new(E::SCHEMA.table);
        select.set_columns(columns).set_criteria(criteria);
        tx.query(&select)
    }

    // ============== Terminals ==============

    /// Matching entities.
    pub fn load(&mut self, tx: &TransactionManager) -> QueryResult<Vec<E>> {
        let criteria = self.scoped().clone();
        let rows = self.select_rows(tx, criteria, self.columns.clone())?;
        debug!(entity = E::SCHEMA.name, rows = rows.len(), "Repository loaded");
        self.hydrate(tx, rows)
    }

    /// Alias of [`load`](Self::load).
    pub fn get(&mut self, tx: &TransactionManager) -> QueryResult<Vec<E>> {
        self.load(tx)
    }

    /// First entity by the current order, or by primary key.
    pub fn first(&mut self, tx: &TransactionManager) -> QueryResult<Option<E>> {
        self.edge(tx, false)
    }

    /// Last entity by the current order, or by primary key.
    pub fn last(&mut self, tx: &TransactionManager) -> QueryResult<Option<E>> {
        self.edge(tx, true)
    }

    fn edge(&mut self, tx: &TransactionManager, reverse: bool) -> QueryResult<Option<E>> {
        let mut criteria = self.scoped().clone();
        if criteria.order().is_none() {
            criteria.set_order(E::SCHEMA.primary_key);
        }
        let direction = criteria.direction().unwrap_or_default();
        criteria.set_direction(if reverse { direction.reverse() } else { direction });
        criteria.set_limit(1);
        let rows = self.select_rows(tx, criteria, self.columns.clone())?;
        Ok(self.hydrate(tx, rows)?.into_iter().next())
    }

    /// Number of matching rows.
    pub fn count(&mut self, tx: &TransactionManager) -> QueryResult<u64> {
        let criteria = self.scoped_filter();
        let rows = self.select_rows(tx, criteria, vec!["count(*) AS count".to_string()])?;
        Ok(rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_i64)
            .map_or(0, |n| n.max(0) as u64))
    }

    /// Values of one column.
    pub fn pluck(&mut self, tx: &TransactionManager, column: &str) -> QueryResult<Vec<Value>> {
        let criteria = self.scoped().clone();
        let rows = self.select_rows(tx, criteria, vec![column.to_string()])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
            .collect())
    }

    /// `key_column` text to `value_column` value, ordered by the value when
    /// no order is set.
    pub fn get_indexed_array(
        &mut self,
        tx: &TransactionManager,
        key_column: &str,
        value_column: &str,
    ) -> QueryResult<IndexMap<String, Value>> {
        let mut criteria = self.scoped().clone();
        if criteria.order().is_none() {
            criteria.set_order(value_column);
        }
        let columns = if key_column == value_column {
            vec![key_column.to_string()]
        } else {
            vec![key_column.to_string(), value_column.to_string()]
        };
        let rows = self.select_rows(tx, criteria, columns)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let key = row.get(key_column).map(|v| v.to_text().into_owned()).unwrap_or_default();
                let value = row.get(value_column).cloned().unwrap_or_default();
                (key, value)
            })
            .collect())
    }

    /// Apply the staged assignments to every matching row.
    pub fn update(&mut self, tx: &TransactionManager) -> QueryResult<u64> {
        if self.assignments.is_empty() {
            return Err(QueryError::invalid_input("set", "no column assignments staged")
                .with_model(E::SCHEMA.name));
        }
        let mut staged = Record::new();
        for (column, value) in &self.assignments {
            staged.set(column.clone(), value.clone());
        }
        ensure_allowed::<E>(Operation::Store, &staged)?;

        let schema = E::SCHEMA;
        let mut update = UpdateStatement::new(schema.table);
        for (column, value) in &self.assignments {
            update.set_row_data(column.clone(), value.clone());
        }
        let actor = Actor::from_session(tx);
        for (column, value) in actor.stamps(
            &timestamp(),
            schema.updated_at,
            schema.updated_by,
            schema.updated_by_unit,
        ) {
            if !self.assignments.contains_key(column) {
                update.set_row_data(column, value);
            }
        }

        let stale = self.cached_ids(tx)?;
        update.set_criteria(self.scoped_filter());
        let affected = tx.execute(&update)?;
        for id in &stale {
            cache_forget::<E>(id);
        }
        debug!(entity = schema.name, affected, "Repository updated");
        Ok(affected)
    }

    /// Delete every matching row (soft delete when the entity supports it).
    ///
    /// Cached entities are deleted one by one so hooks run and cache entries
    /// are dropped.
    pub fn delete(&mut self, tx: &TransactionManager) -> QueryResult<u64> {
        let schema = E::SCHEMA;
        if E::cache().is_some() {
            let mut entities = self.load(tx)?;
            for entity in &mut entities {
                entity.delete(tx)?;
            }
            return Ok(entities.len() as u64);
        }

        ensure_allowed::<E>(Operation::Delete, &Record::new())?;
        let criteria = self.scoped_filter();
        let affected = match schema.deleted_at {
            Some(deleted_at) => {
                let actor = Actor::from_session(tx);
                let mut update = UpdateStatement::new(schema.table);
                for (column, value) in actor.stamps(
                    &timestamp(),
                    Some(deleted_at),
                    schema.deleted_by,
                    schema.deleted_by_unit,
                ) {
                    update.set_row_data(column, value);
                }
                update.set_criteria(criteria);
                tx.execute(&update)?
            }
            None => {
                let mut delete = DeleteStatement::new(schema.table);
                delete.set_criteria(criteria);
                tx.execute(&delete)?
            }
        };
        debug!(entity = schema.name, affected, "Repository deleted");
        Ok(affected)
    }

    fn cached_ids(&mut self, tx: &TransactionManager) -> QueryResult<Vec<Value>> {
        if E::cache().is_none() {
            return Ok(Vec::new());
        }
        let criteria = self.scoped_filter();
        let rows = self.select_rows(tx, criteria, vec![E::SCHEMA.primary_key.to_string()])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
            .collect())
    }

    // ============== Aggregates ==============

    fn push_aggregate(&mut self, function: Aggregate, column: &str, alias: Option<&str>) {
        let alias = match alias {
            Some(alias) => alias.to_string(),
            None if column == "*" => function.name().to_string(),
            None => column.to_string(),
        };
        self.aggregates.push(AggregateColumn {
            function,
            column: column.to_string(),
            alias,
        });
    }

    /// Run the staged aggregates plus `function(column)`.
    pub fn aggregate(
        &mut self,
        tx: &TransactionManager,
        function: Aggregate,
        column: &str,
        alias: Option<&str>,
    ) -> QueryResult<Aggregated> {
        self.push_aggregate(function, column, alias);
        let aggregates = std::mem::take(&mut self.aggregates);
        let criteria = self.scoped().clone();

        let mut columns: Vec<String> = criteria
            .group()
            .map(|g| g.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect())
            .unwrap_or_default();
        columns.extend(
            aggregates
                .iter()
                .map(|a| format!("{} AS {}", a.function.apply(&a.column), a.alias)),
        );

        let grouped = criteria.group().is_some();
        let mut rows = self.select_rows(tx, criteria, columns)?;
        if grouped {
            return Ok(Aggregated::Rows(rows));
        }
        let row = if rows.is_empty() { Row::new() } else { rows.swap_remove(0) };
        if let [single] = aggregates.as_slice() {
            let value = row
                .get(&single.alias)
                .cloned()
                .or_else(|| row.values().next().cloned())
                .unwrap_or_default();
            return Ok(Aggregated::Value(value));
        }
        Ok(Aggregated::Row(row))
    }

    /// `count(column)`
    pub fn count_by(&mut self, tx: &TransactionManager, column: &str, alias: Option<&str>) -> QueryResult<Aggregated> {
        self.aggregate(tx, Aggregate::Count, column, alias)
    }

    /// `count(distinct column)`
    pub fn count_distinct_by(
        &mut self,
        tx: &TransactionManager,
        column: &str,
        alias: Option<&str>,
    ) -> QueryResult<Aggregated> {
        self.aggregate(tx, Aggregate::CountDistinct, column, alias)
    }

    /// `sum(column)`
    pub fn sum_by(&mut self, tx: &TransactionManager, column: &str, alias: Option<&str>) -> QueryResult<Aggregated> {
        self.aggregate(tx, Aggregate::Sum, column, alias)
    }

    /// `avg(column)`
    pub fn avg_by(&mut self, tx: &TransactionManager, column: &str, alias: Option<&str>) -> QueryResult<Aggregated> {
        self.aggregate(tx, Aggregate::Avg, column, alias)
    }

    /// `min(column)`
    pub fn min_by(&mut self, tx: &TransactionManager, column: &str, alias: Option<&str>) -> QueryResult<Aggregated> {
        self.aggregate(tx, Aggregate::Min, column, alias)
    }

    /// `max(column)`
    pub fn max_by(&mut self, tx: &TransactionManager, column: &str, alias: Option<&str>) -> QueryResult<Aggregated> {
        self.aggregate(tx, Aggregate::Max, column, alias)
    }

    /// Stage `count(column)` for the next aggregate call.
    pub fn count_by_and(mut self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(Aggregate::Count, column, alias);
        self
    }

    /// Stage `count(distinct column)` for the next aggregate call.
    pub fn count_distinct_by_and(mut self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(Aggregate::CountDistinct, column, alias);
        self
    }

    /// Stage `sum(column)` for the next aggregate call.
    pub fn sum_by_and(mut self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(Aggregate::Sum, column, alias);
        self
    }

    /// Stage `avg(column)` for the next aggregate call.
    pub fn avg_by_and(mut self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(Aggregate::Avg, column, alias);
        self
    }

    /// Stage `min(column)` for the next aggregate call.
    pub fn min_by_and(mut self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(Aggregate::Min, column, alias);
        self
    }

    /// Stage `max(column)` for the next aggregate call.
    pub fn max_by_and(mut self, column: &str, alias: Option<&str>) -> Self {
        self.push_aggregate(Aggregate::Max, column, alias);
        self
    }
}

impl<E: ActiveRecord> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::SCHEMA.name)
            .field("criteria", &self.criteria)
            .field("trashed", &self.trashed)
            .finish()
    }
}
