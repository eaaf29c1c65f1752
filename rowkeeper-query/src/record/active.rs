//! The `ActiveRecord` trait: persistence of one entity through the open
//! transaction.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, warn};
use uuid::Uuid;

use super::scope::{self, Operation};
use super::{EntitySchema, IdPolicy, Record};
use crate::cache::{ObjectCache, object_key};
use crate::criteria::Criteria;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::session::{USER_ID_KEY, USER_UNIT_ID_KEY};
use crate::statement::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use crate::transaction::TransactionManager;
use crate::value::{Row, Value};

/// Current local time in the format written to audit columns.
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// An entity mapped to one table.
///
/// Implementors supply the schema and access to their [`Record`]; hooks and
/// the object cache are optional overrides.
pub trait ActiveRecord: Sized + Send + Sync + 'static {
    /// Table mapping.
    const SCHEMA: EntitySchema;

    /// Wrap hydrated attributes.
    fn from_record(record: Record) -> Self;

    /// Attribute storage.
    fn record(&self) -> &Record;

    /// Mutable attribute storage.
    fn record_mut(&mut self) -> &mut Record;

    /// Object cache consulted by [`find`](Self::find); `None` disables it.
    fn cache() -> Option<Arc<dyn ObjectCache>> {
        None
    }

    /// Runs before INSERT or UPDATE; an error aborts the store.
    fn on_before_store(&mut self, _tx: &TransactionManager) -> QueryResult<()> {
        Ok(())
    }

    /// Runs after a successful store.
    fn on_after_store(&mut self, _tx: &TransactionManager) -> QueryResult<()> {
        Ok(())
    }

    /// Runs before a soft or physical delete; an error aborts it.
    fn on_before_delete(&mut self, _tx: &TransactionManager) -> QueryResult<()> {
        Ok(())
    }

    /// Runs after a successful delete.
    fn on_after_delete(&mut self, _tx: &TransactionManager) -> QueryResult<()> {
        Ok(())
    }

    /// Runs on every hydrated instance.
    fn on_load(&mut self, _tx: &TransactionManager) -> QueryResult<()> {
        Ok(())
    }

    // ============== Attributes ==============

    /// Empty entity.
    fn new() -> Self {
        Self::from_record(Record::new())
    }

    /// Hydrate from a fetched row.
    fn from_row(row: Row) -> Self {
        let mut record = Record::from_row(row);
        if let Some(column) = Self::SCHEMA.deleted_at {
            let trashed = record.get(column).is_some_and(|v| !v.is_null());
            record.set_trashed(trashed);
        }
        Self::from_record(record)
    }

    /// Copy of the scalar attributes.
    fn into_row(self) -> Row {
        self.record().to_row()
    }

    /// Scalar attribute, `Null` when unset.
    fn get(&self, column: &str) -> Value {
        self.record().value(column)
    }

    /// Set a scalar attribute.
    fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.record_mut().set(column, value);
    }

    /// Primary key, when set and not null.
    fn id(&self) -> Option<Value> {
        self.record()
            .get(Self::SCHEMA.primary_key)
            .filter(|v| !v.is_null())
            .cloned()
    }

    /// Set the primary key.
    fn set_id(&mut self, id: impl Into<Value>) {
        self.record_mut().set(Self::SCHEMA.primary_key, id);
    }

    /// Whether the row carries a soft-delete mark.
    fn is_trashed(&self) -> bool {
        self.record().is_trashed()
    }

    /// Scalar attributes as a JSON object.
    fn to_json(&self) -> serde_json::Value {
        self.record().to_json()
    }

    /// Copy without primary key, stored as a new row on the next `store`.
    fn clone_entity(&self) -> Self {
        let mut record = self.record().clone();
        record.unset(Self::SCHEMA.primary_key);
        record.set_trashed(false);
        record.mark_all_dirty();
        Self::from_record(record)
    }

    // ============== Reading ==============

    /// Load by primary key, skipping soft-deleted rows.
    fn find(tx: &TransactionManager, id: impl Into<Value>) -> QueryResult<Option<Self>> {
        fetch(tx, id.into(), false)
    }

    /// Load by primary key, soft-deleted rows included.
    fn find_with_trashed(tx: &TransactionManager, id: impl Into<Value>) -> QueryResult<Option<Self>> {
        fetch(tx, id.into(), true)
    }

    /// Load by primary key, failing with `NotFound` when the row is missing.
    fn load(tx: &TransactionManager, id: impl Into<Value>) -> QueryResult<Self> {
        let id = id.into();
        fetch(tx, id.clone(), false)?.ok_or_else(|| not_found::<Self>(&id))
    }

    /// Whether a visible row with this key exists.
    fn exists(tx: &TransactionManager, id: impl Into<Value>) -> QueryResult<bool> {
        row_exists::<Self>(tx, &id.into(), false)
    }

    // ============== Writing ==============

    /// INSERT when the key is unset or unknown, UPDATE otherwise.
    ///
    /// Only whitelisted columns are written. Audit columns declared by the
    /// schema are stamped with the current time and the session user.
    fn store(&mut self, tx: &TransactionManager) -> QueryResult<()> {
        let schema = Self::SCHEMA;
        ensure_allowed::<Self>(Operation::Store, self.record())?;
        self.on_before_store(tx)?;

        let actor = Actor::from_session(tx);
        let now = timestamp();
        let existing = match self.id() {
            Some(id) if row_exists::<Self>(tx, &id, true)? => Some(id),
            _ => None,
        };

        match existing {
            Some(id) => {
                for (column, value) in actor.stamps(
                    &now,
                    schema.updated_at,
                    schema.updated_by,
                    schema.updated_by_unit,
                ) {
                    self.record_mut().set(column, value);
                }

                let mut update = UpdateStatement::new(schema.table);
                for (column, value) in self.record().attributes() {
                    if schema.is_persisted(column) && !schema.is_insert_only(column) {
                        update.set_row_data(column.clone(), value.clone());
                    }
                }
                if !update.row_data().is_empty() {
                    update.set_criteria(Criteria::from_pairs([(schema.primary_key, id)]));
                    tx.execute(&update)?;
                }
            }
            None => insert_new(self, tx, &actor, &now)?,
        }

        self.record_mut().clear_dirty();
        if let Some(id) = self.id() {
            cache_put::<Self>(&id, &persisted_row::<Self>(self.record()));
        }
        debug!(entity = schema.name, id = ?self.id(), "Record stored");
        self.on_after_store(tx)
    }

    /// Always INSERT, even when the key is already assigned. A taken key
    /// surfaces as the driver's duplicate error.
    fn insert(&mut self, tx: &TransactionManager) -> QueryResult<()> {
        ensure_allowed::<Self>(Operation::Store, self.record())?;
        self.on_before_store(tx)?;

        let actor = Actor::from_session(tx);
        insert_new(self, tx, &actor, &timestamp())?;

        self.record_mut().clear_dirty();
        if let Some(id) = self.id() {
            cache_put::<Self>(&id, &persisted_row::<Self>(self.record()));
        }
        debug!(entity = Self::SCHEMA.name, id = ?self.id(), "Record inserted");
        self.on_after_store(tx)
    }

    /// Soft delete when the schema declares `deleted_at`, physical delete
    /// otherwise.
    fn delete(&mut self, tx: &TransactionManager) -> QueryResult<()> {
        let schema = Self::SCHEMA;
        let Some(deleted_at) = schema.deleted_at else {
            return self.force_delete(tx);
        };
        ensure_allowed::<Self>(Operation::Delete, self.record())?;
        let id = require_id(self)?;
        self.on_before_delete(tx)?;

        let actor = Actor::from_session(tx);
        let now = timestamp();
        let mut update = UpdateStatement::new(schema.table);
        for (column, value) in actor.stamps(
            &now,
            Some(deleted_at),
            schema.deleted_by,
            schema.deleted_by_unit,
        ) {
            update.set_row_data(column, value.clone());
            self.record_mut().set(column, value);
        }
        update.set_criteria(Criteria::from_pairs([(schema.primary_key, id.clone())]));
        tx.execute(&update)?;

        self.record_mut().clear_dirty();
        self.record_mut().set_trashed(true);
        cache_forget::<Self>(&id);
        debug!(entity = schema.name, id = %id, "Record soft-deleted");
        self.on_after_delete(tx)
    }

    /// Remove the row, ignoring soft-delete configuration.
    fn force_delete(&mut self, tx: &TransactionManager) -> QueryResult<()> {
        let schema = Self::SCHEMA;
        ensure_allowed::<Self>(Operation::Delete, self.record())?;
        let id = require_id(self)?;
        self.on_before_delete(tx)?;

        let mut delete = DeleteStatement::new(schema.table);
        delete.set_criteria(Criteria::from_pairs([(schema.primary_key, id.clone())]));
        tx.execute(&delete)?;

        cache_forget::<Self>(&id);
        debug!(entity = schema.name, id = %id, "Record deleted");
        self.on_after_delete(tx)
    }

    /// Load the row (trashed or not) and [`delete`](Self::delete) it.
    fn delete_by_id(tx: &TransactionManager, id: impl Into<Value>) -> QueryResult<()> {
        let id = id.into();
        let mut entity = fetch::<Self>(tx, id.clone(), true)?.ok_or_else(|| not_found::<Self>(&id))?;
        entity.delete(tx)
    }

    /// Clear the soft-delete mark.
    fn restore(&mut self, tx: &TransactionManager) -> QueryResult<()> {
        let schema = Self::SCHEMA;
        let Some(deleted_at) = schema.deleted_at else {
            return Err(QueryError::soft_delete_not_enabled(schema.name));
        };
        ensure_allowed::<Self>(Operation::Restore, self.record())?;
        let id = require_id(self)?;

        let mut update = UpdateStatement::new(schema.table);
        for column in [Some(deleted_at), schema.deleted_by, schema.deleted_by_unit]
            .into_iter()
            .flatten()
        {
            update.set_row_data(column, Value::Null);
            self.record_mut().set(column, Value::Null);
        }
        update.set_criteria(Criteria::from_pairs([(schema.primary_key, id.clone())]));
        tx.execute(&update)?;

        self.record_mut().clear_dirty();
        self.record_mut().set_trashed(false);
        cache_forget::<Self>(&id);
        debug!(entity = schema.name, id = %id, "Record restored");
        Ok(())
    }
}

/// Session user and unit written to audit columns.
#[derive(Debug, Default)]
pub(crate) struct Actor {
    user: Option<Value>,
    unit: Option<Value>,
}

impl Actor {
    pub(crate) fn from_session(tx: &TransactionManager) -> Self {
        let Some(session) = tx.session() else {
            return Self::default();
        };
        Self {
            user: session.get(USER_ID_KEY),
            unit: session.get(USER_UNIT_ID_KEY),
        }
    }

    /// Values for the declared `at`/`by`/`unit` columns; user columns are
    /// skipped when the session has no value for them.
    pub(crate) fn stamps(
        &self,
        now: &str,
        at: Option<&'static str>,
        by: Option<&'static str>,
        unit: Option<&'static str>,
    ) -> Vec<(&'static str, Value)> {
        let mut stamps = Vec::new();
        if let Some(column) = at {
            stamps.push((column, Value::from(now)));
        }
        if let (Some(column), Some(user)) = (by, &self.user) {
            stamps.push((column, user.clone()));
        }
        if let (Some(column), Some(unit)) = (unit, &self.unit) {
            stamps.push((column, unit.clone()));
        }
        stamps
    }
}

fn insert_new<E: ActiveRecord>(
    entity: &mut E,
    tx: &TransactionManager,
    actor: &Actor,
    now: &str,
) -> QueryResult<()> {
    let schema = E::SCHEMA;
    let pk = schema.primary_key;

    if entity.id().is_none() {
        match schema.id_policy {
            IdPolicy::Max => {
                let next = next_max_id::<E>(tx)?;
                entity.record_mut().set(pk, next);
            }
            IdPolicy::Uuid => {
                entity.record_mut().set(pk, Uuid::new_v4().to_string());
            }
            IdPolicy::Serial => {
                entity.record_mut().unset(pk);
            }
        }
    }

    for (column, value) in actor.stamps(
        now,
        schema.created_at,
        schema.created_by,
        schema.created_by_unit,
    ) {
        entity.record_mut().set(column, value);
    }

    let mut insert = InsertStatement::new(schema.table);
    for (column, value) in entity.record().attributes() {
        if schema.is_persisted(column) {
            insert.set_row_data(column.clone(), value.clone());
        }
    }

    if entity.id().is_some() {
        tx.execute(&insert)?;
        return Ok(());
    }

    let connection = tx.connection()?;
    let assigned = if connection.dialect().supports_returning() {
        insert.set_returning(pk);
        tx.query(&insert)?
            .into_iter()
            .next()
            .and_then(|mut row| row.shift_remove(pk))
    } else {
        tx.execute(&insert)?;
        connection.last_insert_id(schema.table, pk)?
    };
    match assigned.filter(|v| !v.is_null()) {
        Some(id) => {
            entity.record_mut().set(pk, id);
        }
        None => warn!(entity = schema.name, "Database did not report the assigned key"),
    }
    Ok(())
}

pub(crate) fn ensure_allowed<E: ActiveRecord>(operation: Operation, record: &Record) -> QueryResult<()> {
    if scope::is_allowed::<E>(operation, record) {
        Ok(())
    } else {
        Err(QueryError::permission_denied(E::SCHEMA.name, operation.to_string()))
    }
}

fn require_id<E: ActiveRecord>(entity: &E) -> QueryResult<Value> {
    entity.id().ok_or_else(|| {
        QueryError::invalid_input(E::SCHEMA.primary_key, "primary key is not set")
            .with_model(E::SCHEMA.name)
    })
}

fn not_found<E: ActiveRecord>(id: &Value) -> QueryError {
    QueryError::not_found(E::SCHEMA.name)
        .with_context(format!("{} = {}", E::SCHEMA.primary_key, id.to_text()))
}

fn fetch<E: ActiveRecord>(tx: &TransactionManager, id: Value, with_trashed: bool) -> QueryResult<Option<E>> {
    let schema = E::SCHEMA;

    if let Some(row) = cache_get::<E>(&id) {
        let mut entity = E::from_row(row);
        if entity.is_trashed() && !with_trashed {
            return Ok(None);
        }
        entity.on_load(tx)?;
        return Ok(Some(entity));
    }

    let mut criteria = Criteria::new();
    criteria.add(Filter::eq(schema.primary_key, id.clone()));
    if let Some(column) = schema.deleted_at.filter(|_| !with_trashed) {
        criteria.add(Filter::is_null(column));
    }
    let mut select = SelectStatement::new(schema.table);
    select.add_column("*").set_criteria(criteria);

    let Some(row) = tx.query(&select)?.into_iter().next() else {
        return Ok(None);
    };
    cache_put::<E>(&id, &row);
    let mut entity = E::from_row(row);
    entity.on_load(tx)?;
    Ok(Some(entity))
}

pub(crate) fn row_exists<E: ActiveRecord>(
    tx: &TransactionManager,
    id: &Value,
    with_trashed: bool,
) -> QueryResult<bool> {
    let schema = E::SCHEMA;
    let mut criteria = Criteria::new();
    criteria.add(Filter::eq(schema.primary_key, id.clone()));
    if let Some(column) = schema.deleted_at.filter(|_| !with_trashed) {
        criteria.add(Filter::is_null(column));
    }
    let mut select = SelectStatement::new(schema.table);
    select.add_column(schema.primary_key).set_criteria(criteria);
    Ok(!tx.query(&select)?.is_empty())
}

fn next_max_id<E: ActiveRecord>(tx: &TransactionManager) -> QueryResult<i64> {
    let pk = E::SCHEMA.primary_key;
    let mut select = SelectStatement::new(E::SCHEMA.table);
    select.add_column(format!("max({pk}) AS {pk}"));
    let current = tx
        .query(&select)?
        .into_iter()
        .next()
        .and_then(|row| row.get(pk).and_then(Value::as_i64))
        .unwrap_or(0);
    Ok(current + 1)
}

fn cache_get<E: ActiveRecord>(id: &Value) -> Option<Row> {
    let cache = E::cache()?;
    match cache.get_value(&object_key(E::SCHEMA.name, id)) {
        Ok(row) => row,
        Err(e) => {
            warn!(entity = E::SCHEMA.name, error = %e, "Cache read failed");
            None
        }
    }
}

/// The attributes of `record` that reach the table.
fn persisted_row<E: ActiveRecord>(record: &Record) -> Row {
    record
        .attributes()
        .iter()
        .filter(|(column, _)| E::SCHEMA.is_persisted(column))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

pub(crate) fn cache_put<E: ActiveRecord>(id: &Value, row: &Row) {
    let Some(cache) = E::cache() else { return };
    if let Err(e) = cache.set_value(&object_key(E::SCHEMA.name, id), row) {
        warn!(entity = E::SCHEMA.name, error = %e, "Cache write failed");
    }
}

pub(crate) fn cache_forget<E: ActiveRecord>(id: &Value) {
    let Some(cache) = E::cache() else { return };
    if let Err(e) = cache.del_value(&object_key(E::SCHEMA.name, id)) {
        warn!(entity = E::SCHEMA.name, error = %e, "Cache delete failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::connection::DatabaseConfig;
    use crate::error::ErrorCode;
    use crate::mock::{row, transaction};
    use crate::session::MemorySession;
    use std::sync::LazyLock;

    struct Customer(Record);

    impl ActiveRecord for Customer {
        const SCHEMA: EntitySchema = EntitySchema::new("Customer", "customer", "id")
            .attributes(&["name"])
            .created_at("created_at")
            .created_by("created_by")
            .updated_at("updated_at")
            .deleted_at("deleted_at");

        fn from_record(record: Record) -> Self {
            Self(record)
        }
        fn record(&self) -> &Record {
            &self.0
        }
        fn record_mut(&mut self) -> &mut Record {
            &mut self.0
        }
    }

    struct Ticket(Record);

    static TICKET_CACHE: LazyLock<Arc<MemoryCache>> = LazyLock::new(|| Arc::new(MemoryCache::new()));

    impl ActiveRecord for Ticket {
        const SCHEMA: EntitySchema =
            EntitySchema::new("Ticket", "ticket", "id").id_policy(IdPolicy::Serial);

        fn from_record(record: Record) -> Self {
            Self(record)
        }
        fn record(&self) -> &Record {
            &self.0
        }
        fn record_mut(&mut self) -> &mut Record {
            &mut self.0
        }
        fn cache() -> Option<Arc<dyn ObjectCache>> {
            Some(TICKET_CACHE.clone())
        }
    }

    struct Invoice(Record);

    static INVOICE_CACHE: LazyLock<Arc<MemoryCache>> = LazyLock::new(|| Arc::new(MemoryCache::new()));

    impl ActiveRecord for Invoice {
        const SCHEMA: EntitySchema = EntitySchema::new("Invoice", "invoice", "id").attributes(&["total"]);

        fn from_record(record: Record) -> Self {
            Self(record)
        }
        fn record(&self) -> &Record {
            &self.0
        }
        fn record_mut(&mut self) -> &mut Record {
            &mut self.0
        }
        fn cache() -> Option<Arc<dyn ObjectCache>> {
            Some(INVOICE_CACHE.clone())
        }
    }

    struct Token(Record);

    impl ActiveRecord for Token {
        const SCHEMA: EntitySchema =
            EntitySchema::new("Token", "token", "id").id_policy(IdPolicy::Uuid);

        fn from_record(record: Record) -> Self {
            Self(record)
        }
        fn record(&self) -> &Record {
            &self.0
        }
        fn record_mut(&mut self) -> &mut Record {
            &mut self.0
        }
    }

    #[test]
    fn test_insert_with_max_policy_and_whitelist() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        let tx = tx.with_session(Arc::new(MemorySession::new().with(USER_ID_KEY, 9)));
        conn.push_rows(vec![row([("id", 41)])]);

        let mut customer = Customer::new();
        customer.set("name", "Ana");
        customer.set("password_confirmation", "secret");
        customer.store(&tx).unwrap();

        assert_eq!(customer.id(), Some(Value::Int(42)));
        assert_eq!(customer.get("created_by"), Value::Int(9));
        let statements = conn.statements();
        assert_eq!(statements[0], "SELECT max(id) AS id FROM customer");
        assert!(statements[1].starts_with("INSERT INTO customer (name, id, created_at, created_by) VALUES ('Ana', 42, '"));
        assert!(!statements[1].contains("secret"));
        assert!(!customer.record().is_dirty());
    }

    #[test]
    fn test_update_when_row_exists() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        conn.push_rows(vec![row([("id", 3)])]);

        let mut customer = Customer::from_row(row([
            ("id", Value::from(3)),
            ("name", Value::from("Ana")),
            ("created_at", Value::from("2024-01-01 00:00:00")),
        ]));
        customer.set("name", "Bia");
        customer.store(&tx).unwrap();

        let statements = conn.statements();
        assert_eq!(
            statements[0],
            "SELECT id FROM customer WHERE (id = 3)"
        );
        assert!(statements[1].starts_with("UPDATE customer SET name = 'Bia', updated_at = '"));
        assert!(statements[1].ends_with("WHERE (id = 3)"));
        assert!(!statements[1].contains("created_at"));
    }

    #[test]
    fn test_insert_skips_existence_check() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        let mut customer = Customer::new();
        customer.set("id", 3);
        customer.set("name", "Ana");
        customer.insert(&tx).unwrap();

        let statements = conn.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("INSERT INTO customer (id, name, created_at) VALUES (3, 'Ana', '"));
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        let mut customer = Customer::from_row(row([("id", Value::from(5)), ("name", Value::from("Ana"))]));

        customer.delete(&tx).unwrap();
        assert!(customer.is_trashed());
        let statements = conn.take_statements();
        assert!(statements[0].starts_with("UPDATE customer SET deleted_at = '"));

        customer.restore(&tx).unwrap();
        assert!(!customer.is_trashed());
        assert_eq!(
            conn.take_statements(),
            vec!["UPDATE customer SET deleted_at = NULL WHERE (id = 5)"]
        );

        customer.force_delete(&tx).unwrap();
        assert_eq!(conn.take_statements(), vec!["DELETE FROM customer WHERE (id = 5)"]);
    }

    #[test]
    fn test_find_hides_trashed_rows() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        assert!(Customer::find(&tx, 5).unwrap().is_none());
        assert_eq!(
            conn.take_statements(),
            vec!["SELECT * FROM customer WHERE (id = 5 AND deleted_at IS NULL)"]
        );

        conn.push_rows(vec![row([
            ("id", Value::from(5)),
            ("deleted_at", Value::from("2024-01-01 00:00:00")),
        ])]);
        let trashed = Customer::find_with_trashed(&tx, 5).unwrap().unwrap();
        assert!(trashed.is_trashed());

        let err = Customer::load(&tx, 6).map(|_| ()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_restore_requires_soft_delete() {
        let (tx, _conn) = transaction(DatabaseConfig::sqlite("t.db"));
        let mut token = Token::from_row(row([("id", "x")]));
        let err = token.restore(&tx).unwrap_err();
        assert_eq!(err.code, ErrorCode::SoftDeleteNotEnabled);
    }

    #[test]
    fn test_serial_key_via_returning_and_cache() {
        let config = DatabaseConfig::new("fbird").with_name("/data/app.fdb");
        let (tx, conn) = transaction(config);
        conn.push_rows(vec![row([("id", 77)])]);

        let mut ticket = Ticket::new();
        ticket.set("subject", "Printer");
        ticket.store(&tx).unwrap();

        assert_eq!(ticket.id(), Some(Value::Int(77)));
        assert_eq!(
            conn.statements(),
            vec!["INSERT INTO ticket (subject) VALUES ('Printer') RETURNING id"]
        );

        let queries = conn.query_count();
        let cached = Ticket::load(&tx, 77).unwrap();
        assert_eq!(cached.get("subject"), Value::from("Printer"));
        assert_eq!(conn.query_count(), queries);
    }

    #[test]
    fn test_cache_keeps_only_persisted_columns() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        conn.push_rows(vec![row([("id", 10)])]);

        let mut stored = Invoice::new();
        stored.set("total", 120);
        stored.set("card_number", "4111");
        stored.store(&tx).unwrap();

        let mut inserted = Invoice::new();
        inserted.set("id", 20);
        inserted.set("total", 80);
        inserted.set("card_number", "5500");
        inserted.insert(&tx).unwrap();

        for id in [11, 20] {
            let cached = INVOICE_CACHE
                .get_value(&object_key("Invoice", &Value::from(id)))
                .unwrap()
                .unwrap();
            assert!(cached.contains_key("total"));
            assert!(!cached.contains_key("card_number"));
        }

        let queries = conn.query_count();
        let loaded = Invoice::load(&tx, 11).unwrap();
        assert_eq!(conn.query_count(), queries);
        assert!(loaded.get("card_number").is_null());
    }

    #[test]
    fn test_uuid_policy_and_clone() {
        let (tx, conn) = transaction(DatabaseConfig::sqlite("t.db"));
        let mut token = Token::new();
        token.set("scope", "read");
        token.store(&tx).unwrap();

        let id = token.id().unwrap();
        assert_eq!(id.as_str().map(str::len), Some(36));
        assert!(conn.statements()[0].starts_with("INSERT INTO token (scope, id) VALUES ('read', '"));

        let copy = token.clone_entity();
        assert!(copy.id().is_none());
        assert_eq!(copy.get("scope"), Value::from("read"));
    }

    #[test]
    fn test_delete_without_key() {
        let (tx, _conn) = transaction(DatabaseConfig::sqlite("t.db"));
        let err = Customer::new().delete(&tx).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
