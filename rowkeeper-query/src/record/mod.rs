//! Active Record entities.
//!
//! An entity is a Rust type holding a [`Record`] (its attribute map) and
//! implementing [`ActiveRecord`] with a static [`EntitySchema`]. Everything
//! else (loading, storing, soft deletes, audit stamps, caching, relations)
//! comes from provided trait methods:
//!
//! ```rust,ignore
//! struct Customer(Record);
//!
//! impl ActiveRecord for Customer {
//!     const SCHEMA: EntitySchema = EntitySchema::new("Customer", "customer", "id")
//!         .attributes(&["name", "email"])
//!         .deleted_at("deleted_at");
//!
//!     fn from_record(record: Record) -> Self { Self(record) }
//!     fn record(&self) -> &Record { &self.0 }
//!     fn record_mut(&mut self) -> &mut Record { &mut self.0 }
//! }
//!
//! let mut customer = Customer::new();
//! customer.set("name", "Ana");
//! customer.store(&tx)?;
//! let again = Customer::load(&tx, customer.id().unwrap_or_default())?;
//! ```

mod active;
mod relations;
mod schema;
pub mod scope;

pub use active::{ActiveRecord, timestamp};
pub(crate) use active::{Actor, cache_forget, ensure_allowed};
pub use relations::Relations;
pub use schema::{EntitySchema, IdPolicy};
pub use scope::{GlobalScope, Operation, add_global_scope, global_scopes, set_manage_permission};

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::value::{Row, Value};

/// Attribute storage of one entity.
///
/// Scalar attributes are persisted (subject to the schema whitelist).
/// Virtual attributes hold arbitrary in-memory objects, such as loaded
/// relations, and are never written. A name is either scalar or virtual:
/// setting one kind removes the other.
#[derive(Clone, Default)]
pub struct Record {
    attributes: IndexMap<String, Value>,
    virtuals: HashMap<String, Arc<dyn Any + Send + Sync>>,
    dirty: IndexSet<String>,
    trashed: bool,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate from a fetched row; nothing is dirty afterwards.
    pub fn from_row(row: Row) -> Self {
        Self {
            attributes: row,
            ..Default::default()
        }
    }

    /// Scalar attribute, if set.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    /// Scalar attribute, `Null` when unset.
    pub fn value(&self, column: &str) -> Value {
        self.attributes.get(column).cloned().unwrap_or_default()
    }

    /// Set a scalar attribute, replacing any virtual one of the same name.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        self.virtuals.remove(&column);
        self.dirty.insert(column.clone());
        self.attributes.insert(column, value.into());
        self
    }

    /// Remove a scalar attribute.
    pub fn unset(&mut self, column: &str) -> Option<Value> {
        self.dirty.shift_remove(column);
        self.attributes.shift_remove(column)
    }

    /// Whether a scalar attribute is set (possibly to `Null`).
    pub fn has(&self, column: &str) -> bool {
        self.attributes.contains_key(column)
    }

    /// Attach an in-memory object, replacing any scalar of the same name.
    pub fn set_virtual<T: Any + Send + Sync>(&mut self, name: impl Into<String>, object: T) {
        let name = name.into();
        self.attributes.shift_remove(&name);
        self.dirty.shift_remove(&name);
        self.virtuals.insert(name, Arc::new(object));
    }

    /// Virtual attribute downcast to `T`.
    pub fn get_virtual<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.virtuals.get(name)?.downcast_ref()
    }

    /// Remove a virtual attribute.
    pub fn unset_virtual(&mut self, name: &str) -> bool {
        self.virtuals.remove(name).is_some()
    }

    /// Scalar attributes in insertion order.
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Copy of the scalar attributes.
    pub fn to_row(&self) -> Row {
        self.attributes.clone()
    }

    /// Consume into the scalar attributes.
    pub fn into_row(self) -> Row {
        self.attributes
    }

    /// Whether any attribute changed since the last load or store.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Attributes changed since the last load or store.
    pub fn dirty_columns(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        self.dirty = self.attributes.keys().cloned().collect();
    }

    /// Whether the row carries a soft-delete mark.
    pub fn is_trashed(&self) -> bool {
        self.trashed
    }

    pub(crate) fn set_trashed(&mut self, trashed: bool) {
        self.trashed = trashed;
    }

    /// Scalar attributes as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut virtuals: Vec<&str> = self.virtuals.keys().map(String::as_str).collect();
        virtuals.sort_unstable();
        f.debug_struct("Record")
            .field("attributes", &self.attributes)
            .field("virtuals", &virtuals)
            .field("trashed", &self.trashed)
            .finish()
    }
}
