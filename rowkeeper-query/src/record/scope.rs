//! Per-entity global scopes and manage permissions.
//!
//! Both registries are keyed by the entity's `TypeId` and are meant to be
//! filled once at start-up. Repositories read the scopes on every query; the
//! record operations consult the permission callback before writing.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::debug;

use super::Record;
use crate::filter::Filter;

/// A filter every repository query on the entity receives.
#[derive(Debug, Clone)]
pub struct GlobalScope {
    /// Name used to opt out of the scope.
    pub name: String,
    /// Filter AND-ed to the criteria.
    pub filter: Filter,
}

static SCOPES: LazyLock<RwLock<HashMap<TypeId, Vec<GlobalScope>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register a named global scope for `E`.
///
/// Returns `false` and leaves the registry untouched when `E` already has a
/// scope called `name`.
pub fn add_global_scope<E: 'static>(name: impl Into<String>, filter: Filter) -> bool {
    let name = name.into();
    let mut scopes = SCOPES.write();
    let entry = scopes.entry(TypeId::of::<E>()).or_default();
    if entry.iter().any(|s| s.name == name) {
        return false;
    }
    debug!(entity = std::any::type_name::<E>(), scope = %name, "Global scope registered");
    entry.push(GlobalScope { name, filter });
    true
}

/// Scopes registered for `E`, in registration order.
pub fn global_scopes<E: 'static>() -> Vec<GlobalScope> {
    SCOPES
        .read()
        .get(&TypeId::of::<E>())
        .cloned()
        .unwrap_or_default()
}

/// A write the permission callback is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert or update of one record, or a bulk update.
    Store,
    /// Soft or physical delete.
    Delete,
    /// Clearing the soft-delete mark.
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Store => "store",
            Self::Delete => "delete",
            Self::Restore => "restore",
        })
    }
}

type PermissionFn = Arc<dyn Fn(Operation, &Record) -> bool + Send + Sync>;

static PERMISSIONS: LazyLock<RwLock<HashMap<TypeId, PermissionFn>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Install the callback deciding whether writes on `E` are allowed.
///
/// The callback receives the record being written; bulk repository writes
/// pass a record holding only the assigned columns.
pub fn set_manage_permission<E, F>(callback: F)
where
    E: 'static,
    F: Fn(Operation, &Record) -> bool + Send + Sync + 'static,
{
    PERMISSIONS
        .write()
        .insert(TypeId::of::<E>(), Arc::new(callback));
}

/// Whether `operation` on `record` is allowed for `E`. Entities without a
/// callback allow everything.
pub fn is_allowed<E: 'static>(operation: Operation, record: &Record) -> bool {
    let callback = PERMISSIONS.read().get(&TypeId::of::<E>()).cloned();
    callback.is_none_or(|allow| allow(operation, record))
}
