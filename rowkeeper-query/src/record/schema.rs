//! Static description of an entity's table.

/// How a new row's primary key is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Read `max(pk) + 1` before inserting.
    #[default]
    Max,
    /// Leave the column out and read back the key the database assigned.
    Serial,
    /// Generate a random UUID (v4) locally.
    Uuid,
}

/// Table mapping of one entity type.
///
/// ```rust
/// use rowkeeper_query::record::{EntitySchema, IdPolicy};
///
/// const CUSTOMER: EntitySchema = EntitySchema::new("Customer", "customer", "id")
///     .id_policy(IdPolicy::Serial)
///     .attributes(&["name", "email", "active"])
///     .created_at("created_at")
///     .deleted_at("deleted_at");
///
/// assert!(CUSTOMER.is_persisted("name"));
/// assert!(CUSTOMER.is_persisted("id"));
/// assert!(!CUSTOMER.is_persisted("password_confirmation"));
/// assert!(CUSTOMER.soft_deletes());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    /// Entity name, used in cache keys and errors.
    pub name: &'static str,
    /// Table name.
    pub table: &'static str,
    /// Primary-key column.
    pub primary_key: &'static str,
    /// Key generation on insert.
    pub id_policy: IdPolicy,
    /// Persisted columns; empty means every scalar attribute is persisted.
    pub attributes: &'static [&'static str],
    /// Insert timestamp column.
    pub created_at: Option<&'static str>,
    /// Update timestamp column.
    pub updated_at: Option<&'static str>,
    /// Soft-delete timestamp column.
    pub deleted_at: Option<&'static str>,
    /// Inserting user column.
    pub created_by: Option<&'static str>,
    /// Updating user column.
    pub updated_by: Option<&'static str>,
    /// Deleting user column.
    pub deleted_by: Option<&'static str>,
    /// Inserting user's unit column.
    pub created_by_unit: Option<&'static str>,
    /// Updating user's unit column.
    pub updated_by_unit: Option<&'static str>,
    /// Deleting user's unit column.
    pub deleted_by_unit: Option<&'static str>,
}

impl EntitySchema {
    /// Map entity `name` to `table` keyed by `primary_key`.
    pub const fn new(name: &'static str, table: &'static str, primary_key: &'static str) -> Self {
        Self {
            name,
            table,
            primary_key,
            id_policy: IdPolicy::Max,
            attributes: &[],
            created_at: None,
            updated_at: None,
            deleted_at: None,
            created_by: None,
            updated_by: None,
            deleted_by: None,
            created_by_unit: None,
            updated_by_unit: None,
            deleted_by_unit: None,
        }
    }

    /// Set the key generation policy.
    pub const fn id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }

    /// Restrict persisted columns.
    pub const fn attributes(mut self, attributes: &'static [&'static str]) -> Self {
        self.attributes = attributes;
        self
    }

    /// Declare the insert timestamp column.
    pub const fn created_at(mut self, column: &'static str) -> Self {
        self.created_at = Some(column);
        self
    }

    /// Declare the update timestamp column.
    pub const fn updated_at(mut self, column: &'static str) -> Self {
        self.updated_at = Some(column);
        self
    }

    /// Declare the soft-delete column.
    pub const fn deleted_at(mut self, column: &'static str) -> Self {
        self.deleted_at = Some(column);
        self
    }

    /// Declare the inserting user column.
    pub const fn created_by(mut self, column: &'static str) -> Self {
        self.created_by = Some(column);
        self
    }

    /// Declare the updating user column.
    pub const fn updated_by(mut self, column: &'static str) -> Self {
        self.updated_by = Some(column);
        self
    }

    /// Declare the deleting user column.
    pub const fn deleted_by(mut self, column: &'static str) -> Self {
        self.deleted_by = Some(column);
        self
    }

    /// Declare the inserting unit column.
    pub const fn created_by_unit(mut self, column: &'static str) -> Self {
        self.created_by_unit = Some(column);
        self
    }

    /// Declare the updating unit column.
    pub const fn updated_by_unit(mut self, column: &'static str) -> Self {
        self.updated_by_unit = Some(column);
        self
    }

    /// Declare the deleting unit column.
    pub const fn deleted_by_unit(mut self, column: &'static str) -> Self {
        self.deleted_by_unit = Some(column);
        self
    }

    /// Whether deletes only stamp `deleted_at`.
    pub fn soft_deletes(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Audit columns managed by the record itself.
    pub fn audit_columns(&self) -> impl Iterator<Item = &'static str> {
        [
            self.created_at,
            self.updated_at,
            self.deleted_at,
            self.created_by,
            self.updated_by,
            self.deleted_by,
            self.created_by_unit,
            self.updated_by_unit,
            self.deleted_by_unit,
        ]
        .into_iter()
        .flatten()
    }

    /// Whether `column` is written to the database.
    ///
    /// The primary key and declared audit columns always are, even when a
    /// whitelist leaves them out.
    pub fn is_persisted(&self, column: &str) -> bool {
        self.attributes.is_empty()
            || column == self.primary_key
            || self.attributes.contains(&column)
            || self.audit_columns().any(|c| c == column)
    }

    /// Columns never rewritten by an UPDATE.
    pub(crate) fn is_insert_only(&self, column: &str) -> bool {
        column == self.primary_key
            || Some(column) == self.created_at
            || Some(column) == self.created_by
            || Some(column) == self.created_by_unit
    }
}
