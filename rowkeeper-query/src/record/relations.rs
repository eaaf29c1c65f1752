//! Relations between entities.
//!
//! * *has many* / *composite*: child rows carry the parent's key in a
//!   foreign-key column.
//! * *belongs to*: this row carries the parent's key.
//! * *belongs to many* / *aggregate*: a join entity holds one row per
//!   `(this, target)` pair.
//!
//! Saving a composite or an aggregate replaces the stored set: the existing
//! children (or join rows) are deleted, then the given set is written.

use tracing::debug;

use super::ActiveRecord;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::repository::Repository;
use crate::transaction::TransactionManager;
use crate::value::Value;

/// Relation helpers available on every [`ActiveRecord`].
pub trait Relations: ActiveRecord {
    /// Children of type `C` whose `foreign_key` holds this key.
    fn has_many<C: ActiveRecord>(&self, tx: &TransactionManager, foreign_key: &str) -> QueryResult<Vec<C>> {
        let id = owner_id(self)?;
        Repository::<C>::new().where_(foreign_key, "=", id).load(tx)
    }

    /// Parent of type `P` referenced by this row's `foreign_key`.
    fn belongs_to<P: ActiveRecord>(&self, tx: &TransactionManager, foreign_key: &str) -> QueryResult<Option<P>> {
        match self.record().get(foreign_key).filter(|v| !v.is_null()) {
            Some(parent) => P::find(tx, parent.clone()),
            None => Ok(None),
        }
    }

    /// Targets of type `T` linked through join entity `J`.
    ///
    /// `join_key` is the column of `J` holding this key and `target_key` the
    /// column holding the target's key.
    fn belongs_to_many<T, J>(
        &self,
        tx: &TransactionManager,
        join_key: &str,
        target_key: &str,
    ) -> QueryResult<Vec<T>>
    where
        T: ActiveRecord,
        J: ActiveRecord,
    {
        let id = owner_id(self)?;
        let targets = Repository::<J>::new()
            .where_(join_key, "=", id)
            .pluck(tx, target_key)?;
        let targets: Vec<Value> = targets.into_iter().filter(|v| !v.is_null()).collect();
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        Repository::<T>::new()
            .where_filter(Filter::in_list(T::SCHEMA.primary_key, targets))
            .order_by(T::SCHEMA.primary_key, Default::default())
            .load(tx)
    }

    /// Composite children, ordered by their key.
    fn load_composite<C: ActiveRecord>(&self, tx: &TransactionManager, foreign_key: &str) -> QueryResult<Vec<C>> {
        let id = owner_id(self)?;
        Repository::<C>::new()
            .where_(foreign_key, "=", id)
            .order_by(C::SCHEMA.primary_key, Default::default())
            .load(tx)
    }

    /// Delete every composite child, returning how many were affected.
    fn delete_composite<C: ActiveRecord>(&self, tx: &TransactionManager, foreign_key: &str) -> QueryResult<u64> {
        let id = owner_id(self)?;
        Repository::<C>::new().where_(foreign_key, "=", id).delete(tx)
    }

    /// Replace the stored composite children with `children`.
    fn save_composite<C: ActiveRecord>(
        &self,
        tx: &TransactionManager,
        foreign_key: &str,
        children: &mut [C],
    ) -> QueryResult<()> {
        let id = owner_id(self)?;
        let removed = self.delete_composite::<C>(tx, foreign_key)?;
        for child in children.iter_mut() {
            child.set(foreign_key, id.clone());
            child.store(tx)?;
        }
        debug!(
            parent = Self::SCHEMA.name,
            child = C::SCHEMA.name,
            removed,
            stored = children.len(),
            "Composite saved"
        );
        Ok(())
    }

    /// Aggregated targets of type `T` linked through join entity `J`.
    fn load_aggregate<T, J>(&self, tx: &TransactionManager, join_key: &str, target_key: &str) -> QueryResult<Vec<T>>
    where
        T: ActiveRecord,
        J: ActiveRecord,
    {
        self.belongs_to_many::<T, J>(tx, join_key, target_key)
    }

    /// Delete every join row of this entity in `J`.
    fn delete_aggregate<J: ActiveRecord>(&self, tx: &TransactionManager, join_key: &str) -> QueryResult<u64> {
        let id = owner_id(self)?;
        Repository::<J>::new().where_(join_key, "=", id).delete(tx)
    }

    /// Replace the join rows in `J` so this entity links exactly to `targets`.
    fn save_aggregate<J: ActiveRecord>(
        &self,
        tx: &TransactionManager,
        join_key: &str,
        target_key: &str,
        targets: &[Value],
    ) -> QueryResult<()> {
        let id = owner_id(self)?;
        self.delete_aggregate::<J>(tx, join_key)?;
        for target in targets {
            let mut link = J::new();
            link.set(join_key, id.clone());
            link.set(target_key, target.clone());
            link.store(tx)?;
        }
        Ok(())
    }
}

impl<E: ActiveRecord> Relations for E {}

fn owner_id<E: ActiveRecord>(entity: &E) -> QueryResult<Value> {
    entity.id().ok_or_else(|| {
        QueryError::invalid_input(E::SCHEMA.primary_key, "relation owner has no primary key")
            .with_model(E::SCHEMA.name)
    })
}
