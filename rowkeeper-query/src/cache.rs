//! Object cache consulted by records before reading the database.
//!
//! The cache is a side channel: misses fall through to the database and
//! failed writes are logged and ignored. Keys have the form
//! `"{EntityName}[{primaryKey}]"` (see [`object_key`]).
//!
//! ```rust
//! use rowkeeper_query::cache::{MemoryCache, ObjectCache, object_key};
//! use rowkeeper_query::{Row, Value};
//!
//! let cache = MemoryCache::new();
//! let key = object_key("Customer", &Value::from(7));
//! assert_eq!(key, "Customer[7]");
//!
//! let mut row = Row::new();
//! row.insert("id".into(), Value::from(7));
//! cache.set_value(&key, &row).unwrap();
//! assert_eq!(cache.get_value(&key).unwrap(), Some(row));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;

use crate::value::{Row, Value};

/// Errors reported by cache backends.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key of one cached object.
pub fn object_key(entity: &str, primary_key: &Value) -> String {
    format!("{}[{}]", entity, primary_key.to_text())
}

/// Key-value store for hydrated rows.
pub trait ObjectCache: Send + Sync {
    /// Cached row under `key`.
    fn get_value(&self, key: &str) -> CacheResult<Option<Row>>;

    /// Store `row` under `key`.
    fn set_value(&self, key: &str, row: &Row) -> CacheResult<()>;

    /// Remove `key`.
    fn del_value(&self, key: &str) -> CacheResult<()>;
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ObjectCache for NoopCache {
    fn get_value(&self, _key: &str) -> CacheResult<Option<Row>> {
        Ok(None)
    }

    fn set_value(&self, _key: &str, _row: &Row) -> CacheResult<()> {
        Ok(())
    }

    fn del_value(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }
}

/// Hit, miss and write counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Stored rows.
    pub writes: u64,
    /// Removed keys.
    pub deletes: u64,
}

struct Entry {
    row: Row,
    stored_at: Instant,
}

/// In-process cache guarded by a read-write lock.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryCache {
    /// Create a cache whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache whose entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        self.ttl.is_none_or(|ttl| entry.stored_at.elapsed() < ttl)
    }
}

impl ObjectCache for MemoryCache {
    fn get_value(&self, key: &str) -> CacheResult<Option<Row>> {
        let found = self
            .entries
            .read()
            .get(key)
            .filter(|e| self.is_fresh(e))
            .map(|e| e.row.clone());
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(found)
    }

    fn set_value(&self, key: &str, row: &Row) -> CacheResult<()> {
        self.entries.write().insert(
            key.to_string(),
            Entry {
                row: row.clone(),
                stored_at: Instant::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn del_value(&self, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}
