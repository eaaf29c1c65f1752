//! Session values consulted while rendering SQL and stamping audit columns.
//!
//! The session store belongs to the calling application; rowkeeper only reads
//! from it through [`SessionSource`].

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::RwLock;
use regex_lite::{Captures, Regex};

use crate::value::Value;

/// Session key holding the current user id.
pub const USER_ID_KEY: &str = "userid";
/// Session key holding the current user's unit id.
pub const USER_UNIT_ID_KEY: &str = "userunitid";

static SESSION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{session\.([A-Za-z0-9_.\-]+)\}").ok());

/// Read access to per-request session values.
pub trait SessionSource: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Remove a value, returning it.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }
}

impl SessionSource for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }
}

/// Check whether `text` contains a `{session.<key>}` token.
pub fn has_session_token(text: &str) -> bool {
    text.contains("{session.")
        && SESSION_TOKEN
            .as_ref()
            .is_some_and(|re| re.is_match(text))
}

/// Substitute session tokens in `text`.
///
/// When the whole text is a single token the stored value is returned as is,
/// keeping its type. Otherwise every token is replaced by the textual form of
/// its value; missing keys become empty strings (or `Null` for a lone token).
pub fn resolve_session_tokens(text: &str, session: Option<&dyn SessionSource>) -> Value {
    let Some(re) = SESSION_TOKEN.as_ref() else {
        return Value::Text(text.to_string());
    };

    let lookup = |key: &str| session.and_then(|s| s.get(key));

    if let Some(caps) = re.captures(text) {
        if let Some(whole) = caps.get(0) {
            if whole.start() == 0 && whole.end() == text.len() {
                return lookup(&caps[1]).unwrap_or(Value::Null);
            }
        }
    }

    let replaced = re.replace_all(text, |caps: &Captures<'_>| {
        lookup(&caps[1])
            .map(|v| v.to_text().into_owned())
            .unwrap_or_default()
    });
    Value::Text(replaced.into_owned())
}
