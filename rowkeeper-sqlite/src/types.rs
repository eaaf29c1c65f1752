//! Value conversion between rowkeeper and SQLite.

use rusqlite::types::{Value as SqliteValue, ValueRef};

use rowkeeper_query::Value;

/// Convert a bound value to its SQLite storage class.
///
/// Booleans become `0`/`1`; lists are stored as comma-joined text.
pub fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::List(_) => SqliteValue::Text(value.to_text().into_owned()),
    }
}

/// Convert a fetched column to a [`Value`].
///
/// Blobs are decoded as UTF-8, lossily.
pub fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sqlite() {
        assert_eq!(to_sqlite(&Value::Bool(true)), SqliteValue::Integer(1));
        assert_eq!(to_sqlite(&Value::Int(42)), SqliteValue::Integer(42));
        assert_eq!(to_sqlite(&Value::Null), SqliteValue::Null);
        assert_eq!(
            to_sqlite(&Value::List(vec![Value::Int(1), Value::Int(2)])),
            SqliteValue::Text("1,2".into())
        );
    }

    #[test]
    fn test_from_sqlite() {
        assert_eq!(from_sqlite(ValueRef::Integer(7)), Value::Int(7));
        assert_eq!(from_sqlite(ValueRef::Text(b"Ana")), Value::Text("Ana".into()));
        assert_eq!(from_sqlite(ValueRef::Blob(b"raw")), Value::Text("raw".into()));
        assert_eq!(from_sqlite(ValueRef::Null), Value::Null);
    }
}
