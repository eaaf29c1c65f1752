//! Placeholder inlining for the simple query protocol.
//!
//! Statements are sent as text so PostgreSQL infers every literal's type
//! from its context, the same way it does for literal rendering. `:pN`
//! placeholders are replaced by their quoted values; quoted strings,
//! quoted identifiers, comments and `::type` casts are left alone.

use rowkeeper_query::dialect::PostgresDialect;
use rowkeeper_query::sql::SqlWriter;
use rowkeeper_query::{PreparedVars, Value};

/// Replace every bound `:pN` placeholder in `sql` by its literal.
///
/// Placeholders without a value are kept verbatim.
pub fn inline_vars(sql: &str, vars: &PreparedVars) -> String {
    if vars.is_empty() {
        return sql.to_string();
    }
    let writer = SqlWriter::new(&PostgresDialect, false);
    let literal = |value: &Value| writer.literal(value);

    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + vars.len() * 8);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                let end = skip_quoted(bytes, i, quote);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = sql[i..].find('\n').map_or(bytes.len(), |n| i + n);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                out.push_str("::");
                i += 2;
            }
            b':' => {
                let end = placeholder_end(bytes, i);
                match vars.get(&sql[i..end]) {
                    Some(value) if end > i + 1 => out.push_str(&literal(value)),
                    _ => out.push_str(&sql[i..end.max(i + 1)]),
                }
                i = end.max(i + 1);
            }
            _ => {
                let next = sql[i..]
                    .find(['\'', '"', '-', ':'])
                    .map_or(bytes.len(), |n| if n == 0 { i + 1 } else { i + n });
                out.push_str(&sql[i..next]);
                i = next;
            }
        }
    }
    out
}

/// Index just past the closing quote; a doubled quote is an escape.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// End of a `:name` token starting at `start`.
fn placeholder_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}
