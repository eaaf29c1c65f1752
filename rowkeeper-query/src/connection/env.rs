//! Environment variable expansion for configuration files.

use std::collections::HashMap;

use crate::error::{QueryError, QueryResult};

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;
}

/// Default environment source using std::env.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a HashMap.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Expands environment variable references.
///
/// Supported syntax:
/// - `${VAR}` - Required variable
/// - `${VAR:-default}` - Variable with default value
/// - `${VAR:?error message}` - Required with custom error
/// - `$VAR` - Simple variable reference
#[derive(Debug, Clone)]
pub struct EnvExpander<S: EnvSource = StdEnvSource> {
    source: S,
}

impl EnvExpander<StdEnvSource> {
    /// Create an expander over the process environment.
    pub fn new() -> Self {
        Self {
            source: StdEnvSource,
        }
    }
}

impl Default for EnvExpander<StdEnvSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EnvSource> EnvExpander<S> {
    /// Create an expander with a custom environment source.
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Expand every variable reference in `input`.
    pub fn expand(&self, input: &str) -> QueryResult<String> {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            if chars.peek() == Some(&'{') {
                chars.next();
                result.push_str(&self.expand_braced(&mut chars)?);
            } else if chars.peek().is_some_and(|c| c.is_alphabetic() || *c == '_') {
                result.push_str(&self.expand_simple(&mut chars)?);
            } else {
                result.push(c);
            }
        }

        Ok(result)
    }

    /// Expand only `${...}` references, reading `$$` as a literal `$`.
    ///
    /// Any other `$` is kept, so values such as passwords can contain it.
    pub fn expand_braced_refs(&self, input: &str) -> QueryResult<String> {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('{') => {
                    chars.next();
                    result.push_str(&self.expand_braced(&mut chars)?);
                }
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                _ => result.push('$'),
            }
        }

        Ok(result)
    }

    fn expand_braced(&self, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> QueryResult<String> {
        let mut name = String::new();
        let mut modifier = None;
        let mut modifier_value = String::new();

        while let Some(&c) = chars.peek() {
            chars.next();
            if c == '}' {
                break;
            } else if c == ':' && modifier.is_none() {
                modifier = chars.next();
            } else if modifier.is_some() {
                modifier_value.push(c);
            } else {
                name.push(c);
            }
        }

        if name.is_empty() {
            return Err(QueryError::invalid_configuration("empty environment variable name"));
        }

        match self.source.get(&name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => match modifier {
                Some('-') => Ok(modifier_value),
                Some('?') => Err(QueryError::invalid_configuration(if modifier_value.is_empty() {
                    format!("required variable '{}' is not set", name)
                } else {
                    modifier_value
                })),
                _ => Err(missing(&name)),
            },
        }
    }

    fn expand_simple(&self, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> QueryResult<String> {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        self.source.get(&name).ok_or_else(|| missing(&name))
    }
}

fn missing(name: &str) -> QueryError {
    QueryError::invalid_configuration(format!("environment variable not found: {}", name))
        .with_suggestion(format!("export {}=... before opening the database", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source() -> MapEnvSource {
        MapEnvSource::new()
            .set("HOST", "localhost")
            .set("PORT", "5432")
            .set("EMPTY", "")
    }

    #[test]
    fn test_expand_simple_and_braced() {
        let expander = EnvExpander::with_source(test_source());
        assert_eq!(
            expander.expand("host = \"$HOST\"\nport = ${PORT}").unwrap(),
            "host = \"localhost\"\nport = 5432"
        );
    }

    #[test]
    fn test_expand_default() {
        let expander = EnvExpander::with_source(test_source());
        assert_eq!(expander.expand("${HOST:-x}").unwrap(), "localhost");
        assert_eq!(expander.expand("${MISSING:-x}").unwrap(), "x");
        assert_eq!(expander.expand("${EMPTY:-x}").unwrap(), "x");
    }

    #[test]
    fn test_expand_required() {
        let expander = EnvExpander::with_source(test_source());
        let err = expander.expand("${MISSING:?password is required}").unwrap_err();
        assert!(err.to_string().contains("password is required"));
        assert!(expander.expand("${MISSING}").is_err());
    }

    #[test]
    fn test_braced_refs_keep_bare_dollars() {
        let expander = EnvExpander::with_source(MapEnvSource::new());
        assert_eq!(expander.expand_braced_refs("pa$word").unwrap(), "pa$word");
        assert_eq!(expander.expand_braced_refs("a$${HOST}").unwrap(), "a${HOST}");
        assert_eq!(expander.expand_braced_refs("${PORT:-5432}").unwrap(), "5432");
        assert!(expander.expand_braced_refs("${HOST}").is_err());
    }

    #[test]
    fn test_literal_dollar() {
        let expander = EnvExpander::with_source(test_source());
        assert_eq!(expander.expand("cost: $5").unwrap(), "cost: $5");
    }
}
