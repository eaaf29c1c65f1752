//! Database configuration records and where they come from.
//!
//! A logical database name such as `"permission"` or `"warehouse"` resolves to
//! a [`DatabaseConfig`]. File-based configuration lives in
//! `<dir>/<name>.toml` (or `.json`), for example:
//!
//! ```toml
//! type = "pgsql"
//! host = "${DB_HOST:-localhost}"
//! port = 5432
//! name = "warehouse"
//! user = "app"
//! pass = "${DB_PASSWORD}"
//! zone = "America/Sao_Paulo"
//! keep = true
//! prep = true
//! ```
//!
//! String values may reference the environment with `${VAR}`,
//! `${VAR:-default}` or `${VAR:?message}`; `$$` stands for a literal `$` and
//! any other `$` is kept as written. Port and flag fields also accept their
//! value as a string, so `port = "${DB_PORT:-5432}"` works.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::driver::Driver;
use super::env::{EnvExpander, EnvSource, StdEnvSource};
use crate::error::{QueryError, QueryResult};

/// Column-name case folding applied to fetched rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFolding {
    /// Names as returned by the driver.
    #[default]
    Natural,
    /// Lowercase names.
    Lower,
    /// Uppercase names.
    Upper,
}

impl CaseFolding {
    /// Fold one column name.
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Natural => name.to_string(),
            Self::Lower => name.to_lowercase(),
            Self::Upper => name.to_uppercase(),
        }
    }
}

/// Connection parameters of one logical database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Driver name (`pgsql`, `mysql`, `sqlite`, ...).
    #[serde(rename = "type")]
    pub driver: String,
    /// Server host.
    pub host: Option<String>,
    /// Server port.
    #[serde(deserialize_with = "lenient::port")]
    pub port: Option<u16>,
    /// User name.
    pub user: Option<String>,
    /// Password.
    #[serde(rename = "pass")]
    pub password: Option<String>,
    /// Database name, or file path for SQLite.
    pub name: Option<String>,
    /// Character set.
    #[serde(rename = "char")]
    pub charset: Option<String>,
    /// Session time zone.
    #[serde(rename = "zone")]
    pub timezone: Option<String>,
    /// Reuse one physical connection for identical parameters.
    #[serde(deserialize_with = "lenient::flag")]
    pub keep: bool,
    /// Column-name case folding.
    pub case: CaseFolding,
    /// Extra driver options appended to the DSN.
    #[serde(rename = "opts")]
    pub options: Option<String>,
    /// Render statements with placeholders instead of literals.
    #[serde(rename = "prep", deserialize_with = "lenient::flag")]
    pub prepared: bool,
    /// Enable SQLite foreign-key enforcement.
    #[serde(rename = "fkey", deserialize_with = "lenient::flag")]
    pub foreign_keys: bool,
    /// Oracle TNS name used instead of host/port/name.
    #[serde(rename = "tnsn")]
    pub tns_name: Option<String>,
    /// Oracle `NLS_DATE_FORMAT`.
    #[serde(rename = "date")]
    pub date_format: Option<String>,
    /// Oracle `NLS_TIMESTAMP_FORMAT`.
    #[serde(rename = "time")]
    pub time_format: Option<String>,
    /// Oracle `NLS_NUMERIC_CHARACTERS`.
    #[serde(rename = "nsep")]
    pub numeric_separators: Option<String>,
    /// Connection URL filling host, port, user, password and name.
    pub url: Option<String>,
}

fn url_decode(part: &str) -> QueryResult<String> {
    urlencoding::decode(part).map(|decoded| decoded.into_owned()).map_err(|e| {
        QueryError::new(
            crate::error::ErrorCode::InvalidConnectionString,
            format!("connection URL is not valid UTF-8 once decoded: {}", e),
        )
    })
}

// Fields that may arrive as text after environment expansion.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OrText<T> {
        Native(T),
        Text(String),
    }

    pub fn port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
        match Option::<OrText<u16>>::deserialize(deserializer)? {
            None => Ok(None),
            Some(OrText::Native(port)) => Ok(Some(port)),
            Some(OrText::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(OrText::Text(text)) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid port '{}'", text))),
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match OrText::<bool>::deserialize(deserializer)? {
            OrText::Native(flag) => Ok(flag),
            OrText::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" | "" => Ok(false),
                _ => Err(D::Error::custom(format!("invalid flag '{}'", text))),
            },
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: String::new(),
            host: None,
            port: None,
            user: None,
            password: None,
            name: None,
            charset: None,
            timezone: None,
            keep: false,
            case: CaseFolding::Natural,
            options: None,
            prepared: false,
            foreign_keys: true,
            tns_name: None,
            date_format: None,
            time_format: None,
            numeric_separators: None,
            url: None,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a driver, all other fields defaulted.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Default::default()
        }
    }

    /// SQLite database at `path` (`:memory:` for a private in-memory database).
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new("sqlite").with_name(path)
    }

    /// Set the database name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set user and password.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the keep flag.
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Set the prepared-statement flag.
    pub fn prepared(mut self, prepared: bool) -> Self {
        self.prepared = prepared;
        self
    }

    /// Set the case folding.
    pub fn with_case(mut self, case: CaseFolding) -> Self {
        self.case = case;
        self
    }

    /// Parsed driver.
    pub fn driver(&self) -> QueryResult<Driver> {
        Driver::from_name(&self.driver)
    }

    /// Fill host, port, user, password and name from `url`, leaving fields
    /// that are already set untouched.
    pub fn apply_url(&mut self) -> QueryResult<()> {
        let Some(raw) = self.url.clone() else {
            return Ok(());
        };
        let parsed = url::Url::parse(&raw).map_err(|e| {
            QueryError::new(
                crate::error::ErrorCode::InvalidConnectionString,
                format!("invalid connection URL '{}': {}", raw, e),
            )
        })?;

        if self.driver.is_empty() {
            self.driver = Driver::from_name(parsed.scheme())?.name().to_string();
        }
        if self.host.is_none() {
            self.host = parsed.host_str().filter(|h| !h.is_empty()).map(String::from);
        }
        if self.port.is_none() {
            self.port = parsed.port();
        }
        if self.user.is_none() && !parsed.username().is_empty() {
            self.user = Some(url_decode(parsed.username())?);
        }
        if self.password.is_none() {
            self.password = parsed.password().map(url_decode).transpose()?;
        }
        if self.name.is_none() {
            let path = parsed.path().trim_start_matches('/');
            if !path.is_empty() {
                self.name = Some(url_decode(path)?);
            }
        }
        Ok(())
    }

    /// Stable hash of the full parameter set, used to key kept connections.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.serialized().hash(&mut hasher);
        hasher.finish()
    }

    /// Serialized parameter set, used to compare configurations.
    pub fn serialized(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parameter summary safe to show to users (no password).
    pub fn info(&self) -> HashMap<String, String> {
        let mut info = HashMap::new();
        info.insert("type".to_string(), self.driver.clone());
        let optional = [
            ("host", &self.host),
            ("user", &self.user),
            ("name", &self.name),
            ("char", &self.charset),
            ("zone", &self.timezone),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                info.insert(key.to_string(), value.clone());
            }
        }
        if let Some(port) = self.port {
            info.insert("port".to_string(), port.to_string());
        }
        info
    }
}

/// Resolves logical database names to configurations.
pub trait ConfigSource: Send + Sync {
    /// Configuration for `name`, or `None` when no resource matches.
    fn load(&self, name: &str) -> QueryResult<Option<DatabaseConfig>>;
}

/// Configurations held in memory.
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    configs: RwLock<HashMap<String, DatabaseConfig>>,
}

impl MemoryConfigSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configuration.
    pub fn insert(&self, name: impl Into<String>, config: DatabaseConfig) {
        self.configs.write().insert(name.into(), config);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, name: impl Into<String>, config: DatabaseConfig) -> Self {
        self.insert(name, config);
        self
    }
}

impl ConfigSource for MemoryConfigSource {
    fn load(&self, name: &str) -> QueryResult<Option<DatabaseConfig>> {
        Ok(self.configs.read().get(name).cloned())
    }
}

/// Reads `<dir>/<name>.toml` or `<dir>/<name>.json`, expanding environment
/// references before parsing.
#[derive(Debug, Clone)]
pub struct DirectoryConfigSource<S: EnvSource = StdEnvSource> {
    dir: PathBuf,
    expander: EnvExpander<S>,
}

impl DirectoryConfigSource<StdEnvSource> {
    /// Read configurations from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            expander: EnvExpander::new(),
        }
    }
}

impl<S: EnvSource> DirectoryConfigSource<S> {
    /// Read configurations from `dir`, expanding variables from `env`.
    pub fn with_env(dir: impl Into<PathBuf>, env: S) -> Self {
        Self {
            dir: dir.into(),
            expander: EnvExpander::with_source(env),
        }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn parse(&self, path: &Path) -> QueryResult<DatabaseConfig> {
        let raw = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let mut document: serde_json::Value = if is_json {
            serde_json::from_str(&raw)?
        } else {
            toml::from_str(&raw).map_err(|e| {
                QueryError::invalid_configuration(format!("{}: {}", path.display(), e))
            })?
        };
        self.expand_strings(&mut document)?;

        let mut config: DatabaseConfig = serde_json::from_value(document).map_err(|e| {
            QueryError::invalid_configuration(format!("{}: {}", path.display(), e))
        })?;
        config.apply_url()?;
        Ok(config)
    }

    // expansion runs on parsed string values, never on the raw file
    fn expand_strings(&self, value: &mut serde_json::Value) -> QueryResult<()> {
        match value {
            serde_json::Value::String(text) => *text = self.expander.expand_braced_refs(text)?,
            serde_json::Value::Array(items) => {
                for item in items {
                    self.expand_strings(item)?;
                }
            }
            serde_json::Value::Object(fields) => {
                for item in fields.values_mut() {
                    self.expand_strings(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl<S: EnvSource> ConfigSource for DirectoryConfigSource<S> {
    fn load(&self, name: &str) -> QueryResult<Option<DatabaseConfig>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(QueryError::invalid_configuration(format!(
                "invalid database name '{}'",
                name
            )));
        }

        for ext in ["toml", "json"] {
            let path = self.dir.join(format!("{}.{}", name, ext));
            if path.is_file() {
                debug!(path = %path.display(), "Reading database configuration");
                let config = self.parse(&path)?;
                info!(database = %name, driver = %config.driver, "Database configuration loaded");
                return Ok(Some(config));
            }
        }
        Ok(None)
    }
}
