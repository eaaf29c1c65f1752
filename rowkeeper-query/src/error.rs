//! Error types for persistence operations.
//!
//! Every failure surfaces as a [`QueryError`] carrying an [`ErrorCode`], a
//! human-readable message and optional context (model, field, SQL text,
//! suggestions).
//!
//! # Error Codes
//!
//! Error codes follow a pattern: R{category}{number}
//! - 1xxx: Record/query errors (not found, invalid filter, soft delete)
//! - 3xxx: Connection errors
//! - 4xxx: Transaction errors (no active frame, permissions)
//! - 5xxx: Execution errors (driver failures, bad parameters)
//! - 6xxx: Data errors (serialization, CSV)
//! - 7xxx: Configuration errors (missing resource, unknown driver)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use rowkeeper_query::{QueryError, ErrorCode};
//!
//! let err = QueryError::not_found("Customer");
//! assert_eq!(err.code, ErrorCode::RecordNotFound);
//! assert!(err.to_string().contains("Customer"));
//!
//! let err = QueryError::configuration_not_found("warehouse");
//! assert_eq!(err.code.code(), "R7002");
//! ```

use std::fmt;

use regex_lite::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Result type for persistence operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Record/query errors (1xxx)
    /// Record not found (R1001).
    RecordNotFound = 1001,
    /// Invalid filter or criteria (R1003).
    InvalidFilter = 1003,
    /// Required field missing (R1005).
    RequiredFieldMissing = 1005,
    /// Restore called on an entity without a deleted-at column (R1006).
    SoftDeleteNotEnabled = 1006,

    // Constraint errors (2xxx)
    /// Unique constraint violation (R2001).
    UniqueConstraint = 2001,

    // Connection errors (3xxx)
    /// Database connection failed (R3001).
    ConnectionFailed = 3001,

    // Transaction errors (4xxx)
    /// Transaction failed (R4001).
    TransactionFailed = 4001,
    /// Operation requires an open transaction frame (R4005).
    NoActiveTransaction = 4005,
    /// A manage-permission callback rejected the operation (R4006).
    PermissionDenied = 4006,

    // Execution errors (5xxx)
    /// Invalid parameter (R5003).
    InvalidParameter = 5003,
    /// General database error (R5005).
    DatabaseError = 5005,

    // Data errors (6xxx)
    /// Serialization error (R6002).
    SerializationError = 6002,
    /// File or CSV input/output error (R6005).
    Io = 6005,

    // Configuration errors (7xxx)
    /// Invalid configuration (R7001).
    InvalidConfiguration = 7001,
    /// No configuration resource matches the database name (R7002).
    ConfigurationNotFound = 7002,
    /// Invalid connection string (R7003).
    InvalidConnectionString = 7003,
    /// Driver not recognized or no connector registered (R7004).
    UnsupportedDriver = 7004,

    // Internal errors (9xxx)
    /// Internal error (R9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "R1001").
    pub fn code(&self) -> String {
        format!("R{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "Record not found",
            Self::InvalidFilter => "Invalid filter condition",
            Self::RequiredFieldMissing => "Required field missing",
            Self::SoftDeleteNotEnabled => "Soft delete not enabled",
            Self::UniqueConstraint => "Unique constraint violation",
            Self::ConnectionFailed => "Database connection failed",
            Self::TransactionFailed => "Transaction failed",
            Self::NoActiveTransaction => "No active transaction",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidParameter => "Invalid parameter",
            Self::DatabaseError => "Database error",
            Self::SerializationError => "Serialization error",
            Self::Io => "Input/output error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::ConfigurationNotFound => "Configuration not found",
            Self::InvalidConnectionString => "Invalid connection string",
            Self::UnsupportedDriver => "Unsupported driver",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// The SQL statement (attached when statement logging is enabled).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur during persistence operations.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

static DUPLICATE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(duplicate|already exists|unique constraint|violation of primary key)").ok()
});

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a not found error.
    pub fn not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found matching the key", model),
        )
        .with_model(&model)
        .with_suggestion(format!("Verify the {} exists before loading it", model))
        .with_code_suggestion(
            "Use find() to get None instead of an error",
            format!("{}::find(&tm, id)?", model),
        )
    }

    /// Create an error for a database name without a configuration resource.
    pub fn configuration_not_found(database: impl Into<String>) -> Self {
        let database = database.into();
        Self::new(
            ErrorCode::ConfigurationNotFound,
            format!("Configuration for database '{}' not found", database),
        )
        .with_suggestion(format!("Create a '{}.toml' file in the configuration directory", database))
    }

    /// Create an unsupported driver error.
    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        let driver = driver.into();
        Self::new(
            ErrorCode::UnsupportedDriver,
            format!("Driver '{}' is not supported", driver),
        )
        .with_help("Supported drivers: pgsql, mysql, sqlite, ibase, fbird, oracle, mssql, dblib, sqlsrv, odbc")
    }

    /// Create an error for operations attempted with an empty transaction stack.
    pub fn no_active_transaction() -> Self {
        Self::new(
            ErrorCode::NoActiveTransaction,
            "No active transaction: open one before accessing the database",
        )
        .with_code_suggestion(
            "Open a transaction frame first",
            "tm.open(\"database\")?;\n/* ... */\ntm.close()?;",
        )
    }

    /// Create a permission denied error.
    pub fn permission_denied(model: impl Into<String>, operation: impl Into<String>) -> Self {
        let model = model.into();
        let operation = operation.into();
        Self::new(
            ErrorCode::PermissionDenied,
            format!("Permission denied to {} {}", operation, model),
        )
        .with_model(&model)
        .with_context(operation)
    }

    /// Create an error for restoring an entity without soft delete support.
    pub fn soft_delete_not_enabled(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::SoftDeleteNotEnabled,
            format!("{} does not declare a deleted-at column", model),
        )
        .with_model(&model)
        .with_help("Declare the column with EntitySchema::new(..).deleted_at(\"deleted_at\")")
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid input for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::ConnectionFailed, format!("Connection error: {}", message))
            .with_suggestion("Check that the database server is running")
            .with_suggestion("Verify the connection parameters are correct")
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::TransactionFailed, format!("Transaction error: {}", message))
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message.into())
    }

    /// Create an input/output error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Io, message.into())
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
    }

    // ============== Error Checks ==============

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        self.code == ErrorCode::ConnectionFailed
    }

    /// Check if this error reports a duplicate row.
    ///
    /// Drivers word unique violations differently, so the message is matched
    /// against the usual phrasings.
    pub fn is_duplicate(&self) -> bool {
        if self.code == ErrorCode::UniqueConstraint {
            return true;
        }
        DUPLICATE_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(&self.message))
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref sql) = self.context.sql {
            output.push_str(&format!("  → SQL: {}\n", sql));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::io(err.to_string()).with_source(err)
    }
}

impl From<csv::Error> for QueryError {
    fn from(err: csv::Error) -> Self {
        QueryError::io(format!("CSV error: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::serialization(err.to_string()).with_source(err)
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::RecordNotFound.code(), "R1001");
        assert_eq!(ErrorCode::NoActiveTransaction.code(), "R4005");
        assert_eq!(ErrorCode::UnsupportedDriver.code(), "R7004");
    }

    #[test]
    fn test_not_found_error() {
        let err = QueryError::not_found("Customer");
        assert!(err.is_not_found());
        assert!(err.message.contains("Customer"));
        assert!(!err.context.suggestions.is_empty());
    }

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(
            QueryError::configuration_not_found("erp").code,
            ErrorCode::ConfigurationNotFound
        );
        assert_eq!(QueryError::unsupported_driver("db2").code, ErrorCode::UnsupportedDriver);
        assert_eq!(QueryError::no_active_transaction().code, ErrorCode::NoActiveTransaction);
        assert_eq!(
            QueryError::permission_denied("Invoice", "delete").code,
            ErrorCode::PermissionDenied
        );
        assert_eq!(
            QueryError::soft_delete_not_enabled("Invoice").code,
            ErrorCode::SoftDeleteNotEnabled
        );
    }

    #[test]
    fn test_duplicate_detection() {
        assert!(QueryError::database("UNIQUE constraint failed: city.id").is_duplicate());
        assert!(QueryError::database("Duplicate entry '1' for key 'PRIMARY'").is_duplicate());
        assert!(QueryError::database("relation \"x\" already exists").is_duplicate());
        assert!(!QueryError::database("no such table: city").is_duplicate());
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::database("syntax error")
            .with_sql("SELEC 1")
            .with_context("Loading customers");

        let output = err.display_full();
        assert!(output.contains("R5005"));
        assert!(output.contains("SELEC 1"));
        assert!(output.contains("Loading customers"));
    }

    #[test]
    fn test_error_macro() {
        let err = query_error!(
            ErrorCode::InvalidParameter,
            "Invalid column name",
            with_field = "name",
            with_suggestion = "Use a declared attribute"
        );

        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert_eq!(err.context.field, Some("name".to_string()));
    }
}
