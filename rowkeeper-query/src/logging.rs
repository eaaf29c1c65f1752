//! Logging infrastructure for rowkeeper.
//!
//! Structured logging is controlled by the `ROWKEEPER_DEBUG` environment variable.
//!
//! # Environment Variables
//!
//! - `ROWKEEPER_DEBUG=true` - Enable debug logging
//! - `ROWKEEPER_DEBUG=1` - Enable debug logging
//! - `ROWKEEPER_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `ROWKEEPER_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use rowkeeper_query::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Statement logging for open transactions is separate: see
//! [`TransactionLogger`](crate::transaction::TransactionLogger).

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `ROWKEEPER_DEBUG`.
///
/// Returns `true` if it is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("ROWKEEPER_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `ROWKEEPER_LOG_LEVEL`.
///
/// Defaults to "debug" if `ROWKEEPER_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("ROWKEEPER_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `ROWKEEPER_LOG_FORMAT`.
///
/// Defaults to "json".
pub fn get_log_format() -> &'static str {
    env::var("ROWKEEPER_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize the rowkeeper logging system.
///
/// Call once at application startup; subsequent calls are no-ops. Without the
/// `tracing-subscriber` feature this does nothing and events go to whatever
/// subscriber the application installed.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("ROWKEEPER_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "rowkeeper={},rowkeeper_query={},rowkeeper_sqlite={},rowkeeper_postgres={}",
                level, level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let result = match get_log_format() {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if result.is_ok() {
                tracing::info!(
                    level = level,
                    format = get_log_format(),
                    "rowkeeper logging initialized"
                );
            }
        }
    });
}

/// Initialize logging for debugging.
///
/// Equivalent to setting `ROWKEEPER_DEBUG=true` and calling [`init`].
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call it before spawning threads.
pub fn init_debug() {
    // SAFETY: called at startup before threads are spawned
    unsafe {
        env::set_var("ROWKEEPER_DEBUG", "true");
    }
    init();
}

/// Debug event emitted only when `ROWKEEPER_DEBUG` is enabled.
#[macro_export]
macro_rules! rowkeeper_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
