//! Environment variable names read by [`crate::config::LogManagerConfig::from_env`].
//!
//! These are purely helpers; the writer and cleaner never read the
//! environment themselves.

/// Base directory for log files, e.g. `/var/log/myapp`.
pub const JSON_FILE_LOG_DIR_ENV: &str = "JSON_FILE_LOG_DIR";

/// `relative` or `absolute`; how [`JSON_FILE_LOG_DIR_ENV`] is interpreted.
pub const JSON_FILE_LOG_PATH_TYPE_ENV: &str = "JSON_FILE_LOG_PATH_TYPE";

/// Retention window in days. `0` means the 30-day default.
pub const JSON_FILE_LOG_RETENTION_DAYS_ENV: &str = "JSON_FILE_LOG_RETENTION_DAYS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
