use crate::cleaner::{RetentionDays, DEFAULT_RETENTION_DAYS};
use crate::env::{
    env_or, JSON_FILE_LOG_DIR_ENV, JSON_FILE_LOG_PATH_TYPE_ENV, JSON_FILE_LOG_RETENTION_DAYS_ENV,
};
use crate::naming::{LogPathGenerator, PathType, DEFAULT_LOG_DIR};
use serde::Deserialize;
use std::path::PathBuf;

/// Settings used to build a [`crate::manager::LogManager`].
///
/// **Fields**
/// - `path_type`: whether `base_path` is relative to the working directory
///   or absolute.
/// - `base_path`: root under which the monthly log directories live.
/// - `retention_days`: days of logs kept by cleanup; `0` means 30.
///
/// Deserializable with every field optional, so it can be embedded in an
/// application's own config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogManagerConfig {
    pub path_type: PathType,
    pub base_path: PathBuf,
    pub retention_days: u32,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            path_type: PathType::Relative,
            base_path: PathBuf::from(DEFAULT_LOG_DIR),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl LogManagerConfig {
    /// Absolute base directory, retention defaulted.
    pub fn absolute(base_path: impl Into<PathBuf>) -> Self {
        Self {
            path_type: PathType::Absolute,
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Build a config from the `JSON_FILE_LOG_*` environment variables.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let path_type = match env_or(JSON_FILE_LOG_PATH_TYPE_ENV, "relative")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "absolute" => PathType::Absolute,
            _ => PathType::Relative,
        };
        let base_path = PathBuf::from(env_or(JSON_FILE_LOG_DIR_ENV, DEFAULT_LOG_DIR));
        let retention_days = env_or(JSON_FILE_LOG_RETENTION_DAYS_ENV, "")
            .trim()
            .parse()
            .unwrap_or(defaults.retention_days);

        Self {
            path_type,
            base_path,
            retention_days,
        }
    }

    pub fn retention(&self) -> RetentionDays {
        RetentionDays::from(self.retention_days)
    }

    pub fn path_generator(&self) -> LogPathGenerator {
        LogPathGenerator::with_base(self.path_type, &self.base_path)
    }
}
