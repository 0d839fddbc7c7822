//! Mapping from a point in time to a log directory and a log file name.
//!
//! Both generators are pure: the same date always yields the same name.
//! Custom naming is plugged in through [`LogPathGenerator::with_core`] and
//! [`LogFileNameGenerator::with_core`]; whatever the custom function returns
//! is validated on every call and replaced by the default name for that date
//! when it is blank or contains a reserved character.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default base directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "Logs";

/// Produces the directory that holds the log file for `date`.
pub trait PathGenerator: Send + Sync {
    fn log_path(&self, date: DateTime<Local>) -> PathBuf;
}

/// Produces the log file name (no directory part) for `date`.
pub trait FileNameGenerator: Send + Sync {
    fn log_file_name(&self, date: DateTime<Local>) -> String;
}

/// Custom naming function used by [`LogPathGenerator::with_core`] and
/// [`LogFileNameGenerator::with_core`].
pub type NamingCore = dyn Fn(DateTime<Local>) -> String + Send + Sync;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    #[default]
    Relative,
    Absolute,
}

// Windows-reserved characters are rejected everywhere so a layout that works
// on one platform works on all of them.
fn is_reserved_path_char(c: char) -> bool {
    c.is_control() || matches!(c, '<' | '>' | '"' | '|' | '?' | '*')
}

fn is_reserved_file_name_char(c: char) -> bool {
    is_reserved_path_char(c) || matches!(c, ':' | '/' | '\\')
}

fn is_valid_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.chars().any(is_reserved_path_char)
}

fn is_valid_file_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.chars().any(is_reserved_file_name_char)
}

/// Directory generator laying logs out as `<base>/<yyyyMM>`.
#[derive(Clone)]
pub struct LogPathGenerator {
    path_type: PathType,
    base: PathBuf,
    core: Option<Arc<NamingCore>>,
}

impl LogPathGenerator {
    /// Relative `Logs` base.
    pub fn new() -> Self {
        LogPathGenerator {
            path_type: PathType::Relative,
            base: PathBuf::from(DEFAULT_LOG_DIR),
            core: None,
        }
    }

    /// Use `base` as the log root.
    ///
    /// Falls back to the relative `Logs` base when `base` is blank, contains a
    /// reserved character, or is declared [`PathType::Absolute`] but is not an
    /// absolute path below a filesystem root.
    pub fn with_base(path_type: PathType, base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let accepted = match base.to_str() {
            Some(text) if is_valid_path(text) => match path_type {
                PathType::Relative => true,
                PathType::Absolute => base.is_absolute() && base.parent().is_some(),
            },
            _ => false,
        };

        if accepted {
            LogPathGenerator {
                path_type,
                base: base.to_path_buf(),
                core: None,
            }
        } else {
            tracing::warn!(base = %base.display(), ?path_type, "invalid log base path, using default");
            Self::new()
        }
    }

    /// Delegate naming to `core`; invalid results fall back to the default layout.
    pub fn with_core<F>(mut self, core: F) -> Self
    where
        F: Fn(DateTime<Local>) -> String + Send + Sync + 'static,
    {
        self.core = Some(Arc::new(core));
        self
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn default_path(&self, date: DateTime<Local>) -> PathBuf {
        self.base.join(date.format("%Y%m").to_string())
    }
}

impl Default for LogPathGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogPathGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogPathGenerator")
            .field("path_type", &self.path_type)
            .field("base", &self.base)
            .field("custom", &self.core.is_some())
            .finish()
    }
}

impl PathGenerator for LogPathGenerator {
    fn log_path(&self, date: DateTime<Local>) -> PathBuf {
        match &self.core {
            Some(core) => {
                let custom = core(date);
                if is_valid_path(&custom) {
                    PathBuf::from(custom)
                } else {
                    self.default_path(date)
                }
            }
            None => self.default_path(date),
        }
    }
}

/// File name generator producing `Log_<yyyyMMdd>.json`.
#[derive(Clone, Default)]
pub struct LogFileNameGenerator {
    core: Option<Arc<NamingCore>>,
}

impl LogFileNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate naming to `core`; invalid results fall back to `Log_<yyyyMMdd>.json`.
    pub fn with_core<F>(mut self, core: F) -> Self
    where
        F: Fn(DateTime<Local>) -> String + Send + Sync + 'static,
    {
        self.core = Some(Arc::new(core));
        self
    }

    fn default_name(date: DateTime<Local>) -> String {
        format!("Log_{}.json", date.format("%Y%m%d"))
    }
}

impl fmt::Debug for LogFileNameGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFileNameGenerator")
            .field("custom", &self.core.is_some())
            .finish()
    }
}

impl FileNameGenerator for LogFileNameGenerator {
    fn log_file_name(&self, date: DateTime<Local>) -> String {
        match &self.core {
            Some(core) => {
                let custom = core(date);
                if is_valid_file_name(&custom) {
                    custom
                } else {
                    Self::default_name(date)
                }
            }
            None => Self::default_name(date),
        }
    }
}
