//! Structured logging into date-partitioned JSON files.
//!
//! Every write appends one [`LogRecord`] to the JSON array stored at
//! `<directory(now)>/<file name(now)>` (by default `Logs/<yyyyMM>/Log_<yyyyMMdd>.json`)
//! by reading the whole file, appending and rewriting it. Cleanup deletes
//! files and directories that fall outside a retention window counted in
//! days. [`LogManager`] ties both together and reports every outcome through
//! callbacks instead of returning errors.
//!
//! Writes from one process to the same period file are serialized; writers
//! in different processes can still overwrite each other's appended records.

pub mod cleaner;
pub mod clock;
pub mod config;
pub mod env;
pub mod error;
pub mod events;
pub mod manager;
pub mod naming;
pub mod record;
pub mod schedule;
pub mod writer;

#[cfg(feature = "tracing-layer")]
pub mod init;
#[cfg(feature = "tracing-layer")]
pub mod layer;

pub use cleaner::{CleanupReport, FileLogCleaner, LogCleaner, RetentionDays};
pub use config::LogManagerConfig;
pub use error::LogError;
pub use manager::{ComponentOverrides, LogManager};
pub use naming::{FileNameGenerator, LogFileNameGenerator, LogPathGenerator, PathGenerator, PathType};
pub use record::{LogLevel, LogRecord};
pub use writer::{JsonFileLogWriter, LogWriter};
