use crate::cleaner::{CleanupReport, FileLogCleaner, LogCleaner, RetentionDays};
use crate::clock::{Clock, SystemClock};
use crate::config::LogManagerConfig;
use crate::error::LogError;
use crate::events::{LogEvents, SubscriptionId};
use crate::naming::{FileNameGenerator, LogFileNameGenerator, PathGenerator};
use crate::record::{LogLevel, LogRecord};
use crate::writer::{JsonFileLogWriter, LogWriter, PathLocks};
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// Replacement components for [`LogManager::initialize`]. `None` keeps the
/// current one.
#[derive(Default)]
pub struct ComponentOverrides {
    pub path_generator: Option<Arc<dyn PathGenerator>>,
    pub file_name_generator: Option<Arc<dyn FileNameGenerator>>,
    pub writer: Option<Arc<dyn LogWriter>>,
    pub cleaner: Option<Arc<dyn LogCleaner>>,
}

#[derive(Clone)]
struct Components {
    path_generator: Arc<dyn PathGenerator>,
    file_name_generator: Arc<dyn FileNameGenerator>,
    writer: Arc<dyn LogWriter>,
    cleaner: Arc<dyn LogCleaner>,
    retention: RetentionDays,
}

/// Entry point tying a writer and a cleaner to one set of notifications.
///
/// Write and cleanup calls never return errors. Each call raises exactly
/// one notification: `log_written` or `log_write_failed` for writes,
/// `cleanup_succeeded` or `cleanup_failed` for cleanups. Callers that need
/// to know whether a record reached disk must subscribe.
///
/// Components can be swapped at any time through
/// [`LogManager::initialize`] and [`LogManager::set_retention_days`]; a swap
/// is seen by calls that start after it, never by calls already running.
pub struct LogManager {
    components: RwLock<Components>,
    events: LogEvents,
    clock: Arc<dyn Clock>,
    locks: PathLocks,
}

impl LogManager {
    pub fn new(config: LogManagerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LogManagerConfig, clock: Arc<dyn Clock>) -> Self {
        let locks = PathLocks::new();
        let path_generator: Arc<dyn PathGenerator> = Arc::new(config.path_generator());
        let file_name_generator: Arc<dyn FileNameGenerator> = Arc::new(LogFileNameGenerator::new());

        let components = Components {
            writer: default_writer(&path_generator, &file_name_generator, &clock, &locks),
            cleaner: default_cleaner(&path_generator, &file_name_generator, &clock),
            path_generator,
            file_name_generator,
            retention: config.retention(),
        };

        LogManager {
            components: RwLock::new(components),
            events: LogEvents::new(),
            clock,
            locks,
        }
    }

    /// Swap components. Replacing a generator without also supplying a
    /// writer (or cleaner) rebuilds the default writer (or cleaner) on top of
    /// the new generators.
    pub fn initialize(&self, overrides: ComponentOverrides) {
        let mut components = self.components.write();
        let mut generators_changed = false;

        if let Some(path_generator) = overrides.path_generator {
            components.path_generator = path_generator;
            generators_changed = true;
        }
        if let Some(file_name_generator) = overrides.file_name_generator {
            components.file_name_generator = file_name_generator;
            generators_changed = true;
        }

        match overrides.writer {
            Some(writer) => components.writer = writer,
            None if generators_changed => {
                components.writer = default_writer(
                    &components.path_generator,
                    &components.file_name_generator,
                    &self.clock,
                    &self.locks,
                );
            }
            None => {}
        }

        match overrides.cleaner {
            Some(cleaner) => components.cleaner = cleaner,
            None if generators_changed => {
                components.cleaner = default_cleaner(
                    &components.path_generator,
                    &components.file_name_generator,
                    &self.clock,
                );
            }
            None => {}
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.components.read().retention.get()
    }

    /// Set the retention window; `0` selects the 30-day default.
    pub fn set_retention_days(&self, days: u32) {
        self.components.write().retention = RetentionDays::from(days);
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn events(&self) -> &LogEvents {
        &self.events
    }

    pub fn on_log_written<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.events.on_log_written(callback)
    }

    pub fn on_log_write_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LogRecord, &LogError) + Send + Sync + 'static,
    {
        self.events.on_log_write_failed(callback)
    }

    pub fn on_cleanup_succeeded<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CleanupReport) + Send + Sync + 'static,
    {
        self.events.on_cleanup_succeeded(callback)
    }

    pub fn on_cleanup_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        self.events.on_cleanup_failed(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Write a record stamped with the manager's clock, blocking on file I/O.
    pub fn write(&self, level: LogLevel, message: impl Into<String>) {
        self.write_entry(LogRecord::at(self.now(), level, message));
    }

    pub fn write_entry(&self, record: LogRecord) {
        let writer = Arc::clone(&self.components.read().writer);
        let result = writer.write_entry(&record);
        self.report_write(&record, result);
    }

    pub async fn write_async(&self, level: LogLevel, message: impl Into<String>) {
        self.write_entry_async(LogRecord::at(self.now(), level, message))
            .await;
    }

    pub async fn write_entry_async(&self, record: LogRecord) {
        let writer = Arc::clone(&self.components.read().writer);
        let result = writer.write_entry_async(&record).await;
        self.report_write(&record, result);
    }

    /// Run one cleanup pass with the current retention window.
    pub fn cleanup(&self) {
        let (cleaner, retention) = self.cleanup_target();
        let result = cleaner.cleanup(retention);
        self.report_cleanup(result);
    }

    pub async fn cleanup_async(&self) {
        let (cleaner, retention) = self.cleanup_target();
        let result = cleaner.cleanup_async(retention).await;
        self.report_cleanup(result);
    }

    fn cleanup_target(&self) -> (Arc<dyn LogCleaner>, RetentionDays) {
        let components = self.components.read();
        (Arc::clone(&components.cleaner), components.retention)
    }

    fn report_write(&self, record: &LogRecord, result: Result<(), LogError>) {
        match result {
            Ok(()) => self.events.log_written(record),
            Err(error) => {
                warn!(%error, level = %record.level, "failed to write log entry");
                self.events.log_write_failed(record, &error);
            }
        }
    }

    fn report_cleanup(&self, result: Result<CleanupReport, LogError>) {
        match result {
            Ok(report) => self.events.cleanup_succeeded(&report),
            Err(error) => {
                warn!(%error, "log cleanup failed");
                self.events.cleanup_failed(&error);
            }
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(LogManagerConfig::default())
    }
}

fn default_writer(
    path_generator: &Arc<dyn PathGenerator>,
    file_name_generator: &Arc<dyn FileNameGenerator>,
    clock: &Arc<dyn Clock>,
    locks: &PathLocks,
) -> Arc<dyn LogWriter> {
    let writer = JsonFileLogWriter::new(Arc::clone(path_generator), Arc::clone(file_name_generator))
        .with_clock(Arc::clone(clock))
        .with_locks(locks.clone());
    Arc::new(writer)
}

fn default_cleaner(
    path_generator: &Arc<dyn PathGenerator>,
    file_name_generator: &Arc<dyn FileNameGenerator>,
    clock: &Arc<dyn Clock>,
) -> Arc<dyn LogCleaner> {
    let cleaner = FileLogCleaner::new(Arc::clone(path_generator), Arc::clone(file_name_generator))
        .with_clock(Arc::clone(clock));
    Arc::new(cleaner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::naming::{LogPathGenerator, PathType};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FailingWriter;

    #[async_trait]
    impl LogWriter for FailingWriter {
        fn write_entry(&self, _record: &LogRecord) -> Result<(), LogError> {
            Err(LogError::io(
                "locked.json",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
            ))
        }
    }

    fn manager_in(dir: &TempDir) -> LogManager {
        let now = Local.with_ymd_and_hms(2024, 5, 15, 8, 0, 0).single().unwrap();
        LogManager::with_clock(
            LogManagerConfig::absolute(dir.path()),
            Arc::new(FixedClock::new(now)),
        )
    }

    #[test]
    fn failed_write_raises_only_the_failure_notification() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.initialize(ComponentOverrides {
            writer: Some(Arc::new(FailingWriter)),
            ..Default::default()
        });

        let written = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(Mutex::new(Vec::new()));
        let w = Arc::clone(&written);
        manager.on_log_written(move |_| {
            w.fetch_add(1, Ordering::SeqCst);
        });
        let f = Arc::clone(&failed);
        manager.on_log_write_failed(move |record, error| {
            f.lock().push((record.message.clone(), error.to_string()));
        });

        manager.write(LogLevel::Error, "dropped");

        assert_eq!(written.load(Ordering::SeqCst), 0);
        let failed = failed.lock();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "dropped");
        assert!(failed[0].1.contains("locked"));
    }

    #[test]
    fn replacing_a_generator_rebuilds_writer_and_cleaner() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let custom_root = dir.path().join("custom");

        let root = custom_root.clone();
        let generator = LogPathGenerator::with_base(PathType::Absolute, dir.path())
            .with_core(move |d| root.join(d.format("%Y").to_string()).display().to_string());
        manager.initialize(ComponentOverrides {
            path_generator: Some(Arc::new(generator)),
            ..Default::default()
        });

        manager.write(LogLevel::Information, "moved");

        assert!(custom_root.join("2024").join("Log_20240515.json").exists());
        assert!(!dir.path().join("202405").exists());

        // Stale files in both layouts; only the new one is swept.
        let stale_custom_dir = custom_root.join("2020");
        let stale_custom_file = custom_root.join("2024").join("Log_20240301.json");
        let old_layout_file = dir.path().join("202001").join("Log_20200101.json");
        fs::create_dir_all(&stale_custom_dir).unwrap();
        fs::write(stale_custom_dir.join("Log_20200101.json"), b"[]").unwrap();
        fs::write(&stale_custom_file, b"[]").unwrap();
        fs::create_dir_all(old_layout_file.parent().unwrap()).unwrap();
        fs::write(&old_layout_file, b"[]").unwrap();

        let report = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&report);
        manager.on_cleanup_succeeded(move |r| *seen.lock() = Some(*r));
        manager.cleanup();

        let report = report.lock().unwrap();
        assert_eq!(report.directories_removed, 1);
        assert_eq!(report.files_removed, 1);
        assert!(!stale_custom_dir.exists());
        assert!(!stale_custom_file.exists());
        assert!(custom_root.join("2024").join("Log_20240515.json").exists());
        assert!(old_layout_file.exists());
    }

    #[test]
    fn retention_zero_is_coerced() {
        let manager = LogManager::default();
        manager.set_retention_days(0);
        assert_eq!(manager.retention_days(), 30);
        manager.set_retention_days(3);
        assert_eq!(manager.retention_days(), 3);
    }
}
