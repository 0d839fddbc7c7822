use crate::clock::{Clock, SystemClock};
use crate::error::LogError;
use crate::naming::{FileNameGenerator, LogFileNameGenerator, LogPathGenerator, PathGenerator};
use crate::record::LogRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Persists one [`LogRecord`] per call.
///
/// Implementations report the outcome through the returned `Result`;
/// [`crate::manager::LogManager`] turns that into exactly one success or
/// failure notification.
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Persist `record`, blocking the calling thread on file I/O.
    fn write_entry(&self, record: &LogRecord) -> Result<(), LogError>;

    /// Persist `record` without blocking the async runtime.
    ///
    /// The default implementation calls [`LogWriter::write_entry`] inline,
    /// which is only appropriate for writers that never block.
    async fn write_entry_async(&self, record: &LogRecord) -> Result<(), LogError> {
        self.write_entry(record)
    }
}

/// In-process mutual exclusion keyed by the resolved path of a period file.
///
/// Without it two writers that read the same array before either rewrites it
/// would lose one of the appended records. Separate processes writing the
/// same file can still race.
#[derive(Clone, Default)]
pub struct PathLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &Path) -> (PathBuf, Arc<Mutex<()>>) {
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut locks = self.locks.lock();
        let lock = Arc::clone(locks.entry(key.clone()).or_default());
        (key, lock)
    }

    // Drops the entry once no writer holds or waits on it. The map lock is
    // held across the count check so `lock_for` cannot clone in between.
    fn release(&self, key: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Appends records to the period file's JSON array by rewriting the whole file.
///
/// Each call reads the current array (if the file exists), appends the new
/// record and replaces the file with the indented result. Existing elements
/// are carried over as opaque JSON values. A file that does not parse as an
/// array aborts the write and is left untouched.
#[derive(Clone)]
pub struct JsonFileLogWriter {
    path_generator: Arc<dyn PathGenerator>,
    file_name_generator: Arc<dyn FileNameGenerator>,
    clock: Arc<dyn Clock>,
    locks: PathLocks,
}

impl JsonFileLogWriter {
    pub fn new(
        path_generator: Arc<dyn PathGenerator>,
        file_name_generator: Arc<dyn FileNameGenerator>,
    ) -> Self {
        JsonFileLogWriter {
            path_generator,
            file_name_generator,
            clock: Arc::new(SystemClock),
            locks: PathLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share write locks with other writers targeting the same files.
    pub fn with_locks(mut self, locks: PathLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Full path of the period file the next write would target.
    pub fn current_file(&self) -> PathBuf {
        let now = self.clock.now();
        self.path_generator
            .log_path(now)
            .join(self.file_name_generator.log_file_name(now))
    }
}

impl Default for JsonFileLogWriter {
    fn default() -> Self {
        Self::new(
            Arc::new(LogPathGenerator::new()),
            Arc::new(LogFileNameGenerator::new()),
        )
    }
}

#[async_trait]
impl LogWriter for JsonFileLogWriter {
    fn write_entry(&self, record: &LogRecord) -> Result<(), LogError> {
        let now = self.clock.now();
        let dir = self.path_generator.log_path(now);
        let full_path = dir.join(self.file_name_generator.log_file_name(now));

        let (key, lock) = self.locks.lock_for(&full_path);
        let result = {
            let _guard = lock.lock();
            append_entry(&dir, &full_path, record)
        };
        self.locks.release(&key, lock);

        let count = result?;
        debug!(path = %full_path.display(), entries = count, "log entry written");
        Ok(())
    }

    async fn write_entry_async(&self, record: &LogRecord) -> Result<(), LogError> {
        let writer = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || writer.write_entry(&record)).await?
    }
}

fn append_entry(dir: &Path, path: &Path, record: &LogRecord) -> Result<usize, LogError> {
    fs::create_dir_all(dir).map_err(|e| LogError::io(dir, e))?;

    let mut entries = read_entries(path)?;
    entries.push(serde_json::to_value(record).map_err(LogError::Serialize)?);
    write_entries(dir, path, &entries)?;
    Ok(entries.len())
}

fn read_entries(path: &Path) -> Result<Vec<Value>, LogError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LogError::io(path, e)),
    };

    serde_json::from_slice(&bytes).map_err(|source| LogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// The array goes to a sibling temp file first and is renamed over the target,
// so a failure at any point leaves the previous content in place.
fn write_entries(dir: &Path, path: &Path, entries: &[Value]) -> Result<(), LogError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| LogError::io(dir, e))?;

    let mut out = io::BufWriter::new(tmp.as_file_mut());
    serde_json::to_writer_pretty(&mut out, entries).map_err(LogError::Serialize)?;
    out.flush().map_err(|e| LogError::io(path, e))?;
    drop(out);

    // The temp file is created owner-only; keep the mode the file already had.
    match fs::metadata(path) {
        Ok(meta) => tmp
            .as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| LogError::io(path, e))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(LogError::io(path, e)),
    }

    tmp.persist(path).map_err(|e| LogError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::naming::PathType;
    use crate::record::LogLevel;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn writer_in(dir: &TempDir) -> JsonFileLogWriter {
        let now = Local.with_ymd_and_hms(2024, 3, 20, 9, 30, 0).single().unwrap();
        JsonFileLogWriter::new(
            Arc::new(LogPathGenerator::with_base(PathType::Absolute, dir.path())),
            Arc::new(LogFileNameGenerator::new()),
        )
        .with_clock(Arc::new(FixedClock::new(now)))
    }

    #[test]
    fn first_write_creates_directory_and_array() {
        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);

        writer.write_entry(&LogRecord::new(LogLevel::Information, "hello")).unwrap();

        let file = dir.path().join("202403").join("Log_20240320.json");
        assert_eq!(writer.current_file(), file);
        let entries: Vec<Value> = serde_json::from_slice(&fs::read(&file).unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["message"], "hello");
    }

    #[test]
    fn existing_elements_are_preserved_verbatim() {
        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);
        let file = writer.current_file();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, r#"[{"z": 1, "a": "ünïcödé"}, 42, "free-form"]"#).unwrap();

        writer.write_entry(&LogRecord::new(LogLevel::Warning, "appended")).unwrap();

        let text = fs::read_to_string(&file).unwrap();
        assert!(text.contains("ünïcödé"), "non-ASCII must not be escaped");
        assert!(text.contains("\n  "), "output is indented");
        let entries: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(entries.len(), 4);
        let keys: Vec<&String> = entries[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a"]);
        assert_eq!(entries[1], 42);
        assert_eq!(entries[2], "free-form");
        assert_eq!(entries[3]["level"], 3);
    }

    #[test]
    fn malformed_file_is_reported_and_left_untouched() {
        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);
        let file = writer.current_file();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "{ not an array").unwrap();

        let err = writer
            .write_entry(&LogRecord::new(LogLevel::Error, "lost"))
            .unwrap_err();

        assert!(matches!(err, LogError::Parse { .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "{ not an array");
    }

    #[test]
    fn empty_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);
        let file = writer.current_file();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "").unwrap();

        let err = writer.write_entry(&LogRecord::new(LogLevel::Error, "x")).unwrap_err();
        assert!(matches!(err, LogError::Parse { .. }));
    }

    #[test]
    fn unusable_directory_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        // A regular file where the month directory should be.
        fs::write(dir.path().join("202403"), b"").unwrap();
        let writer = writer_in(&dir);

        let err = writer.write_entry(&LogRecord::new(LogLevel::Error, "x")).unwrap_err();
        assert!(matches!(err, LogError::Io { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_file_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                let record = LogRecord::new(LogLevel::Information, format!("msg {i}"));
                writer.write_entry_async(&record).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let entries: Vec<Value> =
            serde_json::from_slice(&fs::read(writer.current_file()).unwrap()).unwrap();
        assert_eq!(entries.len(), 32);
        assert_eq!(writer.locks.tracked(), 0);
    }

    #[test]
    fn lock_entries_are_dropped_after_each_write() {
        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);

        writer.write_entry(&LogRecord::new(LogLevel::Information, "one")).unwrap();
        assert_eq!(writer.locks.tracked(), 0);

        fs::write(writer.current_file(), b"not json").unwrap();
        assert!(writer.write_entry(&LogRecord::new(LogLevel::Information, "two")).is_err());
        assert_eq!(writer.locks.tracked(), 0);
    }

    #[test]
    fn held_lock_survives_release_by_another_writer() {
        let locks = PathLocks::new();
        let path = Path::new("/var/log/app/Log_20240320.json");

        let (key, first) = locks.lock_for(path);
        let (_, second) = locks.lock_for(path);
        locks.release(&key, first);
        assert_eq!(locks.tracked(), 1);

        locks.release(&key, second);
        assert_eq!(locks.tracked(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_existing_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let writer = writer_in(&dir);
        let path = writer.current_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"[]").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        writer.write_entry(&LogRecord::new(LogLevel::Information, "kept")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
