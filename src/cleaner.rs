use crate::clock::{Clock, SystemClock};
use crate::error::{CleanupFailure, LogError};
use crate::naming::{FileNameGenerator, LogFileNameGenerator, LogPathGenerator, PathGenerator};
use async_trait::async_trait;
use chrono::{DateTime, Days, Local};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Retention window used when none (or zero) is configured.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// How far back the sweep looks for stale logs.
pub const SWEEP_HORIZON_DAYS: u32 = 365 * 10;

const DEFAULT_RETENTION: NonZeroU32 = match NonZeroU32::new(DEFAULT_RETENTION_DAYS) {
    Some(days) => days,
    None => unreachable!(),
};

/// Number of most recent days whose log files survive cleanup.
///
/// Zero is not a valid window; converting `0` yields the 30-day default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetentionDays(NonZeroU32);

impl RetentionDays {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for RetentionDays {
    fn default() -> Self {
        RetentionDays::from(DEFAULT_RETENTION_DAYS)
    }
}

impl From<u32> for RetentionDays {
    fn from(days: u32) -> Self {
        match NonZeroU32::new(days) {
            Some(days) => RetentionDays(days),
            None => RetentionDays(DEFAULT_RETENTION),
        }
    }
}

impl fmt::Display for RetentionDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} day(s)", self.0)
    }
}

/// `days` calendar days before `now`, keeping the local time of day.
///
/// `None` once the date leaves chrono's representable range.
pub(crate) fn days_before(now: DateTime<Local>, days: u32) -> Option<DateTime<Local>> {
    now.checked_sub_days(Days::new(u64::from(days))).or_else(|| {
        // Local time skipped by a DST gap; step by whole days instead.
        now.checked_sub_signed(chrono::Duration::try_days(i64::from(days))?)
    })
}

/// One step of the cleanup sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sweep {
    /// The day's directory is retained; only the day's file goes.
    File(PathBuf),
    /// The day's directory is outside the window; it goes with everything in it.
    Directory(PathBuf),
}

/// What a cleanup run keeps and what it visits, computed from names alone.
#[derive(Debug, Clone)]
pub struct RetentionPlan {
    pub retained_dirs: HashSet<PathBuf>,
    pub retained_files: Vec<PathBuf>,
    pub sweep: Vec<Sweep>,
}

impl RetentionPlan {
    pub fn new(
        now: DateTime<Local>,
        days: RetentionDays,
        path_generator: &dyn PathGenerator,
        file_name_generator: &dyn FileNameGenerator,
    ) -> Self {
        // Windows beyond the sweep horizon retain everything the sweep could visit.
        let days = days.get().min(SWEEP_HORIZON_DAYS);

        let mut retained_dirs = HashSet::new();
        let mut retained_files = Vec::with_capacity(days as usize);
        for i in 0..days {
            let Some(date) = days_before(now, i) else {
                break;
            };
            let dir = path_generator.log_path(date);
            retained_files.push(dir.join(file_name_generator.log_file_name(date)));
            retained_dirs.insert(dir);
        }

        let mut sweep = Vec::new();
        let mut last_dir: Option<PathBuf> = None;
        for i in days..SWEEP_HORIZON_DAYS {
            let Some(date) = days_before(now, i) else {
                break;
            };
            let dir = path_generator.log_path(date);
            if retained_dirs.contains(&dir) {
                sweep.push(Sweep::File(dir.join(file_name_generator.log_file_name(date))));
            } else if last_dir.as_ref() != Some(&dir) {
                // Consecutive days usually share a directory; visiting it once is enough.
                sweep.push(Sweep::Directory(dir.clone()));
            }
            last_dir = Some(dir);
        }

        RetentionPlan {
            retained_dirs,
            retained_files,
            sweep,
        }
    }
}

/// Outcome of a successful cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub directories_removed: usize,
}

/// Deletes log files and directories that fall outside the retention window.
#[async_trait]
pub trait LogCleaner: Send + Sync {
    /// Run one cleanup pass, blocking on file I/O.
    ///
    /// Every target is attempted even after a failure; all failures are
    /// returned together as [`LogError::Cleanup`].
    fn cleanup(&self, retention: RetentionDays) -> Result<CleanupReport, LogError>;

    /// Same as [`LogCleaner::cleanup`] without blocking the async runtime.
    ///
    /// The default implementation runs the blocking form inline.
    async fn cleanup_async(&self, retention: RetentionDays) -> Result<CleanupReport, LogError> {
        self.cleanup(retention)
    }
}

/// Cleaner for the directory/file layout produced by the configured generators.
#[derive(Clone)]
pub struct FileLogCleaner {
    path_generator: Arc<dyn PathGenerator>,
    file_name_generator: Arc<dyn FileNameGenerator>,
    clock: Arc<dyn Clock>,
}

impl FileLogCleaner {
    pub fn new(
        path_generator: Arc<dyn PathGenerator>,
        file_name_generator: Arc<dyn FileNameGenerator>,
    ) -> Self {
        FileLogCleaner {
            path_generator,
            file_name_generator,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn plan(&self, retention: RetentionDays) -> RetentionPlan {
        RetentionPlan::new(
            self.clock.now(),
            retention,
            self.path_generator.as_ref(),
            self.file_name_generator.as_ref(),
        )
    }
}

impl Default for FileLogCleaner {
    fn default() -> Self {
        Self::new(
            Arc::new(LogPathGenerator::new()),
            Arc::new(LogFileNameGenerator::new()),
        )
    }
}

#[async_trait]
impl LogCleaner for FileLogCleaner {
    fn cleanup(&self, retention: RetentionDays) -> Result<CleanupReport, LogError> {
        let plan = self.plan(retention);
        let mut report = CleanupReport::default();
        let mut failures = Vec::new();

        for step in &plan.sweep {
            let outcome = match step {
                Sweep::File(path) => remove_file(path).map(|removed| {
                    report.files_removed += usize::from(removed);
                }),
                Sweep::Directory(path) => remove_dir(path).map(|removed| {
                    report.directories_removed += usize::from(removed);
                }),
            };

            if let Err(failure) = outcome {
                warn!(path = %failure.path.display(), error = %failure.source, "failed to remove stale log");
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            info!(
                retention = %retention,
                files = report.files_removed,
                directories = report.directories_removed,
                "log cleanup finished"
            );
            Ok(report)
        } else {
            Err(LogError::Cleanup { failures })
        }
    }

    async fn cleanup_async(&self, retention: RetentionDays) -> Result<CleanupReport, LogError> {
        let cleaner = self.clone();
        tokio::task::spawn_blocking(move || cleaner.cleanup(retention)).await?
    }
}

fn failure(path: &Path, source: io::Error) -> CleanupFailure {
    CleanupFailure {
        path: path.to_path_buf(),
        source,
    }
}

fn remove_file(path: &Path) -> Result<bool, CleanupFailure> {
    // symlink_metadata so a dangling link still counts as present.
    if fs::symlink_metadata(path).is_err() {
        return Ok(false);
    }
    fs::remove_file(path).map_err(|e| failure(path, e))?;
    Ok(true)
}

/// A directory whose canonical form has no parent, such as `/` or `C:\`.
fn is_filesystem_root(path: &Path) -> io::Result<bool> {
    Ok(path.canonicalize()?.parent().is_none())
}

fn remove_dir(path: &Path) -> Result<bool, CleanupFailure> {
    if !path.is_dir() {
        return Ok(false);
    }
    if is_filesystem_root(path).map_err(|e| failure(path, e))? {
        warn!(path = %path.display(), "refusing to remove filesystem root");
        return Ok(false);
    }
    fs::remove_dir_all(path).map_err(|e| failure(path, e))?;
    Ok(true)
}
