#![allow(dead_code)]

use chrono::{DateTime, Days, Local, TimeZone};
use json_file_log::clock::FixedClock;
use json_file_log::{
    FileNameGenerator, LogFileNameGenerator, LogManager, LogManagerConfig, LogPathGenerator,
    PathGenerator, PathType,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Noon keeps every date valid on DST transition days.
pub fn noon(y: i32, m: u32, d: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, 12, 0, 0).single().unwrap()
}

pub fn days_ago(now: DateTime<Local>, days: u32) -> DateTime<Local> {
    now.checked_sub_days(Days::new(u64::from(days))).unwrap()
}

pub struct Fixture {
    pub dir: TempDir,
    pub clock: Arc<FixedClock>,
    pub manager: Arc<LogManager>,
    pub paths: LogPathGenerator,
    pub names: LogFileNameGenerator,
}

impl Fixture {
    pub fn new(now: DateTime<Local>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let clock = Arc::new(FixedClock::new(now));
        let manager = Arc::new(LogManager::with_clock(
            LogManagerConfig::absolute(dir.path()),
            clock.clone(),
        ));
        let paths = LogPathGenerator::with_base(PathType::Absolute, dir.path());

        Fixture {
            dir,
            clock,
            manager,
            paths,
            names: LogFileNameGenerator::new(),
        }
    }

    pub fn file_for(&self, date: DateTime<Local>) -> PathBuf {
        self.paths.log_path(date).join(self.names.log_file_name(date))
    }

    /// Create an empty file for each of the last `days` days.
    pub fn seed_days(&self, now: DateTime<Local>, days: u32) {
        for i in 0..days {
            let file = self.file_for(days_ago(now, i));
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(&file, "").unwrap();
        }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }
}

pub fn read_array(path: &Path) -> Vec<serde_json::Value> {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}
