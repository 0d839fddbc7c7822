use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a [`LogRecord`].
///
/// Serialized as its integer value (`2`, `3`, `4`) so files stay readable
/// by consumers that key on the numeric level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LogLevel {
    Information = 2,
    Warning = 3,
    Error = 4,
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> u8 {
        level as u8
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            2 => Ok(LogLevel::Information),
            3 => Ok(LogLevel::Warning),
            4 => Ok(LogLevel::Error),
            other => Err(format!("unknown log level {other}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
        };
        f.write_str(name)
    }
}

/// One element of a period file's JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub exception_text: Option<String>,
    pub event_id: Option<i32>,
    pub additional_data: Option<BTreeMap<String, serde_json::Value>>,
}

impl LogRecord {
    /// Create a record stamped with the current local time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self::at(Local::now(), level, message)
    }

    pub fn at(timestamp: DateTime<Local>, level: LogLevel, message: impl Into<String>) -> Self {
        LogRecord {
            level,
            message: message.into(),
            timestamp,
            exception_text: None,
            event_id: None,
            additional_data: None,
        }
    }

    pub fn with_exception(mut self, text: impl Into<String>) -> Self {
        self.exception_text = Some(text.into());
        self
    }

    pub fn with_event_id(mut self, event_id: i32) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_additional_data(mut self, data: BTreeMap<String, serde_json::Value>) -> Self {
        self.additional_data = Some(data);
        self
    }

    /// Insert one key into `additional_data`, creating the map on first use.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.additional_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}
