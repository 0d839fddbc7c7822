use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Error type carried by write and cleanup failure notifications.
///
/// [`crate::manager::LogManager`] never returns these to its caller; they
/// only reach subscribers of the failure callbacks.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The existing period file is not a JSON array. The file is left as-is.
    #[error("malformed log file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize log entries: {0}")]
    Serialize(#[source] serde_json::Error),

    /// One or more cleanup targets could not be removed.
    #[error("cleanup failed for {} path(s): {}", .failures.len(), FailureList(.failures))]
    Cleanup { failures: Vec<CleanupFailure> },

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LogError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        LogError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// A single file or directory the cleaner failed to remove.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

struct FailureList<'a>(&'a [CleanupFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_error_lists_every_failed_path() {
        let err = LogError::Cleanup {
            failures: vec![
                CleanupFailure {
                    path: PathBuf::from("Logs/202401/Log_20240101.json"),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                },
                CleanupFailure {
                    path: PathBuf::from("Logs/202312"),
                    source: io::Error::new(io::ErrorKind::Other, "busy"),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.starts_with("cleanup failed for 2 path(s)"));
        assert!(text.contains("Log_20240101.json: denied"));
        assert!(text.contains("202312: busy"));
    }
}
