use crate::cleaner::CleanupReport;
use crate::error::LogError;
use crate::record::LogRecord;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type LogWrittenFn = dyn Fn(&LogRecord) + Send + Sync;
pub type LogWriteFailedFn = dyn Fn(&LogRecord, &LogError) + Send + Sync;
pub type CleanupSucceededFn = dyn Fn(&CleanupReport) + Send + Sync;
pub type CleanupFailedFn = dyn Fn(&LogError) + Send + Sync;

/// Handle returned by every `on_*` registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Callbacks<F: ?Sized> {
    entries: RwLock<Vec<(SubscriptionId, Arc<F>)>>,
}

impl<F: ?Sized> Default for Callbacks<F> {
    fn default() -> Self {
        Callbacks {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<F: ?Sized> Callbacks<F> {
    fn add(&self, id: SubscriptionId, callback: Arc<F>) {
        self.entries.write().push((id, callback));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    // Callbacks run on a snapshot so they may (un)subscribe without deadlocking.
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.read().iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }
}

/// Subscriber lists for the four write/cleanup notifications.
#[derive(Default)]
pub struct LogEvents {
    next_id: AtomicU64,
    log_written: Callbacks<LogWrittenFn>,
    log_write_failed: Callbacks<LogWriteFailedFn>,
    cleanup_succeeded: Callbacks<CleanupSucceededFn>,
    cleanup_failed: Callbacks<CleanupFailedFn>,
}

impl LogEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_log_written<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.log_written.add(id, Arc::new(callback));
        id
    }

    pub fn on_log_write_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LogRecord, &LogError) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.log_write_failed.add(id, Arc::new(callback));
        id
    }

    pub fn on_cleanup_succeeded<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CleanupReport) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.cleanup_succeeded.add(id, Arc::new(callback));
        id
    }

    pub fn on_cleanup_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.cleanup_failed.add(id, Arc::new(callback));
        id
    }

    /// Remove a subscription from whichever list holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.log_written.remove(id)
            || self.log_write_failed.remove(id)
            || self.cleanup_succeeded.remove(id)
            || self.cleanup_failed.remove(id)
    }

    pub(crate) fn log_written(&self, record: &LogRecord) {
        for callback in self.log_written.snapshot() {
            callback(record);
        }
    }

    pub(crate) fn log_write_failed(&self, record: &LogRecord, error: &LogError) {
        for callback in self.log_write_failed.snapshot() {
            callback(record, error);
        }
    }

    pub(crate) fn cleanup_succeeded(&self, report: &CleanupReport) {
        for callback in self.cleanup_succeeded.snapshot() {
            callback(report);
        }
    }

    pub(crate) fn cleanup_failed(&self, error: &LogError) {
        for callback in self.cleanup_failed.snapshot() {
            callback(error);
        }
    }
}
