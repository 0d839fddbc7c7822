use crate::manager::LogManager;
use crate::record::{LogLevel, LogRecord};
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to a [`LogManager`] through a bounded channel and background
/// task.
///
/// Only INFO, WARN and ERROR events map to a [`LogLevel`]; more verbose
/// events are ignored. Events emitted by this crate itself are skipped so
/// that write diagnostics never feed back into the log file. File I/O is
/// fully decoupled from application threads.
pub struct JsonFileLayer {
    sender: mpsc::Sender<LogRecord>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or the writer task is gone.
    pub dropped_events: Arc<AtomicU64>,
}

impl JsonFileLayer {
    /// Create a new layer and spawn a background task that pulls
    /// [`LogRecord`]s from a bounded channel and writes them through
    /// `manager`. Write outcomes surface through the manager's notifications.
    ///
    /// `buffer` is raised to at least 16. `min_level` below INFO behaves
    /// like INFO.
    pub fn new(manager: Arc<LogManager>, buffer: usize, min_level: Level) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                manager.write_entry_async(record).await;
            }
        });

        (Self {
            sender: tx,
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }, handle)
    }
}

fn map_level(level: &Level) -> Option<LogLevel> {
    match *level {
        Level::ERROR => Some(LogLevel::Error),
        Level::WARN => Some(LogLevel::Warning),
        Level::INFO => Some(LogLevel::Information),
        _ => None,
    }
}

impl<S> Layer<S> for JsonFileLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if *meta.level() > self.min_level || meta.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }
        let Some(level) = map_level(meta.level()) else {
            return;
        };

        let mut fields = BTreeMap::new();
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: None,
            event_id: None,
            exception: None,
        };
        event.record(&mut visitor);
        let FieldVisitor { message, event_id, exception, .. } = visitor;

        let mut record = LogRecord::new(level, message.unwrap_or_default());
        record.event_id = event_id;
        record.exception_text = exception;
        fields.insert("target".to_string(), serde_json::Value::from(meta.target()));
        record.additional_data = Some(fields);

        if self.sender.try_send(record).is_ok() {
            self.enqueued_events.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("json log channel full, dropping log record");
        }
    }
}

use tracing::field::{Field, Visit};

/// Splits an event's fields into the record's message, `event_id`,
/// exception text (`exception` or `error`) and the remaining
/// `additional_data` entries.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
    pub event_id: Option<i32>,
    pub exception: Option<String>,
}

impl FieldVisitor<'_> {
    fn record_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "exception" | "error" => self.exception = Some(value),
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }

    fn record_number(&mut self, field: &Field, value: serde_json::Value, as_i32: Option<i32>) {
        if field.name() == "event_id" {
            if let Some(id) = as_i32 {
                self.event_id = Some(id);
                return;
            }
        }
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_number(field, serde_json::Value::from(value), i32::try_from(value).ok());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_number(field, serde_json::Value::from(value), i32::try_from(value).ok());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_text(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_text(field, format!("{:?}", value));
    }
}
