use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use json_file_log::init::init_tracing;
use json_file_log::schedule::spawn_periodic_cleanup;
use json_file_log::{LogLevel, LogManager, LogManagerConfig, LogRecord};

#[tokio::main]
async fn main() {
    let manager = Arc::new(LogManager::new(LogManagerConfig::from_env()));

    manager.on_log_write_failed(|record, error| {
        eprintln!("[json-file-log] dropped {:?}: {}", record.message, error);
    });
    manager.on_cleanup_failed(|error| {
        eprintln!("[json-file-log] cleanup failed: {}", error);
    });

    // Direct writes, blocking and async.
    manager.write(LogLevel::Information, "service starting");
    manager
        .write_entry_async(
            LogRecord::new(LogLevel::Warning, "config file missing, using defaults")
                .with_event_id(1001)
                .with_field("path", "/etc/app.toml"),
        )
        .await;

    // Everything logged through `tracing` lands in the same file.
    init_tracing(Arc::clone(&manager)).expect("install tracing subscriber");
    info!(user_id = 42, "user signed in");
    error!(event_id = 2001, error = "connection reset", "upstream call failed");

    let cleanup = spawn_periodic_cleanup(Arc::clone(&manager), Duration::from_secs(24 * 60 * 60));

    // Give the writer task a moment to drain the channel.
    sleep(Duration::from_secs(1)).await;
    cleanup.abort();
}
