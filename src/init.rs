use crate::layer::JsonFileLayer;
use crate::manager::LogManager;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Settings for the `tracing` bridge.
///
/// **Fields**
/// - `channel_buffer`: records queued for the writer task before new ones
///   are dropped.
/// - `min_level`: least severe level that is persisted (INFO at most).
/// - `enable_stdout`: also print events to the console through a `fmt` layer.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that persists events through
/// `manager`.
///
/// **Returns**
/// - the writer task handle; it ends once the subscriber is dropped.
/// - `Err(..)` if a global subscriber was already installed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    manager: Arc<LogManager>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    let (layer, handle) = JsonFileLayer::new(manager, config.channel_buffer, config.min_level);

    // Two subscriber shapes, because the fmt layer changes the type.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(manager: Arc<LogManager>) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    init_tracing_with_config(manager, LayerConfig::default())
}
