//! Logging system setup.
//!
//! One `tracing-subscriber` registry is installed at startup. `RUST_LOG`
//! takes precedence over the configured level.

use crate::config::LoggingSettings;
use crate::error::ConfigError;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global subscriber.
///
/// Fails if the level does not parse or a subscriber is already installed.
pub fn setup_logging(config: &LoggingSettings) -> Result<(), ConfigError> {
    let log_level = config.level.as_str();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| ConfigError::Logging(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🌌 UNIVERSE BOOTSTRAP          ║");
    info!("║                 v{:<24}║", version);
    info!("║                                          ║");
    info!("║  📦 Server archives     🪝 Server hooks   ║");
    info!("║  🆔 Server identity     🗂️  Registry       ║");
    info!("╚══════════════════════════════════════════╝");
    info!("🔧 {}", universe_api::universe_build_info());
}
