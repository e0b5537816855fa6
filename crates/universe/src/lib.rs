//! # Universe Bootstrap - Main Entry Point
//!
//! Loads a server definition out of an archive, gives it an identity, starts
//! the engine for it and keeps it registered until a termination signal
//! arrives.
//!
//! ## Quick Start
//!
//! ```bash
//! # Development: in-memory registry
//! universe --dev --port 30000
//!
//! # Explicit archive and registry
//! universe --jar ./lobby.jar --registry /var/lib/universe/servers
//!
//! # JSON logging for production
//! universe --config production.toml --json-logs
//! ```
//!
//! ## Configuration
//!
//! Settings come from a TOML file (default: `universe.toml`); a missing file
//! means built-in defaults. Command-line flags override the file.
//!
//! ## Exit Codes
//!
//! | code | cause |
//! |------|-------|
//! | 0    | clean shutdown |
//! | 2    | configuration or usage error |
//! | 10   | archive unreadable |
//! | 11   | manifest missing or malformed |
//! | 12   | manifest class could not be resolved |
//! | 13   | manifest class is not a server definition |
//! | 14   | definition constructor failed |
//! | 15   | identity assignment failed |
//! | 16   | engine failed to start |
//! | 17   | server registry failed |
//! | 18   | `on_start` failed |
//! | 130  | shutdown requested during startup |

use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use universe_api::TypeRegistrar;

pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod shutdown;
pub mod signals;

pub use app::{Bootstrap, RunningServer};
pub use cli::CliArgs;
pub use config::{AppConfig, BootstrapConfig, LoggingSettings, ServerSettings, StorageSettings};
pub use engine::ListenerEngine;
pub use error::{error_chain, BootstrapError, ConfigError};
pub use shutdown::ShutdownHook;

/// Definitions compiled into the binary.
///
/// Archives may name these in their manifest without shipping a module.
pub fn builtin_types() -> TypeRegistrar {
    let mut registrar = TypeRegistrar::new();
    definition_lobby::register(&mut registrar);
    registrar
}

/// Runs the bootstrap and returns the process exit code.
///
/// `started_at` should be taken as early as possible in `main`.
pub async fn init(started_at: Instant) -> i32 {
    let args = match CliArgs::try_parse_from(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 2 } else { 0 };
            let _ = e.print();
            return code;
        }
    };

    let config = match BootstrapConfig::resolve(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", error_chain(&e));
            return BootstrapError::from(e).exit_code();
        }
    };

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&config.logging) {
        eprintln!("❌ {}", error_chain(&e));
        return BootstrapError::from(e).exit_code();
    }
    logging::display_banner();

    let bootstrap = Bootstrap::new(
        config,
        Arc::new(ListenerEngine::new()),
        Arc::new(builtin_types()),
        started_at,
    );

    match bootstrap.start().await {
        Ok(server) => {
            server.wait_for_shutdown().await;
            0
        }
        Err(e) => {
            error!("❌ {}", error_chain(&e));
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types_include_lobby() {
        let builtin = builtin_types();
        assert!(builtin.contains("lobby.LobbyServer"));
        assert!(builtin.contains("lobby.PlayerCountHook"));
    }
}
