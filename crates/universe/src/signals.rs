//! Termination signal handling.
//!
//! Unix: SIGINT and SIGTERM. Windows: Ctrl+C.

use tokio::signal;
use tracing::info;

/// Waits for the first termination signal and logs it.
pub async fn wait_for_termination() -> std::io::Result<()> {
    wait_for_termination_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Waits for the next termination signal without logging.
pub async fn wait_for_termination_silent() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
