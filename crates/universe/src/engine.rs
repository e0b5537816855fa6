//! Minimal engine: binds the requested address and accepts connections.
//!
//! It has no game loop. Accepted connections are closed right away, so the
//! port is observably open while the server runs.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use universe_api::{Engine, EngineError, ServerProcess, ShutdownState};

#[derive(Debug, Default)]
pub struct ListenerEngine {
    accept_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ListenerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.accept_loop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl Engine for ListenerEngine {
    async fn start(
        &self,
        address: &str,
        port: u16,
        shutdown: ShutdownState,
    ) -> Result<ServerProcess, EngineError> {
        let bind_error = |source| EngineError::Bind {
            address: address.to_string(),
            port,
            source,
        };

        let listener = TcpListener::bind((address, port)).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let state = shutdown.clone();
        let accept_loop = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        if state.is_shutdown_initiated() {
                            break;
                        }
                        debug!("🔗 Connection from {} closed: no game runtime attached", peer);
                        drop(stream);
                    }
                    Err(e) => {
                        warn!("⚠️ Accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        let previous = self
            .accept_loop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(accept_loop);
        if let Some(previous) = previous {
            previous.abort();
        }

        info!("🎮 Engine listening on {}", local_addr);
        Ok(ServerProcess::new(address, local_addr, shutdown))
    }

    async fn stop(&self, process: &ServerProcess) {
        let accept_loop = self
            .accept_loop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(accept_loop) = accept_loop {
            accept_loop.abort();
            info!("🛑 Engine on {} stopped", process.local_addr());
        }
    }
}
