//! The running engine as seen by hooks and definitions.
//!
//! The game engine itself lives outside this workspace. The bootstrap only
//! needs to start it on an address and port, and to pass the resulting
//! [`ServerProcess`] handle to every hook and to the definition.

use crate::shutdown::ShutdownState;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

/// Errors reported by an [`Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not bind the requested address.
    #[error("couldn't bind {address}:{port}: {source}")]
    Bind {
        address: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The engine failed for any other reason while starting.
    #[error("engine failed to start: {0}")]
    Start(String),
}

/// Handle to a started engine process.
///
/// Cheap to clone; clones refer to the same process. Use
/// [`ServerProcess::same_process`] to check whether two handles do.
#[derive(Clone)]
pub struct ServerProcess {
    inner: Arc<ProcessInner>,
}

struct ProcessInner {
    address: String,
    local_addr: SocketAddr,
    started_at: SystemTime,
    shutdown: ShutdownState,
}

impl ServerProcess {
    /// Creates a handle for a process bound to `local_addr`.
    ///
    /// `address` is the address the process was asked to bind, which may be a
    /// host name such as `localhost`.
    pub fn new(address: impl Into<String>, local_addr: SocketAddr, shutdown: ShutdownState) -> Self {
        Self {
            inner: Arc::new(ProcessInner {
                address: address.into(),
                local_addr,
                started_at: SystemTime::now(),
                shutdown,
            }),
        }
    }

    /// The address the engine was asked to bind.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// The socket address the engine actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    pub fn started_at(&self) -> SystemTime {
        self.inner.started_at
    }

    /// Shutdown state shared with the bootstrap.
    pub fn shutdown_state(&self) -> &ShutdownState {
        &self.inner.shutdown
    }

    pub fn same_process(&self, other: &ServerProcess) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProcess")
            .field("address", &self.inner.address)
            .field("local_addr", &self.inner.local_addr)
            .finish()
    }
}

/// The engine collaborator consumed by the bootstrap.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Starts the engine on `address:port`.
    ///
    /// The returned handle must carry `shutdown` so hooks observe the same
    /// shutdown state as the bootstrap.
    async fn start(
        &self,
        address: &str,
        port: u16,
        shutdown: ShutdownState,
    ) -> Result<ServerProcess, EngineError>;

    /// Stops the engine. Called once after the shutdown handler ran.
    async fn stop(&self, _process: &ServerProcess) {}
}
