//! The shutdown handler registered once the server has its identity.
//!
//! Running it deregisters the server from storage and stops the definition.
//! It does its work at most once; later callers wait for that run to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, info_span, Span};
use universe_api::{ShutdownState, UniverseServer};
use universe_storage::ServerStorage;

pub struct ShutdownHook {
    storage: Arc<dyn ServerStorage>,
    server: Arc<UniverseServer>,
    state: ShutdownState,
    fired: AtomicBool,
    finished: AtomicBool,
    done: Notify,
    span: Span,
}

impl ShutdownHook {
    pub fn new(storage: Arc<dyn ServerStorage>, server: Arc<UniverseServer>, state: ShutdownState) -> Self {
        Self {
            storage,
            server,
            state,
            fired: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            done: Notify::new(),
            span: info_span!("shutdown"),
        }
    }

    /// Runs the handler, or waits for the run already in progress.
    ///
    /// Returns `true` if this call did the work.
    pub async fn run(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            self.wait().await;
            return false;
        }

        self.state.initiate_shutdown();
        self.span.in_scope(|| info!("🧹 Running shutdown handler"));

        match self.storage.remove_server().await {
            Ok(true) => self
                .span
                .in_scope(|| info!("✅ Server removed from {} registry", self.storage.backend_name())),
            Ok(false) => {}
            Err(e) => self
                .span
                .in_scope(|| error!("❌ Failed to remove server from registry: {}", e)),
        }

        let server = self.server.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || server.stop()).await {
            self.span.in_scope(|| error!("❌ Stopping the server definition failed: {}", e));
        }

        self.state.complete_shutdown();
        self.finished.store(true, Ordering::Release);
        self.done.notify_waiters();
        true
    }

    /// Waits until a run of the handler has finished.
    pub async fn wait(&self) {
        loop {
            let notified = self.done.notified();
            if self.finished.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn state(&self) -> &ShutdownState {
        &self.state
    }
}
