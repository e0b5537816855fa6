//! Startup sequencing and the running phase.
//!
//! [`Bootstrap::start`] runs the startup steps strictly in order on the
//! calling task:
//!
//! 1. select the storage backend
//! 2. load the archive
//! 3. resolve the display name
//! 4. assign the server identity
//! 5. register the shutdown handler and the signal listener
//! 6. start the engine
//! 7. activate hooks
//! 8. call `on_start`
//! 9. insert the server record
//!
//! A fatal failure after step 5 runs the shutdown handler before the error
//! is returned. A termination signal during startup runs the handler at once
//! and aborts the sequence at the next step boundary.

use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::shutdown::ShutdownHook;
use crate::signals::{wait_for_termination, wait_for_termination_silent};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument, Span};
use universe_api::{Engine, ServerId, ServerProcess, ShutdownState, TypeRegistrar, UniverseServer};
use universe_loader::{ArchiveLoader, LoadedDefinition, ModuleNamespace, UniverseManifest};
use universe_storage::{FileServerStorage, MemoryServerStorage, ServerRecord, ServerStorage};

/// Picks the registry backend: in memory for development, on disk otherwise.
pub async fn select_storage(config: &BootstrapConfig) -> Result<Arc<dyn ServerStorage>, BootstrapError> {
    if config.development_mode {
        info!("🧪 Development mode: server registry kept in memory");
        Ok(Arc::new(MemoryServerStorage::new()))
    } else {
        let storage = FileServerStorage::open(&config.registry_dir).await?;
        info!("🗂️ Server registry: {}", storage.dir().display());
        Ok(Arc::new(storage))
    }
}

/// Display name: the definition's own, else the manifest's, else the archive stem.
pub fn resolve_display_name(server: &UniverseServer, manifest: &UniverseManifest, archive: &Path) -> String {
    if let Some(name) = server.name().filter(|name| !name.trim().is_empty()) {
        return name;
    }

    if let Some(name) = manifest.name().filter(|name| !name.trim().is_empty()) {
        return name.to_string();
    }

    let fallback = archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| server.type_name().to_string());
    warn!(
        "⚠️ Neither the definition nor the manifest provides a name; using '{}'",
        fallback
    );
    fallback
}

pub struct Bootstrap {
    config: BootstrapConfig,
    engine: Arc<dyn Engine>,
    builtin: Arc<TypeRegistrar>,
    storage: Option<Arc<dyn ServerStorage>>,
    started_at: Instant,
    listen_for_signals: bool,
    span: Span,
}

impl Bootstrap {
    /// `started_at` is the process entry time used for the startup report.
    pub fn new(
        config: BootstrapConfig,
        engine: Arc<dyn Engine>,
        builtin: Arc<TypeRegistrar>,
        started_at: Instant,
    ) -> Self {
        Self {
            config,
            engine,
            builtin,
            storage: None,
            started_at,
            listen_for_signals: true,
            span: info_span!("bootstrap"),
        }
    }

    /// Uses `storage` instead of the backend the configuration selects.
    pub fn with_storage(mut self, storage: Arc<dyn ServerStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Skips installing OS signal listeners; shutdown then has to be
    /// triggered through [`RunningServer::shutdown`].
    pub fn without_signal_listener(mut self) -> Self {
        self.listen_for_signals = false;
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Runs the startup sequence.
    pub async fn start(self) -> Result<RunningServer, BootstrapError> {
        let span = self.span.clone();
        self.start_inner().instrument(span).await
    }

    async fn start_inner(self) -> Result<RunningServer, BootstrapError> {
        let config = &self.config;
        info!(
            "🚀 Starting server from {} on {}:{}",
            config.archive_path.display(),
            config.address,
            config.port
        );

        let storage = match &self.storage {
            Some(storage) => storage.clone(),
            None => select_storage(config).await?,
        };

        let loader = ArchiveLoader::new(self.builtin.clone(), config.module_safety);
        let LoadedDefinition {
            server,
            identity,
            manifest,
            namespace,
        } = loader.load(&config.archive_path)?;

        let display_name = resolve_display_name(&server, &manifest, &config.archive_path);

        let id = identity.assign(ServerId::new())?;
        info!("🆔 Server '{}' assigned id {}", display_name, id);

        let shutdown = ShutdownState::new();
        let hook = Arc::new(ShutdownHook::new(storage.clone(), server.clone(), shutdown.clone()));
        if self.listen_for_signals {
            spawn_signal_listener(hook.clone());
        }

        let mut startup = Startup {
            engine: self.engine.clone(),
            hook: hook.clone(),
            process: None,
        };

        if let Err(e) = startup.checkpoint("engine start") {
            return Err(startup.abort(e).await);
        }
        let process = match self.engine.start(&config.address, config.port, shutdown.clone()).await {
            Ok(process) => process,
            Err(e) => return Err(startup.abort(e.into()).await),
        };
        startup.process = Some(process.clone());

        if let Err(e) = startup.checkpoint("hook activation") {
            return Err(startup.abort(e).await);
        }
        let activated = server.activate_hooks(&process);
        info!("🪝 Activated {}/{} hooks", activated, server.hooks().len());

        if let Err(e) = startup.checkpoint("on_start") {
            return Err(startup.abort(e).await);
        }
        if let Err(e) = server.start(&process) {
            return Err(startup.abort(e.into()).await);
        }

        if let Err(e) = startup.checkpoint("registration") {
            return Err(startup.abort(e).await);
        }
        let record = ServerRecord::for_process(id, display_name.clone(), &process);
        if let Err(e) = storage.insert_server(record).await {
            return Err(startup.abort(e.into()).await);
        }
        if shutdown.is_shutdown_initiated() {
            // The handler may have run before the record existed
            if let Err(e) = storage.remove_server().await {
                error!("❌ Failed to remove server from registry: {}", e);
            }
            return Err(startup.abort(BootstrapError::Interrupted { step: "startup report" }).await);
        }

        info!(
            "✅ Server '{}' ({}) started in {:.2?}",
            display_name,
            id,
            self.started_at.elapsed()
        );

        Ok(RunningServer {
            id,
            display_name,
            server,
            process,
            storage,
            engine: self.engine.clone(),
            hook,
            manifest,
            _namespace: namespace,
        })
    }
}

/// Cleanup state for a startup that has registered its shutdown handler.
struct Startup {
    engine: Arc<dyn Engine>,
    hook: Arc<ShutdownHook>,
    process: Option<ServerProcess>,
}

impl Startup {
    fn checkpoint(&self, step: &'static str) -> Result<(), BootstrapError> {
        if self.hook.state().is_shutdown_initiated() {
            warn!("🛑 Shutdown requested; aborting startup before {}", step);
            return Err(BootstrapError::Interrupted { step });
        }
        Ok(())
    }

    /// Runs the shutdown handler and stops the engine if it started.
    async fn abort(&self, error: BootstrapError) -> BootstrapError {
        self.hook.run().await;
        if let Some(process) = &self.process {
            self.engine.stop(process).await;
        }
        error
    }
}

fn spawn_signal_listener(hook: Arc<ShutdownHook>) {
    tokio::spawn(async move {
        if let Err(e) = wait_for_termination().await {
            error!("❌ Failed to listen for shutdown signals: {}", e);
            return;
        }

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_termination_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown signal received again! I'll make this quick.");
            std::process::exit(1);
        });

        hook.run().await;
    });
}

/// A server that finished its startup sequence.
pub struct RunningServer {
    id: ServerId,
    display_name: String,
    server: Arc<UniverseServer>,
    process: ServerProcess,
    storage: Arc<dyn ServerStorage>,
    engine: Arc<dyn Engine>,
    hook: Arc<ShutdownHook>,
    manifest: UniverseManifest,
    _namespace: ModuleNamespace,
}

impl RunningServer {
    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn server(&self) -> &Arc<UniverseServer> {
        &self.server
    }

    pub fn process(&self) -> &ServerProcess {
        &self.process
    }

    pub fn storage(&self) -> &Arc<dyn ServerStorage> {
        &self.storage
    }

    pub fn manifest(&self) -> &UniverseManifest {
        &self.manifest
    }

    pub fn shutdown_handler(&self) -> &Arc<ShutdownHook> {
        &self.hook
    }

    /// Waits until the shutdown handler ran, then stops the engine.
    pub async fn wait_for_shutdown(self) {
        info!("🛑 Press Ctrl+C to shut down");
        self.hook.wait().await;
        self.finish().await;
    }

    /// Runs the shutdown handler now, then stops the engine.
    pub async fn shutdown(self) {
        self.hook.run().await;
        self.finish().await;
    }

    async fn finish(self) {
        self.engine.stop(&self.process).await;
        info!("👋 Server '{}' ({}) shut down", self.display_name, self.id);
    }
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("process", &self.process)
            .field("storage", &self.storage.backend_name())
            .finish()
    }
}
