//! The server definition contract and its host-side wrapper.
//!
//! Definition authors implement [`ServerDefinition`]. The loader constructs
//! the definition through its [`DefinitionFactory`] and wraps it in a
//! [`UniverseServer`], which owns everything the bootstrap controls: the hook
//! registry built at construction, the write-once identity, and the
//! lifecycle state that makes `on_start` run at most once, `on_stop` run at
//! most once, and the two never overlap.

use crate::hooks::{HookDeclarations, HookRegistry, HookResolver};
use crate::identity::{IdentityAssigner, IdentitySlot};
use crate::process::ServerProcess;
use crate::types::ServerId;
use crate::{panic_message, BoxError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Span};

/// A game server packaged in an archive and launched by the bootstrap.
///
/// All methods have no-op defaults, so the smallest definition is an empty
/// `impl ServerDefinition for MyServer {}`.
pub trait ServerDefinition: Any + Send + Sync {
    /// Declares the hooks this definition composes.
    ///
    /// Called once per construction. Each declared hook type is instantiated
    /// once and activated after the engine has started.
    fn declare_hooks(_hooks: &mut HookDeclarations)
    where
        Self: Sized,
    {
    }

    /// Display name of the server. `None` falls back to the manifest name.
    fn name(&self) -> Option<String> {
        None
    }

    /// Called once after the engine has started and every hook was activated.
    ///
    /// `hooks` is the read-only registry built at construction; use
    /// [`HookRegistry::get`] for typed access to declared hooks.
    fn on_start(&self, _process: &ServerProcess, _hooks: &HookRegistry) {}

    /// Called at most once from the shutdown path.
    ///
    /// May run without a preceding `on_start` if shutdown was requested while
    /// the server was still starting.
    fn on_stop(&self) {}
}

/// Where a [`UniverseServer`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Stopped,
}

/// Failures raised while driving a definition's lifecycle callbacks.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("`on_start` of `{definition}` panicked: {message}")]
    StartPanicked { definition: String, message: String },
}

struct DefinitionInstance {
    definition: Arc<dyn ServerDefinition>,
    any: Arc<dyn Any + Send + Sync>,
}

type DefinitionConstructor = Arc<dyn Fn() -> Result<DefinitionInstance, BoxError> + Send + Sync>;

/// Zero-argument constructor for one definition type.
#[derive(Clone)]
pub struct DefinitionFactory {
    rust_type: &'static str,
    construct: DefinitionConstructor,
    declare_hooks: fn(&mut HookDeclarations),
}

impl DefinitionFactory {
    /// Factory using the definition's `Default` implementation.
    pub fn of<D: ServerDefinition + Default>() -> Self {
        Self::with(|| Ok(D::default()))
    }

    /// Factory using a fallible constructor.
    pub fn with<D, F>(constructor: F) -> Self
    where
        D: ServerDefinition,
        F: Fn() -> Result<D, BoxError> + Send + Sync + 'static,
    {
        Self {
            rust_type: std::any::type_name::<D>(),
            construct: Arc::new(move || {
                let definition = Arc::new(constructor()?);
                Ok(DefinitionInstance {
                    definition: definition.clone(),
                    any: definition,
                })
            }),
            declare_hooks: D::declare_hooks,
        }
    }

    /// Rust path of the definition type behind this factory.
    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }

    /// Constructs the definition and materialises its hooks.
    ///
    /// `type_name` is the name the definition was resolved under; it labels
    /// log lines. Named hook declarations are resolved through `resolver`.
    /// Returns the wrapped server together with the only writer of its
    /// identity slot.
    pub fn instantiate(
        &self,
        type_name: &str,
        resolver: &dyn HookResolver,
    ) -> Result<(UniverseServer, IdentityAssigner), BoxError> {
        let instance = catch_unwind(AssertUnwindSafe(|| (self.construct)()))
            .unwrap_or_else(|payload| Err(panic_message(payload).into()))?;

        let mut declarations = HookDeclarations::new();
        catch_unwind(AssertUnwindSafe(|| (self.declare_hooks)(&mut declarations)))
            .map_err(|payload| format!("declaring hooks {}", panic_message(payload)))?;

        let hooks = HookRegistry::discover(type_name, declarations, resolver);
        let (identity, assigner) = IdentitySlot::new();

        let server = UniverseServer {
            type_name: type_name.to_string(),
            definition: instance.definition,
            any: instance.any,
            hooks,
            identity,
            hooks_activated: AtomicBool::new(false),
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::Created),
            span: info_span!("server", definition = %type_name),
        };

        Ok((server, assigner))
    }
}

impl std::fmt::Debug for DefinitionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionFactory")
            .field("rust_type", &self.rust_type)
            .finish()
    }
}

/// A constructed definition together with its hooks and identity.
pub struct UniverseServer {
    type_name: String,
    definition: Arc<dyn ServerDefinition>,
    any: Arc<dyn Any + Send + Sync>,
    hooks: HookRegistry,
    identity: IdentitySlot,
    hooks_activated: AtomicBool,
    started: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    span: Span,
}

impl UniverseServer {
    /// Name the definition type was resolved under.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The definition's own display name, if it provides one.
    pub fn name(&self) -> Option<String> {
        self.definition.name()
    }

    /// Read-only view of the hooks built at construction.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The assigned identity, or `None` until the bootstrap assigned it.
    pub fn identity(&self) -> Option<ServerId> {
        self.identity.get()
    }

    pub fn identity_slot(&self) -> &IdentitySlot {
        &self.identity
    }

    /// Downcasts to the concrete definition type.
    pub fn definition<D: ServerDefinition>(&self) -> Option<&D> {
        self.any.downcast_ref::<D>()
    }

    /// Activates every hook once with `process`, in declaration order.
    ///
    /// A panicking hook is logged and does not prevent the remaining hooks
    /// from being activated. Returns the number of hooks that completed;
    /// calls after the first activate nothing and return 0.
    pub fn activate_hooks(&self, process: &ServerProcess) -> usize {
        let _guard = self.span.enter();

        if self.hooks_activated.swap(true, Ordering::AcqRel) {
            warn!("⚠️ Hooks were already activated; ignoring");
            return 0;
        }

        let mut activated = 0;

        for (key, hook) in self.hooks.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| hook.hook(process))) {
                Ok(()) => {
                    debug!("🪝 Hook activated: {}", key);
                    activated += 1;
                }
                Err(payload) => {
                    error!("❌ Hook {} {}", key, panic_message(payload));
                }
            }
        }

        activated
    }

    /// Invokes `on_start` unless it already ran or the server was stopped.
    ///
    /// The lifecycle lock is held while `on_start` runs, so a concurrent
    /// [`stop`](Self::stop) waits for it to return.
    pub fn start(&self, process: &ServerProcess) -> Result<(), LifecycleError> {
        let _guard = self.span.enter();
        let mut lifecycle = self.lock_lifecycle();

        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Started => {
                warn!("⚠️ on_start was already invoked; ignoring");
                return Ok(());
            }
            Lifecycle::Stopped => {
                warn!("⚠️ Server was stopped before it started; skipping on_start");
                return Ok(());
            }
        }
        *lifecycle = Lifecycle::Started;
        self.started.store(true, Ordering::Release);

        catch_unwind(AssertUnwindSafe(|| self.definition.on_start(process, &self.hooks))).map_err(
            |payload| LifecycleError::StartPanicked {
                definition: self.type_name.clone(),
                message: panic_message(payload),
            },
        )?;

        info!("✅ Server definition started");
        Ok(())
    }

    /// Invokes `on_stop` unless it already ran.
    ///
    /// Calls are mutually exclusive with each other and with `on_start`: a
    /// caller arriving while either runs waits for it to return. Once stopped,
    /// the server never starts. Returns `true` if this call invoked `on_stop`.
    pub fn stop(&self) -> bool {
        let _guard = self.span.enter();
        let mut lifecycle = self.lock_lifecycle();

        if *lifecycle == Lifecycle::Stopped {
            debug!("on_stop already ran");
            return false;
        }
        *lifecycle = Lifecycle::Stopped;

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.definition.on_stop())) {
            error!("❌ on_stop {}", panic_message(payload));
        } else {
            info!("🛑 Server definition stopped");
        }

        true
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lock_lifecycle()
    }

    /// Whether `on_start` was invoked. Stays `true` after a later stop.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle() == Lifecycle::Stopped
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for UniverseServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniverseServer")
            .field("type_name", &self.type_name)
            .field("identity", &self.identity.get())
            .field("hooks", &self.hooks)
            .finish()
    }
}
