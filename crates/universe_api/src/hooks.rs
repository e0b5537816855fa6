//! Hook declarations and the per-definition hook registry.
//!
//! A definition lists the hook types it composes in
//! [`ServerDefinition::declare_hooks`](crate::ServerDefinition::declare_hooks).
//! When the definition is constructed, [`HookRegistry::discover`] turns those
//! declarations into exactly one instance per hook type. A hook that cannot be
//! constructed is logged and left out; it never prevents the definition from
//! being built.
//!
//! After the engine has started, the bootstrap activates every hook once with
//! the [`ServerProcess`] handle, in declaration order.

use crate::process::ServerProcess;
use crate::{panic_message, BoxError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

/// An extension activated once against the running engine.
///
/// Construction should stay cheap and engine-independent: the engine is not
/// running yet when hooks are created. Engine work belongs in [`ServerHook::hook`].
pub trait ServerHook: Any + Send + Sync {
    fn hook(&self, process: &ServerProcess);
}

/// Key identifying a hook type inside a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl HookKey {
    pub fn of<H: ServerHook>() -> Self {
        Self {
            type_id: TypeId::of::<H>(),
            type_name: std::any::type_name::<H>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full Rust path of the hook type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the hook type, for log lines.
    pub fn short_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }
}

impl std::fmt::Display for HookKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Non-fatal failures while materialising declared hooks.
#[derive(Debug, Error)]
pub enum HookDiscoveryError {
    #[error("couldn't find a zero-argument constructor for hook `{0}`")]
    MissingConstructor(String),

    #[error("couldn't create instance of hook `{hook}`: {source}")]
    Construction {
        hook: String,
        #[source]
        source: BoxError,
    },

    #[error("hook `{0}` is declared more than once; keeping the first declaration")]
    Duplicate(String),
}

/// One constructed hook, reachable both as a trait object and as `Any` for
/// typed lookups.
#[derive(Clone)]
struct HookInstance {
    hook: Arc<dyn ServerHook>,
    any: Arc<dyn Any + Send + Sync>,
}

type HookConstructor = Arc<dyn Fn() -> Result<HookInstance, BoxError> + Send + Sync>;

/// Zero-argument constructor for one hook type.
#[derive(Clone)]
pub struct HookFactory {
    key: HookKey,
    construct: HookConstructor,
}

impl HookFactory {
    /// Factory using the hook's `Default` implementation.
    pub fn of<H: ServerHook + Default>() -> Self {
        Self::with(|| Ok(H::default()))
    }

    /// Factory using a fallible constructor.
    pub fn with<H, F>(constructor: F) -> Self
    where
        H: ServerHook,
        F: Fn() -> Result<H, BoxError> + Send + Sync + 'static,
    {
        Self {
            key: HookKey::of::<H>(),
            construct: Arc::new(move || {
                let hook = Arc::new(constructor()?);
                Ok(HookInstance {
                    hook: hook.clone(),
                    any: hook,
                })
            }),
        }
    }

    pub fn key(&self) -> HookKey {
        self.key
    }

    fn construct(&self) -> Result<HookInstance, HookDiscoveryError> {
        catch_unwind(AssertUnwindSafe(|| (self.construct)()))
            .unwrap_or_else(|payload| Err(panic_message(payload).into()))
            .map_err(|source| HookDiscoveryError::Construction {
                hook: self.key.short_name().to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for HookFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookFactory").field("key", &self.key).finish()
    }
}

/// Resolves hook types declared by name.
///
/// Implemented by the loader's module namespace so a definition can refer to
/// a hook type registered by another module of the same archive.
pub trait HookResolver {
    fn resolve_hook(&self, type_name: &str) -> Option<HookFactory>;
}

/// A single hook declaration.
#[derive(Debug, Clone)]
pub enum HookDeclaration {
    /// A hook type known at compile time, with its constructor.
    Typed(HookFactory),
    /// A hook type registered under this name in the archive's namespace.
    Named(String),
}

/// The ordered list of hooks a definition composes.
#[derive(Debug, Clone, Default)]
pub struct HookDeclarations {
    declarations: Vec<HookDeclaration>,
}

impl HookDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a hook constructed through its `Default` implementation.
    pub fn hook<H: ServerHook + Default>(&mut self) -> &mut Self {
        self.declarations.push(HookDeclaration::Typed(HookFactory::of::<H>()));
        self
    }

    /// Declares a hook with a fallible constructor.
    pub fn hook_with<H, F>(&mut self, constructor: F) -> &mut Self
    where
        H: ServerHook,
        F: Fn() -> Result<H, BoxError> + Send + Sync + 'static,
    {
        self.declarations
            .push(HookDeclaration::Typed(HookFactory::with(constructor)));
        self
    }

    /// Declares a hook by the name it was registered under in the namespace.
    pub fn named(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.declarations.push(HookDeclaration::Named(type_name.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HookDeclaration> {
        self.declarations.iter()
    }
}

impl IntoIterator for HookDeclarations {
    type Item = HookDeclaration;
    type IntoIter = std::vec::IntoIter<HookDeclaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.into_iter()
    }
}

/// The hooks of one definition instance, keyed by hook type.
///
/// Built once by [`HookRegistry::discover`] and read-only afterwards.
#[derive(Default)]
pub struct HookRegistry {
    entries: Vec<(HookKey, HookInstance)>,
    index: HashMap<TypeId, usize>,
}

impl HookRegistry {
    /// Materialises `declarations` for the definition named `owner`.
    ///
    /// Declarations are processed in order. Failures are logged and skipped;
    /// the first declaration of a type wins and later duplicates are not
    /// constructed.
    pub fn discover(
        owner: &str,
        declarations: HookDeclarations,
        resolver: &dyn HookResolver,
    ) -> Self {
        let span = info_span!("hooks", definition = %owner);
        let _guard = span.enter();

        let mut registry = Self::default();

        for declaration in declarations {
            let factory = match declaration {
                HookDeclaration::Typed(factory) => factory,
                HookDeclaration::Named(name) => match resolver.resolve_hook(&name) {
                    Some(factory) => factory,
                    None => {
                        error!("❌ {}", HookDiscoveryError::MissingConstructor(name));
                        continue;
                    }
                },
            };

            let key = factory.key();
            if registry.index.contains_key(&key.type_id()) {
                warn!("⚠️ {}", HookDiscoveryError::Duplicate(key.short_name().to_string()));
                continue;
            }

            match factory.construct() {
                Ok(instance) => {
                    registry.index.insert(key.type_id(), registry.entries.len());
                    registry.entries.push((key, instance));
                    info!("🪝 Registered hook: {}", key);
                }
                Err(e) => {
                    error!("❌ {}", e);
                }
            }
        }

        registry
    }

    /// Returns the hook of type `H`.
    ///
    /// # Panics
    ///
    /// Panics if `H` was not declared by the definition or failed to
    /// construct. Only request hooks your definition declares.
    pub fn get<H: ServerHook>(&self) -> &H {
        match self.try_get::<H>() {
            Some(hook) => hook,
            None => panic!(
                "hook `{}` doesn't exist: it was not declared or failed to construct",
                std::any::type_name::<H>()
            ),
        }
    }

    /// Returns the hook of type `H` if it is present.
    pub fn try_get<H: ServerHook>(&self) -> Option<&H> {
        let position = *self.index.get(&TypeId::of::<H>())?;
        self.entries[position].1.any.downcast_ref::<H>()
    }

    pub fn contains<H: ServerHook>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<H>())
    }

    /// Read-only view of all hooks in declaration order.
    pub fn snapshot(&self) -> impl Iterator<Item = (HookKey, &dyn ServerHook)> + '_ {
        self.entries
            .iter()
            .map(|(key, instance)| (*key, instance.hook.as_ref()))
    }

    pub fn keys(&self) -> Vec<HookKey> {
        self.entries.iter().map(|(key, _)| *key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(key, _)| key.short_name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Alpha {
        calls: AtomicUsize,
    }

    impl ServerHook for Alpha {
        fn hook(&self, _process: &ServerProcess) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Beta;

    impl ServerHook for Beta {
        fn hook(&self, _process: &ServerProcess) {}
    }

    struct Broken;

    impl ServerHook for Broken {
        fn hook(&self, _process: &ServerProcess) {}
    }

    struct Panicky;

    impl Default for Panicky {
        fn default() -> Self {
            panic!("constructor exploded")
        }
    }

    impl ServerHook for Panicky {
        fn hook(&self, _process: &ServerProcess) {}
    }

    struct Resolver(HashMap<String, HookFactory>);

    impl HookResolver for Resolver {
        fn resolve_hook(&self, type_name: &str) -> Option<HookFactory> {
            self.0.get(type_name).cloned()
        }
    }

    fn empty_resolver() -> Resolver {
        Resolver(HashMap::new())
    }

    fn process() -> ServerProcess {
        ServerProcess::new("localhost", "127.0.0.1:25565".parse().unwrap(), ShutdownState::new())
    }

    #[test]
    fn test_no_declarations_yields_empty_registry() {
        let registry = HookRegistry::discover("Empty", HookDeclarations::new(), &empty_resolver());
        assert!(registry.is_empty());
        assert_eq!(registry.snapshot().count(), 0);
    }

    #[test]
    fn test_declared_hooks_are_constructed_in_order() {
        let mut declarations = HookDeclarations::new();
        declarations.hook::<Beta>().hook::<Alpha>();

        let registry = HookRegistry::discover("Lobby", declarations, &empty_resolver());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys(), vec![HookKey::of::<Beta>(), HookKey::of::<Alpha>()]);
        assert!(registry.contains::<Alpha>());
        assert!(registry.contains::<Beta>());
    }

    #[test]
    fn test_failing_constructors_are_skipped() {
        let mut declarations = HookDeclarations::new();
        declarations
            .hook::<Alpha>()
            .hook_with::<Broken, _>(|| Err("missing configuration".into()))
            .hook::<Panicky>()
            .hook::<Beta>();

        let registry = HookRegistry::discover("Lobby", declarations, &empty_resolver());

        assert_eq!(registry.keys(), vec![HookKey::of::<Alpha>(), HookKey::of::<Beta>()]);
        assert!(registry.try_get::<Broken>().is_none());
        assert!(registry.try_get::<Panicky>().is_none());
    }

    #[test]
    fn test_duplicate_declarations_keep_first() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = constructed.clone();

        let mut declarations = HookDeclarations::new();
        declarations.hook::<Alpha>().hook_with::<Alpha, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Alpha::default())
        });

        let registry = HookRegistry::discover("Lobby", declarations, &empty_resolver());

        assert_eq!(registry.len(), 1);
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_named_declarations_use_resolver() {
        let mut known = HashMap::new();
        known.insert("lobby.Beta".to_string(), HookFactory::of::<Beta>());
        let resolver = Resolver(known);

        let mut declarations = HookDeclarations::new();
        declarations.named("lobby.Beta").named("lobby.Missing");

        let registry = HookRegistry::discover("Lobby", declarations, &resolver);

        assert_eq!(registry.keys(), vec![HookKey::of::<Beta>()]);
    }

    #[test]
    fn test_typed_lookup_returns_same_instance_as_snapshot() {
        let mut declarations = HookDeclarations::new();
        declarations.hook::<Alpha>();
        let registry = HookRegistry::discover("Lobby", declarations, &empty_resolver());

        let process = process();
        for (_, hook) in registry.snapshot() {
            hook.hook(&process);
        }

        assert_eq!(registry.get::<Alpha>().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "doesn't exist")]
    fn test_get_undeclared_hook_panics() {
        let registry = HookRegistry::discover("Lobby", HookDeclarations::new(), &empty_resolver());
        let _ = registry.get::<Alpha>();
    }

    #[test]
    fn test_hook_key_names() {
        let key = HookKey::of::<Alpha>();
        assert_eq!(key.short_name(), "Alpha");
        assert!(key.type_name().ends_with("::Alpha"));
        assert_eq!(key.to_string(), "Alpha");
    }

    #[test]
    fn test_discovery_error_messages() {
        let err = HookDiscoveryError::MissingConstructor("lobby.Missing".to_string());
        assert!(err.to_string().contains("zero-argument constructor"));

        let err = HookDiscoveryError::Construction {
            hook: "Broken".to_string(),
            source: "nope".into(),
        };
        assert_eq!(err.to_string(), "couldn't create instance of hook `Broken`: nope");
    }
}
