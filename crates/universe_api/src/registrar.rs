//! Name-to-type registry used to resolve the manifest's `class` entry.
//!
//! Every module inside a server archive fills one of these through its
//! exported `universe_register` function. The bootstrap keeps a second one
//! for definitions that are compiled into the binary itself.

use crate::definition::{DefinitionFactory, ServerDefinition};
use crate::hooks::{HookFactory, HookResolver, ServerHook};
use crate::BoxError;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What kind of type a name was registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Definition,
    Hook,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Definition => f.write_str("server definition"),
            TypeKind::Hook => f.write_str("server hook"),
        }
    }
}

/// A type registered under a name.
#[derive(Debug, Clone)]
pub enum RegisteredType {
    Definition(DefinitionFactory),
    Hook(HookFactory),
}

impl RegisteredType {
    pub fn kind(&self) -> TypeKind {
        match self {
            RegisteredType::Definition(_) => TypeKind::Definition,
            RegisteredType::Hook(_) => TypeKind::Hook,
        }
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistrar {
    types: HashMap<String, RegisteredType>,
}

impl TypeRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition constructed through `Default`.
    pub fn definition<D: ServerDefinition + Default>(&mut self, name: impl Into<String>) -> &mut Self {
        self.insert(name.into(), RegisteredType::Definition(DefinitionFactory::of::<D>()))
    }

    /// Registers a definition with a fallible constructor.
    pub fn definition_with<D, F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        D: ServerDefinition,
        F: Fn() -> Result<D, BoxError> + Send + Sync + 'static,
    {
        self.insert(name.into(), RegisteredType::Definition(DefinitionFactory::with(constructor)))
    }

    /// Registers a hook so definitions can declare it by name.
    pub fn hook<H: ServerHook + Default>(&mut self, name: impl Into<String>) -> &mut Self {
        self.insert(name.into(), RegisteredType::Hook(HookFactory::of::<H>()))
    }

    pub fn hook_with<H, F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        H: ServerHook,
        F: Fn() -> Result<H, BoxError> + Send + Sync + 'static,
    {
        self.insert(name.into(), RegisteredType::Hook(HookFactory::with(constructor)))
    }

    /// Adds every entry of `other` that is not registered here yet.
    pub fn merge(&mut self, other: TypeRegistrar) -> &mut Self {
        for (name, registered) in other.types {
            self.insert(name, registered);
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn insert(&mut self, name: String, registered: RegisteredType) -> &mut Self {
        if let Some(existing) = self.types.get(&name) {
            warn!(
                "⚠️ Type `{}` is already registered as a {}; ignoring the {} registered later",
                name,
                existing.kind(),
                registered.kind()
            );
            return self;
        }

        debug!("Registered {} `{}`", registered.kind(), name);
        self.types.insert(name, registered);
        self
    }
}

impl HookResolver for TypeRegistrar {
    fn resolve_hook(&self, type_name: &str) -> Option<HookFactory> {
        match self.resolve(type_name)? {
            RegisteredType::Hook(factory) => Some(factory.clone()),
            RegisteredType::Definition(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookKey;
    use crate::process::ServerProcess;

    #[derive(Default)]
    struct Lobby;
    impl ServerDefinition for Lobby {}

    #[derive(Default)]
    struct Arena;
    impl ServerDefinition for Arena {}

    #[derive(Default)]
    struct Tick;
    impl ServerHook for Tick {
        fn hook(&self, _process: &ServerProcess) {}
    }

    #[test]
    fn test_resolve_by_name() {
        let mut registrar = TypeRegistrar::new();
        registrar
            .definition::<Lobby>("game.Lobby")
            .hook::<Tick>("game.Tick");

        assert_eq!(registrar.len(), 2);
        assert_eq!(registrar.resolve("game.Lobby").map(|t| t.kind()), Some(TypeKind::Definition));
        assert_eq!(registrar.resolve("game.Tick").map(|t| t.kind()), Some(TypeKind::Hook));
        assert!(registrar.resolve("game.Missing").is_none());
        assert_eq!(registrar.type_names(), vec!["game.Lobby", "game.Tick"]);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registrar = TypeRegistrar::new();
        registrar.definition::<Lobby>("game.Server");
        registrar.definition::<Arena>("game.Server");

        match registrar.resolve("game.Server") {
            Some(RegisteredType::Definition(factory)) => {
                assert_eq!(factory.rust_type(), std::any::type_name::<Lobby>());
            }
            other => panic!("unexpected registration: {other:?}"),
        }
    }

    #[test]
    fn test_hook_resolver_only_returns_hooks() {
        let mut registrar = TypeRegistrar::new();
        registrar.definition::<Lobby>("game.Lobby").hook::<Tick>("game.Tick");

        let factory = registrar.resolve_hook("game.Tick").unwrap();
        assert_eq!(factory.key(), HookKey::of::<Tick>());
        assert!(registrar.resolve_hook("game.Lobby").is_none());
        assert!(registrar.resolve_hook("game.Missing").is_none());
    }

    #[test]
    fn test_merge_keeps_existing_entries() {
        let mut base = TypeRegistrar::new();
        base.definition::<Lobby>("game.Server");

        let mut other = TypeRegistrar::new();
        other.definition::<Arena>("game.Server").hook::<Tick>("game.Tick");

        base.merge(other);
        assert_eq!(base.len(), 2);
        assert!(base.contains("game.Tick"));
        match base.resolve("game.Server") {
            Some(RegisteredType::Definition(factory)) => {
                assert_eq!(factory.rust_type(), std::any::type_name::<Lobby>());
            }
            other => panic!("unexpected registration: {other:?}"),
        }
    }
}
