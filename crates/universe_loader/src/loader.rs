use crate::abi::ModuleSafetyConfig;
use crate::archive::ServerArchive;
use crate::error::{LoaderError, ResolutionFailure};
use crate::manifest::UniverseManifest;
use crate::namespace::ModuleNamespace;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, info_span, Span};
use universe_api::{IdentityAssigner, RegisteredType, TypeRegistrar, UniverseServer};

/// The outcome of a successful load.
///
/// Fields drop in declaration order, so the server goes before the namespace
/// whose modules back it.
#[derive(Debug)]
pub struct LoadedDefinition {
    pub server: Arc<UniverseServer>,
    /// The only writer of `server`'s identity.
    pub identity: IdentityAssigner,
    pub manifest: UniverseManifest,
    pub namespace: ModuleNamespace,
}

/// Opens server archives and constructs the definition they declare.
#[derive(Debug)]
pub struct ArchiveLoader {
    builtin: Arc<TypeRegistrar>,
    safety: ModuleSafetyConfig,
    span: Span,
}

impl ArchiveLoader {
    /// Creates a loader whose namespaces are layered over `builtin`.
    pub fn new(builtin: Arc<TypeRegistrar>, safety: ModuleSafetyConfig) -> Self {
        Self {
            builtin,
            safety,
            span: info_span!("loader"),
        }
    }

    /// Loads the archive at `path`.
    ///
    /// Failures are logged with the archive path, manifest content and type
    /// name before they are returned.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedDefinition, LoaderError> {
        let _guard = self.span.enter();
        let path = path.as_ref();

        let mut archive = ServerArchive::open(path).inspect_err(|e| error!("❌ {}", e))?;

        let manifest = archive.read_manifest().inspect_err(|e| {
            let content = match e {
                LoaderError::Manifest { content, .. } => content.as_deref().unwrap_or("<absent>"),
                _ => "<unreadable>",
            };
            error!(manifest = %content, "❌ {}", e);
        })?;

        self.load_declared(&mut archive, manifest)
    }

    fn load_declared(
        &self,
        archive: &mut ServerArchive,
        manifest: UniverseManifest,
    ) -> Result<LoadedDefinition, LoaderError> {
        let path = archive.path().to_path_buf();
        let type_name = manifest.class().to_string();
        let span = info_span!("load", archive = %path.display(), class = %type_name);
        let _guard = span.enter();

        let log_manifest = |e: &LoaderError| error!(manifest = %manifest.raw(), "❌ Loading failed: {}", e);

        let entries = archive.module_entries().inspect_err(log_manifest)?;
        let namespace = ModuleNamespace::load(archive, &entries, self.builtin.clone(), &self.safety)
            .map_err(|failure| LoaderError::TypeResolution {
                path: path.clone(),
                type_name: type_name.clone(),
                cause: ResolutionFailure::Module {
                    entry: failure.entry,
                    source: failure.source,
                },
            })
            .inspect_err(log_manifest)?;

        let factory = match namespace.resolve(&type_name) {
            Some(RegisteredType::Definition(factory)) => factory.clone(),
            Some(other) => {
                let e = LoaderError::TypeMismatch {
                    path,
                    type_name,
                    found: other.kind(),
                };
                log_manifest(&e);
                return Err(e);
            }
            None => {
                let e = LoaderError::TypeResolution {
                    path,
                    type_name,
                    cause: ResolutionFailure::NotRegistered {
                        known: namespace.type_names(),
                    },
                };
                log_manifest(&e);
                return Err(e);
            }
        };

        let (server, identity) = factory
            .instantiate(&type_name, &namespace)
            .map_err(|source| LoaderError::Instantiation {
                path: path.clone(),
                type_name: type_name.clone(),
                source,
            })
            .inspect_err(log_manifest)?;

        info!(
            "📦 Loaded definition {} from {} ({} hooks, {} modules)",
            type_name,
            path.display(),
            server.hooks().len(),
            namespace.modules().len()
        );

        Ok(LoadedDefinition {
            server: Arc::new(server),
            identity,
            manifest,
            namespace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_archive;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use universe_api::{
        HookDeclarations, HookRegistry, ServerDefinition, ServerHook, ServerProcess, TypeKind,
        MANIFEST_ENTRY,
    };

    static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Example;
    impl ServerDefinition for Example {}

    struct Counted;
    impl ServerDefinition for Counted {}

    #[derive(Default)]
    struct Motd;
    impl ServerHook for Motd {
        fn hook(&self, _process: &ServerProcess) {}
    }

    #[derive(Default)]
    struct Scoreboard;
    impl ServerHook for Scoreboard {
        fn hook(&self, _process: &ServerProcess) {}
    }

    #[derive(Default)]
    struct Arena;
    impl ServerDefinition for Arena {
        fn declare_hooks(hooks: &mut HookDeclarations) {
            hooks
                .hook::<Motd>()
                .named("test.Scoreboard")
                .named("test.Missing")
                .hook_with::<Scoreboard, _>(|| Err("second scoreboard".into()));
        }

        fn on_start(&self, _process: &ServerProcess, hooks: &HookRegistry) {
            hooks.get::<Scoreboard>();
        }
    }

    fn loader() -> ArchiveLoader {
        let mut registrar = TypeRegistrar::new();
        registrar
            .definition::<Example>("Example")
            .definition::<Arena>("test.Arena")
            .definition_with::<Counted, _>("test.Counted", || {
                CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
                Ok(Counted)
            })
            .definition_with::<Example, _>("test.Failing", || Err("database offline".into()))
            .hook::<Motd>("test.Motd")
            .hook::<Scoreboard>("test.Scoreboard");
        ArchiveLoader::new(Arc::new(registrar), ModuleSafetyConfig::default())
    }

    fn archive_with(manifest: &str) -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = write_archive(temp_dir.path(), &[(MANIFEST_ENTRY, manifest.as_bytes())]);
        (temp_dir, path)
    }

    #[test]
    fn test_well_formed_archive_loads() {
        let (_dir, path) = archive_with(r#"{"class":"Example","name":"Lobby"}"#);

        let loaded = loader().load(&path).unwrap();
        assert_eq!(loaded.server.type_name(), "Example");
        assert_eq!(loaded.manifest.name(), Some("Lobby"));
        assert!(loaded.server.hooks().is_empty());
        assert!(loaded.server.identity().is_none());
        assert!(loaded.server.definition::<Example>().is_some());

        let id = universe_api::ServerId::new();
        loaded.identity.assign(id).unwrap();
        assert_eq!(loaded.server.identity(), Some(id));
    }

    #[test]
    fn test_hooks_skip_failed_constructors() {
        let (_dir, path) = archive_with(r#"{"class":"test.Arena"}"#);

        let loaded = loader().load(&path).unwrap();
        let hooks = loaded.server.hooks();

        assert_eq!(hooks.len(), 2);
        assert!(hooks.contains::<Motd>());
        assert!(hooks.contains::<Scoreboard>());
    }

    #[test]
    fn test_missing_class_resolves_nothing() {
        let (_dir, path) = archive_with(r#"{"name":"Counted"}"#);
        let before = CONSTRUCTED.load(Ordering::SeqCst);

        let err = loader().load(&path).unwrap_err();
        assert!(matches!(err, LoaderError::Manifest { .. }));
        assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_unknown_type() {
        let (_dir, path) = archive_with(r#"{"class":"test.Nowhere"}"#);

        match loader().load(&path).unwrap_err() {
            LoaderError::TypeResolution { type_name, cause, .. } => {
                assert_eq!(type_name, "test.Nowhere");
                assert!(cause.to_string().contains("test.Arena"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_hook_type_is_a_mismatch() {
        let (_dir, path) = archive_with(r#"{"class":"test.Motd"}"#);

        match loader().load(&path).unwrap_err() {
            LoaderError::TypeMismatch { found, .. } => assert_eq!(found, TypeKind::Hook),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_constructor_failure_is_instantiation_error() {
        let (_dir, path) = archive_with(r#"{"class":"test.Failing"}"#);

        let err = loader().load(&path).unwrap_err();
        assert!(matches!(err, LoaderError::Instantiation { .. }));
        assert!(err.to_string().contains("database offline"));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_missing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let err = loader().load(temp_dir.path().join("server.jar")).unwrap_err();
        assert!(matches!(err, LoaderError::ArchiveIo { .. }));
    }

    /// The `definition_lobby` module cargo built next to this test binary.
    fn lobby_module() -> std::path::PathBuf {
        let exe = std::env::current_exe().unwrap();
        let deps = exe.parent().unwrap();
        let prefix = format!("{}definition_lobby", std::env::consts::DLL_PREFIX);
        let suffix = format!(".{}", crate::archive::MODULE_EXTENSION);

        [deps, deps.parent().unwrap()]
            .into_iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flatten()
            .filter_map(Result::ok)
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.starts_with(&prefix) && name.ends_with(&suffix)
            })
            .max_by_key(|entry| entry.metadata().and_then(|m| m.modified()).ok())
            .map(|entry| entry.path())
            .unwrap_or_else(|| panic!("no {prefix}*{suffix} next to {}", exe.display()))
    }

    #[test]
    fn test_definition_from_archive_module() {
        let module = std::fs::read(lobby_module()).unwrap();
        let entry = format!("lib/lobby.{}", crate::archive::MODULE_EXTENSION);
        let temp_dir = TempDir::new().unwrap();
        let path = write_archive(
            temp_dir.path(),
            &[
                (MANIFEST_ENTRY, br#"{"class":"lobby.LobbyServer"}"#),
                (entry.as_str(), module.as_slice()),
            ],
        );

        let loader = ArchiveLoader::new(Arc::new(TypeRegistrar::new()), ModuleSafetyConfig::default());
        let loaded = loader.load(&path).unwrap();

        let modules = loaded.namespace.modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].entry(), entry);
        assert_eq!(modules[0].abi_version(), universe_api::ABI_VERSION);
        assert_eq!(modules[0].type_names(), ["lobby.LobbyServer", "lobby.PlayerCountHook"]);
        assert!(loaded.namespace.extract_dir().is_some());

        assert_eq!(loaded.server.type_name(), "lobby.LobbyServer");
        assert_eq!(loaded.server.name().as_deref(), Some("Lobby"));
        assert!(loaded.server.identity().is_none());

        let hooks: Vec<&str> = loaded.server.hooks().keys().iter().map(|key| key.short_name()).collect();
        assert!(hooks.contains(&"WelcomeHook"));
        assert!(hooks.contains(&"PlayerCountHook"));
    }
}

