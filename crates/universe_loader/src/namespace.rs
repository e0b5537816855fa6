//! The type namespace of one archive load.
//!
//! Names resolve against the bootstrap's own registrar first and then
//! against the types registered by the archive's modules. Modules are loaded
//! eagerly when the namespace is built and are never unloaded: their code
//! backs every definition and hook constructed from them.

use crate::abi::ModuleSafetyConfig;
use crate::archive::{ModuleEntry, ServerArchive};
use crate::error::ModuleError;
use libloading::{Library, Symbol};
use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};
use universe_api::{
    HookFactory, HookResolver, RegisteredType, TypeRegistrar, ABI_VERSION, ABI_VERSION_SYMBOL,
    REGISTER_SYMBOL,
};

type AbiVersionFn = unsafe extern "C" fn() -> *const c_char;
type RegisterFn = unsafe extern "C" fn(*mut TypeRegistrar) -> bool;

/// A module loaded from the archive.
pub struct LoadedModule {
    entry: String,
    path: PathBuf,
    abi_version: String,
    type_names: Vec<String>,
    _library: ManuallyDrop<Library>,
}

impl LoadedModule {
    /// Name of the archive entry the module came from.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Where the module was extracted to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn abi_version(&self) -> &str {
        &self.abi_version
    }

    /// Names the module registered, sorted.
    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("entry", &self.entry)
            .field("abi_version", &self.abi_version)
            .field("type_names", &self.type_names)
            .finish()
    }
}

/// A module that failed to load, with the entry it came from.
#[derive(Debug)]
pub struct ModuleLoadFailure {
    pub entry: String,
    pub source: ModuleError,
}

pub struct ModuleNamespace {
    parent: Arc<TypeRegistrar>,
    types: TypeRegistrar,
    modules: Vec<LoadedModule>,
    extract_dir: Option<TempDir>,
}

impl ModuleNamespace {
    /// A namespace with no archive types.
    pub fn new(parent: Arc<TypeRegistrar>) -> Self {
        Self {
            parent,
            types: TypeRegistrar::new(),
            modules: Vec::new(),
            extract_dir: None,
        }
    }

    /// Loads the module `entries` of `archive` on top of `parent`.
    ///
    /// The first module that fails aborts the build.
    pub fn load(
        archive: &mut ServerArchive,
        entries: &[ModuleEntry],
        parent: Arc<TypeRegistrar>,
        safety: &ModuleSafetyConfig,
    ) -> Result<Self, ModuleLoadFailure> {
        let mut namespace = Self::new(parent);

        if entries.is_empty() {
            debug!("Archive has no modules; only built-in types are visible");
            return Ok(namespace);
        }

        let extract_dir = tempfile::Builder::new()
            .prefix("universe-modules-")
            .tempdir()
            .map_err(|e| ModuleLoadFailure {
                entry: entries[0].name.clone(),
                source: ModuleError::Extraction(e),
            })?;

        for entry in entries {
            let module = namespace
                .load_module(archive, entry, extract_dir.path(), safety)
                .map_err(|source| ModuleLoadFailure {
                    entry: entry.name.clone(),
                    source,
                })?;

            info!(
                "🔌 Loaded module {} ({} types)",
                module.entry,
                module.type_names.len()
            );
            namespace.modules.push(module);
        }

        namespace.extract_dir = Some(extract_dir);
        Ok(namespace)
    }

    fn load_module(
        &mut self,
        archive: &mut ServerArchive,
        entry: &ModuleEntry,
        dir: &Path,
        safety: &ModuleSafetyConfig,
    ) -> Result<LoadedModule, ModuleError> {
        let path = archive.extract_module(entry, dir)?;
        debug!("🔄 Loading module {} from {}", entry.name, path.display());

        let library = unsafe { Library::new(&path) }.map_err(ModuleError::Library)?;
        let abi_version = read_abi_version(&library)?;
        safety.validate(&abi_version, ABI_VERSION)?;

        let mut registered = TypeRegistrar::new();
        {
            let register: Symbol<RegisterFn> = unsafe { library.get(REGISTER_SYMBOL) }.map_err(|source| {
                ModuleError::MissingSymbol {
                    symbol: "universe_register",
                    source,
                }
            })?;

            if !unsafe { register(&mut registered) } {
                return Err(ModuleError::Registration);
            }
        }

        let type_names = registered.type_names().into_iter().map(str::to_string).collect();
        self.types.merge(registered);

        Ok(LoadedModule {
            entry: entry.name.clone(),
            path,
            abi_version,
            type_names,
            _library: ManuallyDrop::new(library),
        })
    }

    /// Statically linked types first, then the archive's.
    pub fn resolve(&self, name: &str) -> Option<&RegisteredType> {
        self.parent.resolve(name).or_else(|| self.types.resolve(name))
    }

    /// Every name visible in this namespace, sorted and deduplicated.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .parent
            .type_names()
            .into_iter()
            .chain(self.types.type_names())
            .map(str::to_string)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn modules(&self) -> &[LoadedModule] {
        &self.modules
    }

    /// Directory modules were extracted to, if the archive had any.
    pub fn extract_dir(&self) -> Option<&Path> {
        self.extract_dir.as_ref().map(TempDir::path)
    }
}

impl HookResolver for ModuleNamespace {
    fn resolve_hook(&self, type_name: &str) -> Option<HookFactory> {
        match self.resolve(type_name)? {
            RegisteredType::Hook(factory) => Some(factory.clone()),
            RegisteredType::Definition(_) => None,
        }
    }
}

impl std::fmt::Debug for ModuleNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleNamespace")
            .field("builtin_types", &self.parent.len())
            .field("archive_types", &self.types.len())
            .field("modules", &self.modules)
            .finish()
    }
}

fn read_abi_version(library: &Library) -> Result<String, ModuleError> {
    let abi_version: Symbol<AbiVersionFn> =
        unsafe { library.get(ABI_VERSION_SYMBOL) }.map_err(|source| ModuleError::MissingSymbol {
            symbol: "universe_abi_version",
            source,
        })?;

    let ptr = unsafe { abi_version() };
    if ptr.is_null() {
        return Err(ModuleError::NullVersion);
    }

    Ok(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}
