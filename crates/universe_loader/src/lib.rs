//! # Universe Loader
//!
//! Turns a server archive into a constructed [`UniverseServer`](universe_api::UniverseServer).
//!
//! Loading runs these steps and stops at the first failure:
//!
//! 1. open the archive and parse its `universe.json` manifest
//! 2. load every module in the archive into a namespace layered over the
//!    bootstrap's statically linked types
//! 3. resolve the manifest's `class` in that namespace
//! 4. check that it names a server definition
//! 5. construct it, which also builds its hooks
//!
//! Each step has its own [`LoaderError`] variant.

pub mod abi;
pub mod archive;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod namespace;

pub use abi::ModuleSafetyConfig;
pub use archive::{ServerArchive, MODULE_EXTENSION};
pub use error::{LoaderError, ModuleError, ResolutionFailure};
pub use loader::{ArchiveLoader, LoadedDefinition};
pub use manifest::UniverseManifest;
pub use namespace::{LoadedModule, ModuleNamespace};
