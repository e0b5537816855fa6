//! Error types for archive loading.
//!
//! Every [`LoaderError`] is fatal to the bootstrap. Each variant carries the
//! archive path so the top-level log line is self-contained.

use std::path::PathBuf;
use thiserror::Error;
use universe_api::{BoxError, TypeKind};

#[derive(Error, Debug)]
pub enum LoaderError {
    /// The archive could not be opened or read.
    #[error("couldn't read archive {}: {source}", path.display())]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The manifest is absent or malformed.
    #[error("invalid manifest in {}: {reason}", path.display())]
    Manifest {
        path: PathBuf,
        reason: String,
        /// Raw manifest text, if the entry existed.
        content: Option<String>,
    },

    /// The declared type could not be found or a module failed to load.
    #[error("couldn't resolve type `{type_name}` from {}: {cause}", path.display())]
    TypeResolution {
        path: PathBuf,
        type_name: String,
        #[source]
        cause: ResolutionFailure,
    },

    /// The declared type exists but is not a server definition.
    #[error("type `{type_name}` from {} is a {found}, not a server definition", path.display())]
    TypeMismatch {
        path: PathBuf,
        type_name: String,
        found: TypeKind,
    },

    /// The definition's constructor failed or panicked.
    #[error("couldn't create instance of `{type_name}` from {}: {source}", path.display())]
    Instantiation {
        path: PathBuf,
        type_name: String,
        #[source]
        source: BoxError,
    },
}

impl LoaderError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoaderError::ArchiveIo { path, .. }
            | LoaderError::Manifest { path, .. }
            | LoaderError::TypeResolution { path, .. }
            | LoaderError::TypeMismatch { path, .. }
            | LoaderError::Instantiation { path, .. } => path,
        }
    }
}

/// Why a type name did not resolve.
#[derive(Error, Debug)]
pub enum ResolutionFailure {
    #[error("no such type is registered (known types: {})", format_known(.known))]
    NotRegistered { known: Vec<String> },

    #[error("module `{entry}` failed to load: {source}")]
    Module {
        entry: String,
        #[source]
        source: ModuleError,
    },
}

fn format_known(known: &[String]) -> String {
    if known.is_empty() {
        "none".to_string()
    } else {
        known.join(", ")
    }
}

/// Failures while loading one module from an archive.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("couldn't extract module: {0}")]
    Extraction(#[from] std::io::Error),

    #[error("archive entry couldn't be read: {0}")]
    Entry(#[from] zip::result::ZipError),

    #[error("library loading error: {0}")]
    Library(#[source] libloading::Error),

    #[error("module does not export '{symbol}': {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("module returned a null ABI version string")]
    NullVersion,

    #[error("module version mismatch: {0}")]
    VersionMismatch(String),

    #[error("module registration failed")]
    Registration,
}
