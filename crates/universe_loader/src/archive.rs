//! Read access to a server archive (a zip container).

use crate::error::{LoaderError, ModuleError};
use crate::manifest::UniverseManifest;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use universe_api::MANIFEST_ENTRY;
use zip::result::ZipError;
use zip::ZipArchive;

/// Dynamic library extension modules are loaded from on this platform.
#[cfg(target_os = "windows")]
pub const MODULE_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
pub const MODULE_EXTENSION: &str = "dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const MODULE_EXTENSION: &str = "so";

const FOREIGN_MODULE_EXTENSIONS: [&str; 3] = ["so", "dylib", "dll"];

/// A module entry inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub index: usize,
    pub name: String,
    file_name: String,
}

pub struct ServerArchive {
    path: PathBuf,
    zip: ZipArchive<File>,
}

impl ServerArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref().to_path_buf();
        let archive_io = |source: ZipError| LoaderError::ArchiveIo {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(|e| archive_io(ZipError::Io(e)))?;
        let zip = ZipArchive::new(file).map_err(archive_io)?;

        debug!("📦 Opened archive {} ({} entries)", path.display(), zip.len());
        Ok(Self { path, zip })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the manifest entry.
    pub fn read_manifest(&mut self) -> Result<UniverseManifest, LoaderError> {
        let mut entry = match self.zip.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(LoaderError::Manifest {
                    path: self.path.clone(),
                    reason: format!("archive has no {MANIFEST_ENTRY}"),
                    content: None,
                })
            }
            Err(source) => {
                return Err(LoaderError::ArchiveIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| LoaderError::ArchiveIo {
                path: self.path.clone(),
                source: ZipError::Io(e),
            })?;

        let raw = String::from_utf8(bytes).map_err(|e| LoaderError::Manifest {
            path: self.path.clone(),
            reason: format!("{MANIFEST_ENTRY} is not valid UTF-8: {e}"),
            content: Some(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        })?;

        UniverseManifest::parse(&raw).map_err(|reason| LoaderError::Manifest {
            path: self.path.clone(),
            reason,
            content: Some(raw),
        })
    }

    /// Lists the module entries loadable on this platform, in archive order.
    pub fn module_entries(&mut self) -> Result<Vec<ModuleEntry>, LoaderError> {
        let mut modules = Vec::new();

        for index in 0..self.zip.len() {
            let entry = self.zip.by_index(index).map_err(|source| LoaderError::ArchiveIo {
                path: self.path.clone(),
                source,
            })?;

            if !entry.is_file() {
                continue;
            }

            let Some(enclosed) = entry.enclosed_name() else {
                debug!("Skipping entry with unsafe path: {}", entry.name());
                continue;
            };

            let extension = enclosed
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            if extension == MODULE_EXTENSION {
                let file_name = enclosed
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("module.{MODULE_EXTENSION}"));
                modules.push(ModuleEntry {
                    index,
                    name: entry.name().to_string(),
                    file_name,
                });
            } else if FOREIGN_MODULE_EXTENSIONS.contains(&extension.as_str()) {
                debug!("Skipping module for another platform: {}", entry.name());
            }
        }

        Ok(modules)
    }

    /// Copies a module entry into `dir` and returns the extracted path.
    pub fn extract_module(&mut self, module: &ModuleEntry, dir: &Path) -> Result<PathBuf, ModuleError> {
        let mut entry = self.zip.by_index(module.index)?;
        let target = dir.join(format!("{}-{}", module.index, module.file_name));

        let mut file = File::create(&target)?;
        std::io::copy(&mut entry, &mut file)?;
        file.sync_all()?;

        Ok(target)
    }
}

impl std::fmt::Debug for ServerArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerArchive")
            .field("path", &self.path)
            .field("entries", &self.zip.len())
            .finish()
    }
}
