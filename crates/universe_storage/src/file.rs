//! Directory-backed registry for production.
//!
//! Every live server owns one `<id>.json` file in the registry directory.
//! Records are written to a temporary file first and renamed into place, so
//! readers never observe a partially written record.

use crate::{ServerRecord, ServerStorage, StorageError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use universe_api::ServerId;

const RECORD_EXTENSION: &str = "json";

#[derive(Debug)]
pub struct FileServerStorage {
    dir: PathBuf,
    registered: Mutex<Option<(ServerId, PathBuf)>>,
}

impl FileServerStorage {
    /// Opens the registry at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        debug!("Opened file registry at {}", dir.display());
        Ok(Self {
            dir,
            registered: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `id`.
    pub fn record_path(&self, id: &ServerId) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Reads every record currently in the registry directory.
    ///
    /// Files that cannot be parsed are skipped with a warning.
    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>, StorageError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        let mut records = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("⚠️ Couldn't read registry record {}: {}", path.display(), e);
                    continue;
                }
            };

            match serde_json::from_slice::<ServerRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!("⚠️ Skipping malformed registry record {}: {}", path.display(), e),
            }
        }

        records.sort_by_key(|record| record.started_at);
        Ok(records)
    }
}

/// Writes `bytes` to `path` and flushes them to disk.
async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io(path, e))
}

#[async_trait]
impl ServerStorage for FileServerStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn insert_server(&self, record: ServerRecord) -> Result<(), StorageError> {
        let mut registered = self.registered.lock().await;

        if let Some((current, _)) = registered.as_ref() {
            return Err(StorageError::AlreadyRegistered {
                current: *current,
                attempted: record.id,
            });
        }

        let path = self.record_path(&record.id);
        let staging = self.dir.join(format!(".{}.{RECORD_EXTENSION}.tmp", record.id));
        let json = serde_json::to_vec_pretty(&record)?;

        write_synced(&staging, &json).await?;
        if let Err(e) = fs::rename(&staging, &path).await {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                warn!("⚠️ Couldn't remove staging file {}: {}", staging.display(), cleanup);
            }
            return Err(StorageError::io(&path, e));
        }

        info!("📝 Registered server {} ({}) at {}", record.id, record.name, path.display());
        *registered = Some((record.id, path));
        Ok(())
    }

    async fn remove_server(&self) -> Result<bool, StorageError> {
        let mut registered = self.registered.lock().await;

        let Some((id, path)) = registered.take() else {
            debug!("No server registered; nothing to remove");
            return Ok(false);
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("🗑️ Removed server {} from {}", id, self.dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("⚠️ Registry record {} was already gone", path.display());
                Ok(true)
            }
            Err(e) => {
                *registered = Some((id, path.clone()));
                Err(StorageError::io(path, e))
            }
        }
    }
}
