//! Process-local registry for development mode.

use crate::{ServerRecord, ServerStorage, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use universe_api::ServerId;

/// In-memory backend.
///
/// Several instances may share one registry map through
/// [`MemoryServerStorage::with_registry`]; each instance still holds at most
/// one registration.
#[derive(Debug, Default)]
pub struct MemoryServerStorage {
    servers: Arc<DashMap<ServerId, ServerRecord>>,
    registered: Mutex<Option<ServerId>>,
}

impl MemoryServerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(servers: Arc<DashMap<ServerId, ServerRecord>>) -> Self {
        Self {
            servers,
            registered: Mutex::new(None),
        }
    }

    /// The shared registry map.
    pub fn servers(&self) -> Arc<DashMap<ServerId, ServerRecord>> {
        self.servers.clone()
    }

    /// The id registered through this instance, if any.
    pub fn registered(&self) -> Option<ServerId> {
        *self.registered.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, id: &ServerId) -> Option<ServerRecord> {
        self.servers.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl ServerStorage for MemoryServerStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_server(&self, record: ServerRecord) -> Result<(), StorageError> {
        let mut registered = self.registered.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(current) = *registered {
            return Err(StorageError::AlreadyRegistered {
                current,
                attempted: record.id,
            });
        }

        info!("📝 Registered server {} ({}) in memory", record.id, record.name);
        *registered = Some(record.id);
        self.servers.insert(record.id, record);
        Ok(())
    }

    async fn remove_server(&self) -> Result<bool, StorageError> {
        let taken = self
            .registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match taken {
            Some(id) => {
                self.servers.remove(&id);
                info!("🗑️ Removed server {} from memory", id);
                Ok(true)
            }
            None => {
                debug!("No server registered; nothing to remove");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ServerRecord {
        ServerRecord {
            id: ServerId::new(),
            name: name.to_string(),
            address: "localhost".to_string(),
            port: 25565,
            started_at: 0,
            pid: std::process::id(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_remove() {
        let storage = MemoryServerStorage::new();
        let lobby = record("Lobby");
        let id = lobby.id;

        storage.insert_server(lobby.clone()).await.unwrap();
        assert_eq!(storage.registered(), Some(id));
        assert_eq!(storage.get(&id), Some(lobby));

        assert!(storage.remove_server().await.unwrap());
        assert!(storage.get(&id).is_none());
        assert!(storage.registered().is_none());
    }

    #[tokio::test]
    async fn test_second_insert_is_rejected() {
        let storage = MemoryServerStorage::new();
        let first = record("Lobby");
        let first_id = first.id;
        storage.insert_server(first).await.unwrap();

        let err = storage.insert_server(record("Arena")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyRegistered { current, .. } if current == first_id));
        assert_eq!(storage.servers().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_without_insert_is_noop() {
        let storage = MemoryServerStorage::new();
        assert!(!storage.remove_server().await.unwrap());
        assert!(storage.servers().is_empty());
    }

    #[tokio::test]
    async fn test_instances_share_registry() {
        let registry = Arc::new(DashMap::new());
        let lobby = MemoryServerStorage::with_registry(registry.clone());
        let arena = MemoryServerStorage::with_registry(registry.clone());

        lobby.insert_server(record("Lobby")).await.unwrap();
        arena.insert_server(record("Arena")).await.unwrap();
        assert_eq!(registry.len(), 2);

        lobby.remove_server().await.unwrap();
        assert_eq!(registry.len(), 1);
        assert!(arena.get(&arena.registered().unwrap()).is_some());
    }
}
