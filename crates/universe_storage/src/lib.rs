//! # Universe Storage
//!
//! The registry of live servers. A bootstrap inserts one [`ServerRecord`] once
//! its server is running and removes it again from the shutdown handler.
//!
//! Two backends implement [`ServerStorage`]:
//!
//! - [`MemoryServerStorage`] - process-local, used in development mode
//! - [`FileServerStorage`] - one JSON record per live server in a shared
//!   directory, used in production
//!
//! Each backend instance holds at most one registration: the server of the
//! process that owns it.

pub mod error;
pub mod file;
pub mod memory;
pub mod record;

pub use error::StorageError;
pub use file::FileServerStorage;
pub use memory::MemoryServerStorage;
pub use record::ServerRecord;

use async_trait::async_trait;

/// Contract shared by all storage backends.
#[async_trait]
pub trait ServerStorage: Send + Sync {
    /// Short backend name for log lines.
    fn backend_name(&self) -> &'static str;

    /// Records `record` as alive.
    ///
    /// Fails with [`StorageError::AlreadyRegistered`] if this backend instance
    /// already holds a registration.
    async fn insert_server(&self, record: ServerRecord) -> Result<(), StorageError>;

    /// Removes this instance's registration.
    ///
    /// Returns `false` without touching the registry if nothing was inserted.
    async fn remove_server(&self) -> Result<bool, StorageError>;
}
