//! Error types for the storage backends.

use std::path::PathBuf;
use thiserror::Error;
use universe_api::ServerId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("backend already holds registration {current}; refusing to register {attempted}")]
    AlreadyRegistered {
        current: ServerId,
        attempted: ServerId,
    },

    #[error("registry I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't encode server record: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
