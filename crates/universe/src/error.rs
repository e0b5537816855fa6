//! Fatal bootstrap errors and their process exit codes.

use std::path::PathBuf;
use thiserror::Error;
use universe_api::{EngineError, IdentityError, LifecycleError};
use universe_loader::LoaderError;
use universe_storage::StorageError;

/// Errors raised while resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration validation failed: {0}")]
    Invalid(String),

    #[error("couldn't set up logging: {0}")]
    Logging(String),
}

/// Every failure that ends the bootstrap.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("couldn't assign server identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("couldn't start engine: {0}")]
    Engine(#[from] EngineError),

    #[error("server registry failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Start(#[from] LifecycleError),

    #[error("shutdown requested during startup (before {step})")]
    Interrupted { step: &'static str },
}

impl BootstrapError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::Config(_) => 2,
            BootstrapError::Loader(LoaderError::ArchiveIo { .. }) => 10,
            BootstrapError::Loader(LoaderError::Manifest { .. }) => 11,
            BootstrapError::Loader(LoaderError::TypeResolution { .. }) => 12,
            BootstrapError::Loader(LoaderError::TypeMismatch { .. }) => 13,
            BootstrapError::Loader(LoaderError::Instantiation { .. }) => 14,
            BootstrapError::Identity(_) => 15,
            BootstrapError::Engine(_) => 16,
            BootstrapError::Storage(_) => 17,
            BootstrapError::Start(_) => 18,
            BootstrapError::Interrupted { .. } => 130,
        }
    }
}

/// Formats `error` followed by each source not already part of the message.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use universe_api::ServerId;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            BootstrapError::Config(ConfigError::Invalid("port".to_string())),
            BootstrapError::Loader(LoaderError::Manifest {
                path: PathBuf::from("server.jar"),
                reason: "missing".to_string(),
                content: None,
            }),
            BootstrapError::Identity(IdentityError::AlreadyAssigned {
                current: ServerId::new(),
                rejected: ServerId::new(),
            }),
            BootstrapError::Engine(EngineError::Start("boom".to_string())),
            BootstrapError::Interrupted { step: "engine start" },
        ];

        let codes: Vec<i32> = errors.iter().map(BootstrapError::exit_code).collect();
        assert_eq!(codes, vec![2, 11, 15, 16, 130]);
    }

    #[test]
    fn test_error_chain_skips_repeated_sources() {
        let err = BootstrapError::Engine(EngineError::Bind {
            address: "localhost".to_string(),
            port: 80,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });

        assert_eq!(
            error_chain(&err),
            "couldn't start engine: couldn't bind localhost:80: denied"
        );
    }

    #[test]
    fn test_error_chain_appends_new_sources() {
        let err = ConfigError::Read {
            path: PathBuf::from("universe.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(error_chain(&err), "couldn't read config file universe.toml: denied");
    }
}
