//! Configuration management for the Universe bootstrap.
//!
//! Settings come from three layers: command-line flags override the optional
//! TOML config file, which overrides the built-in defaults. The merged result
//! is validated and frozen into a [`BootstrapConfig`].

use crate::cli::CliArgs;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use universe_loader::ModuleSafetyConfig;

pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_ARCHIVE: &str = "./data/server.jar";
pub const DEFAULT_REGISTRY_DIR: &str = "./data/registry";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_archive() -> PathBuf {
    PathBuf::from(DEFAULT_ARCHIVE)
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REGISTRY_DIR)
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `universe.toml`. Every table and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub modules: ModuleSafetyConfig,
}

/// Where the engine binds and which archive it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path of the server archive to load
    #[serde(default = "default_archive")]
    pub archive: PathBuf,
}

/// Server registry backend selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Keep the registry in memory instead of on disk
    #[serde(default)]
    pub development: bool,
    /// Directory of the persistent registry
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            archive: default_archive(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            development: false,
            registry_dir: default_registry_dir(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults; it is not created.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies command-line overrides.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if args.development {
            self.storage.development = true;
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(address) = &args.address {
            self.server.address = address.clone();
        }

        if let Some(archive) = &args.archive {
            self.server.archive = archive.clone();
        }

        if let Some(registry_dir) = &args.registry_dir {
            self.storage.registry_dir = registry_dir.clone();
        }

        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }

        if args.json_logs {
            self.logging.json_format = true;
        }

        self.modules.allow_unsafe_modules |= args.danger_allow_unsafe_modules;
        self.modules.allow_abi_mismatch |= args.danger_allow_abi_mismatch;
        self.modules.strict_versioning |= args.strict_versioning;
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be between 1 and 65535".to_string());
        }

        if self.server.address.trim().is_empty() {
            return Err("server.address cannot be empty".to_string());
        }

        if self.server.archive.as_os_str().is_empty() {
            return Err("server.archive cannot be empty".to_string());
        }

        if !self.storage.development && self.storage.registry_dir.as_os_str().is_empty() {
            return Err("storage.registry_dir cannot be empty outside development mode".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }

    /// Freezes validated settings for the bootstrap.
    pub fn into_bootstrap_config(self) -> Result<BootstrapConfig, ConfigError> {
        self.validate().map_err(ConfigError::Invalid)?;

        Ok(BootstrapConfig {
            development_mode: self.storage.development,
            port: self.server.port,
            archive_path: self.server.archive,
            address: self.server.address,
            registry_dir: self.storage.registry_dir,
            logging: self.logging,
            module_safety: self.modules,
        })
    }
}

/// Immutable settings the bootstrap runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub development_mode: bool,
    pub port: u16,
    pub archive_path: PathBuf,
    pub address: String,
    pub registry_dir: PathBuf,
    pub logging: LoggingSettings,
    pub module_safety: ModuleSafetyConfig,
}

impl BootstrapConfig {
    /// Loads the config file named by `args`, applies the flags and validates.
    pub async fn resolve(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_cli(args);
        config.into_bootstrap_config()
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            development_mode: false,
            port: DEFAULT_PORT,
            archive_path: PathBuf::from(DEFAULT_ARCHIVE),
            address: DEFAULT_ADDRESS.to_string(),
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            logging: LoggingSettings::default(),
            module_safety: ModuleSafetyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(flags: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("universe").chain(flags.iter().copied())).unwrap()
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.address, "localhost");
        assert_eq!(config.server.port, 25565);
        assert_eq!(config.server.archive, PathBuf::from("./data/server.jar"));
        assert!(!config.storage.development);
        assert_eq!(config.storage.registry_dir, PathBuf::from("./data/registry"));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.modules, ModuleSafetyConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_freeze_to_bootstrap_defaults() {
        let frozen = AppConfig::default().into_bootstrap_config().unwrap();
        assert_eq!(frozen, BootstrapConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 25570

            [logging]
            json_format = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 25570);
        assert_eq!(config.server.address, "localhost");
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage, StorageSettings::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.storage.development = true;
        config.modules.strict_versioning = true;

        let text = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 25565;
        config.server.address = " ".to_string();
        assert!(config.validate().is_err());

        config.server.address = "0.0.0.0".to_string();
        config.server.archive = PathBuf::new();
        assert!(config.validate().is_err());

        config.server.archive = PathBuf::from("lobby.jar");
        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("verbose"));

        config.logging.level = "warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 25570
            address = "10.0.0.5"

            [storage]
            registry_dir = "/srv/registry"
            "#,
        )
        .unwrap();

        config.apply_cli(&args(&["--dev", "--port", "30000", "--danger-allow-abi-mismatch"]));
        let frozen = config.into_bootstrap_config().unwrap();

        assert!(frozen.development_mode);
        assert_eq!(frozen.port, 30000);
        assert_eq!(frozen.address, "10.0.0.5");
        assert_eq!(frozen.registry_dir, PathBuf::from("/srv/registry"));
        assert!(frozen.module_safety.allow_abi_mismatch);
        assert!(!frozen.module_safety.allow_unsafe_modules);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_created() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("universe.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("universe.toml");
        tokio::fs::write(&path, "[server\nport = ").await.unwrap();

        let err = AppConfig::load_from_file(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_resolve_reads_file_then_flags() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("universe.toml");
        tokio::fs::write(&path, "[server]\narchive = \"lobby.jar\"\nport = 25580\n")
            .await
            .unwrap();

        let config_flag = path.to_string_lossy().into_owned();
        let resolved = BootstrapConfig::resolve(&args(&["-c", &config_flag, "--port", "25590"]))
            .await
            .unwrap();

        assert_eq!(resolved.archive_path, PathBuf::from("lobby.jar"));
        assert_eq!(resolved.port, 25590);
        assert!(!resolved.development_mode);
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_flags() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.toml").to_string_lossy().into_owned();

        let err = BootstrapConfig::resolve(&args(&["-c", &missing, "--port", "0"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_pass_through_unchanged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let archive = PathBuf::from(OsStr::from_bytes(b"/srv/lobby-\xff.jar"));
        let registry = PathBuf::from(OsStr::from_bytes(b"/srv/registry-\xfe"));
        let cli = CliArgs {
            archive: Some(archive.clone()),
            registry_dir: Some(registry.clone()),
            ..CliArgs::default()
        };

        let mut config = AppConfig::default();
        config.apply_cli(&cli);
        let frozen = config.into_bootstrap_config().unwrap();

        assert_eq!(frozen.archive_path, archive);
        assert_eq!(frozen.registry_dir, registry);
    }
}
