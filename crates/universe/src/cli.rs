//! Command-line interface for the Universe bootstrap.
//!
//! Every flag is optional. Values given here override the config file, which
//! overrides the built-in defaults.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the optional TOML configuration file
    pub config_path: PathBuf,
    /// Use the in-memory storage backend
    pub development: bool,
    pub port: Option<u16>,
    pub address: Option<String>,
    /// Server archive to load
    pub archive: Option<PathBuf>,
    /// Directory of the persistent registry
    pub registry_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub json_logs: bool,
    /// Load modules built with a different Rust compiler (DANGEROUS)
    pub danger_allow_unsafe_modules: bool,
    /// Load modules built against a different API version (DANGEROUS)
    pub danger_allow_abi_mismatch: bool,
    /// Require exact version matching including patch digits
    pub strict_versioning: bool,
}

pub const DEFAULT_CONFIG_PATH: &str = "universe.toml";

impl CliArgs {
    /// Parses `args`; the first item is the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        command().try_get_matches_from(args).map(|m| Self::from_matches(&m))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            development: matches.get_flag("development"),
            port: matches.get_one::<u16>("port").copied(),
            address: matches.get_one::<String>("address").cloned(),
            archive: matches.get_one::<PathBuf>("jar").cloned(),
            registry_dir: matches.get_one::<PathBuf>("registry").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            danger_allow_unsafe_modules: matches.get_flag("danger-allow-unsafe-modules"),
            danger_allow_abi_mismatch: matches.get_flag("danger-allow-abi-mismatch"),
            strict_versioning: matches.get_flag("strict-versioning"),
        }
    }
}

fn command() -> Command {
    Command::new("universe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loads a server definition from an archive and runs it")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_PATH)
                .help("Configuration file path (optional; defaults apply if missing)"),
        )
        .arg(
            Arg::new("development")
                .long("development")
                .visible_alias("dev")
                .help("Development mode: keep the server registry in memory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Port the engine binds [default: 25565]"),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("ADDRESS")
                .help("Address the engine binds [default: localhost]"),
        )
        .arg(
            Arg::new("jar")
                .long("jar")
                .visible_alias("file")
                .value_name("ARCHIVE")
                .value_parser(value_parser!(PathBuf))
                .help("Server archive to load [default: ./data/server.jar]"),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory of the persistent server registry [default: ./data/registry]"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("danger-allow-unsafe-modules")
                .long("danger-allow-unsafe-modules")
                .help("Load modules compiled with a different Rust compiler (MAY CAUSE CRASHES)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("danger-allow-abi-mismatch")
                .long("danger-allow-abi-mismatch")
                .help("Load modules built against a different universe_api version (MAY CAUSE CRASHES)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("strict-versioning")
                .long("strict-versioning")
                .help("Require exact module version matching including patch digits")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("universe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_flags() {
        let args = parse(&[]);
        assert_eq!(args.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!args.development);
        assert_eq!(args.port, None);
        assert_eq!(args.archive, None);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_dev_alias_and_port() {
        let args = parse(&["--dev", "--port", "30000"]);
        assert!(args.development);
        assert_eq!(args.port, Some(30000));
    }

    #[test]
    fn test_file_alias() {
        let args = parse(&["--file", "servers/lobby.jar", "--address", "0.0.0.0"]);
        assert_eq!(args.archive, Some(PathBuf::from("servers/lobby.jar")));
        assert_eq!(args.address.as_deref(), Some("0.0.0.0"));

        let args = parse(&["--jar", "a.jar", "--development"]);
        assert_eq!(args.archive, Some(PathBuf::from("a.jar")));
        assert!(args.development);
    }

    #[test]
    fn test_logging_and_safety_flags() {
        let args = parse(&[
            "-c",
            "prod.toml",
            "-l",
            "debug",
            "--json-logs",
            "--registry",
            "/var/lib/universe",
            "--danger-allow-unsafe-modules",
            "--danger-allow-abi-mismatch",
            "--strict-versioning",
        ]);
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.registry_dir, Some(PathBuf::from("/var/lib/universe")));
        assert!(args.danger_allow_unsafe_modules);
        assert!(args.danger_allow_abi_mismatch);
        assert!(args.strict_versioning);
    }

    #[test]
    fn test_rejects_out_of_range_port() {
        let result = CliArgs::try_parse_from(["universe", "--port", "70000"]);
        assert!(result.is_err());
    }
}
