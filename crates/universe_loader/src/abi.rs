//! ABI compatibility checks for archive modules.
//!
//! A module reports the [`ABI_VERSION`](universe_api::ABI_VERSION) it was
//! built against as `"crate_version:rustc_version"`. By default the crate
//! versions must agree on major.minor and the compiler versions must match
//! exactly. The override flags relax either rule.

use crate::error::ModuleError;
use serde::{Deserialize, Serialize};
use tracing::warn;

const UNKNOWN_RUSTC: &str = "unknown";

/// Overrides for module compatibility validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSafetyConfig {
    /// Load modules built with a different Rust compiler.
    /// WARNING: trait object layouts may differ and crash the process.
    pub allow_unsafe_modules: bool,

    /// Load modules built against a different `universe_api` version.
    pub allow_abi_mismatch: bool,

    /// Require the crate versions to match exactly, patch included.
    pub strict_versioning: bool,
}

impl ModuleSafetyConfig {
    /// Checks a module's reported ABI version against the host's.
    pub fn validate(&self, module_version: &str, host_version: &str) -> Result<(), ModuleError> {
        let (Some((module_crate, module_rustc)), Some((host_crate, host_rustc))) =
            (module_version.split_once(':'), host_version.split_once(':'))
        else {
            return Err(ModuleError::VersionMismatch(format!(
                "expected 'crate:rustc' version strings, got module='{module_version}', host='{host_version}'"
            )));
        };

        let crates_compatible = if self.strict_versioning {
            module_crate == host_crate
        } else {
            same_major_minor(module_crate, host_crate)
        };

        if !crates_compatible {
            if !self.allow_abi_mismatch {
                let rule = if self.strict_versioning { "exact" } else { "major.minor" };
                return Err(ModuleError::VersionMismatch(format!(
                    "module built against universe_api v{module_crate}, host uses v{host_crate} ({rule} match required). \
                     Rebuild the module or pass --danger-allow-abi-mismatch to load it anyway"
                )));
            }
            warn!(
                "⚠️ Loading module with ABI version mismatch (override enabled): module v{} != host v{}",
                module_crate, host_crate
            );
        }

        let rustc_known = module_rustc != UNKNOWN_RUSTC && host_rustc != UNKNOWN_RUSTC;
        if rustc_known && module_rustc != host_rustc {
            if !self.allow_unsafe_modules {
                return Err(ModuleError::VersionMismatch(format!(
                    "module built with Rust {module_rustc}, host built with Rust {host_rustc}. \
                     Rebuild with the same compiler or pass --danger-allow-unsafe-modules (MAY CRASH)"
                )));
            }
            warn!(
                "⚠️ Loading module built with a different Rust compiler (override enabled): {} != {}",
                module_rustc, host_rustc
            );
        }

        Ok(())
    }
}

/// `"0.3.2"` and `"0.3.0"` agree; unparsable versions must be equal.
fn same_major_minor(a: &str, b: &str) -> bool {
    fn major_minor(version: &str) -> Option<(u32, u32)> {
        let mut parts = version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some((major, minor))
    }

    match (major_minor(a), major_minor(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "0.3.0:1.80.0";

    #[test]
    fn test_same_version_is_accepted() {
        assert!(ModuleSafetyConfig::default().validate(HOST, HOST).is_ok());
    }

    #[test]
    fn test_patch_difference_is_relaxed() {
        let config = ModuleSafetyConfig::default();
        assert!(config.validate("0.3.7:1.80.0", HOST).is_ok());
        assert!(config.validate("0.4.0:1.80.0", HOST).is_err());
        assert!(config.validate("1.3.0:1.80.0", HOST).is_err());
    }

    #[test]
    fn test_strict_versioning_requires_exact_match() {
        let config = ModuleSafetyConfig {
            strict_versioning: true,
            ..Default::default()
        };
        assert!(config.validate("0.3.1:1.80.0", HOST).is_err());
        assert!(config.validate(HOST, HOST).is_ok());
    }

    #[test]
    fn test_compiler_mismatch() {
        let config = ModuleSafetyConfig::default();
        let err = config.validate("0.3.0:1.79.0", HOST).unwrap_err();
        assert!(err.to_string().contains("--danger-allow-unsafe-modules"));

        assert!(config.validate("0.3.0:unknown", HOST).is_ok());
        assert!(config.validate(HOST, "0.3.0:unknown").is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = ModuleSafetyConfig {
            allow_unsafe_modules: true,
            allow_abi_mismatch: true,
            strict_versioning: false,
        };
        assert!(config.validate("9.9.9:1.60.0", HOST).is_ok());
    }

    #[test]
    fn test_malformed_versions() {
        let config = ModuleSafetyConfig {
            allow_unsafe_modules: true,
            allow_abi_mismatch: true,
            strict_versioning: false,
        };
        assert!(config.validate("garbage", HOST).is_err());
        assert!(same_major_minor("dev", "dev"));
        assert!(!same_major_minor("dev", "0.3.0"));
    }
}
