//! Build script for the universe_api crate.
//!
//! Records the Rust compiler version so it can be baked into `ABI_VERSION`.
//! Modules compiled with a different compiler are rejected by the loader.

use std::process::Command;

fn main() {
    let rust_version = get_rust_version();

    println!("cargo:rustc-env=UNIVERSE_RUSTC_VERSION={}", rust_version);

    println!("cargo:rerun-if-env-changed=RUSTC_VERSION");
    println!("cargo:rerun-if-changed=build.rs");
}

fn get_rust_version() -> String {
    // Some CI systems export the toolchain version directly
    if let Ok(version) = std::env::var("RUSTC_VERSION") {
        return version;
    }

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Ok(output) = Command::new(rustc).arg("--version").output() {
        if output.status.success() {
            let version_output = String::from_utf8_lossy(&output.stdout);
            // "rustc 1.75.0 (82e1608df 2023-12-21)" -> "1.75.0"
            if let Some(version_line) = version_output.lines().next() {
                let parts: Vec<&str> = version_line.split_whitespace().collect();
                if parts.len() >= 2 && parts[0] == "rustc" {
                    return parts[1].to_string();
                }
            }
        }
    }

    "unknown".to_string()
}
