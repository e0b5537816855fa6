//! # Universe API
//!
//! Contracts shared between the Universe bootstrap and the server definitions
//! it loads from archives.
//!
//! A definition author implements [`ServerDefinition`], declares the hooks it
//! composes in [`ServerDefinition::declare_hooks`], registers its types with a
//! [`TypeRegistrar`] and exports them with [`export_universe!`]:
//!
//! ```rust,no_run
//! use universe_api::*;
//!
//! #[derive(Default)]
//! struct Welcome;
//!
//! impl ServerHook for Welcome {
//!     fn hook(&self, process: &ServerProcess) {
//!         tracing::info!("welcome hook bound to {}", process.local_addr());
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Lobby;
//!
//! impl ServerDefinition for Lobby {
//!     fn declare_hooks(hooks: &mut HookDeclarations) {
//!         hooks.hook::<Welcome>();
//!     }
//! }
//!
//! fn register(registrar: &mut TypeRegistrar) {
//!     registrar.definition::<Lobby>("example.Lobby");
//! }
//!
//! export_universe!(register);
//! ```
//!
//! The bootstrap owns everything around the definition: the identity slot,
//! the hook registry built at construction, and the stop guard. Those live in
//! [`UniverseServer`], the host-side wrapper around a constructed definition.

pub mod definition;
pub mod hooks;
pub mod identity;
pub mod macros;
pub mod process;
pub mod registrar;
pub mod shutdown;
pub mod types;

pub use definition::{
    DefinitionFactory, Lifecycle, LifecycleError, ServerDefinition, UniverseServer,
};
pub use hooks::{
    HookDeclaration, HookDeclarations, HookDiscoveryError, HookFactory, HookKey, HookRegistry,
    HookResolver, ServerHook,
};
pub use identity::{IdentityAssigner, IdentityError, IdentitySlot};
pub use process::{Engine, EngineError, ServerProcess};
pub use registrar::{RegisteredType, TypeKind, TypeRegistrar};
pub use shutdown::ShutdownState;
pub use types::ServerId;

// Re-exported for definition crates so they build against the same versions
pub use async_trait::async_trait;
pub use tracing;

/// Error type returned by definition and hook constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Name of the manifest entry every server archive must carry at its root.
pub const MANIFEST_ENTRY: &str = "universe.json";

/// Exported by every module: returns the module's [`ABI_VERSION`] as a C string.
pub const ABI_VERSION_SYMBOL: &[u8] = b"universe_abi_version\0";

/// Exported by every module: fills a [`TypeRegistrar`] with the module's types.
pub const REGISTER_SYMBOL: &[u8] = b"universe_register\0";

/// ABI version for module compatibility validation.
///
/// Format: `"crate_version:rust_version"`, for example `"0.3.0:1.80.0"` or
/// `"0.3.0:unknown"` when the compiler version could not be detected.
pub const ABI_VERSION: &str = {
    const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
    const RUST_VERSION: &str = env!("UNIVERSE_RUSTC_VERSION");

    const_format::concatcp!(CRATE_VERSION, ":", RUST_VERSION)
};

/// Returns build info string with version and Rust compiler version.
pub fn universe_build_info() -> String {
    format!(
        "Universe API v{} with Rust compiler v{}",
        env!("CARGO_PKG_VERSION"),
        env!("UNIVERSE_RUSTC_VERSION")
    )
}

/// Turns a panic payload into a readable message.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked with unknown payload".to_string()
    }
}
