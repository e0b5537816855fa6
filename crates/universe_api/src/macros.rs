//! Export macro for definition modules.

/// Generates the C-linkage exports a module needs to be loaded from an archive.
///
/// `$register` is a `fn(&mut TypeRegistrar)` that registers the module's
/// definitions and hooks under the names the manifest refers to.
///
/// This generates:
/// - `universe_abi_version()` - the [`ABI_VERSION`](crate::ABI_VERSION) the module was built against
/// - `universe_register()` - fills the host's registrar, with panics caught at the boundary
///
/// ```rust,ignore
/// fn register(registrar: &mut universe_api::TypeRegistrar) {
///     registrar.definition::<MyServer>("my.Server");
/// }
///
/// universe_api::export_universe!(register);
/// ```
#[macro_export]
macro_rules! export_universe {
    ($register:path) => {
        /// ABI version this module was compiled against.
        ///
        /// The returned pointer stays valid for the lifetime of the module.
        #[no_mangle]
        pub extern "C" fn universe_abi_version() -> *const std::os::raw::c_char {
            static VERSION: std::sync::OnceLock<std::ffi::CString> = std::sync::OnceLock::new();
            VERSION
                .get_or_init(|| std::ffi::CString::new($crate::ABI_VERSION).unwrap_or_default())
                .as_ptr()
        }

        /// Registers this module's types with the host.
        ///
        /// # Safety
        ///
        /// `registrar` must be a valid, exclusive pointer for the duration of
        /// the call, created by a host built against the same ABI version.
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn universe_register(registrar: *mut $crate::TypeRegistrar) -> bool {
            if registrar.is_null() {
                return false;
            }

            let registrar = &mut *registrar;
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $register(registrar))) {
                Ok(()) => true,
                Err(payload) => {
                    $crate::tracing::error!(
                        "❌ Module registration {}",
                        $crate::panic_message(payload)
                    );
                    false
                }
            }
        }
    };
}
