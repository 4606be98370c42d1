//! Syntax provider implementations and their registry.

mod javascript;
mod typescript;

pub use javascript::JavaScriptProvider;
pub use typescript::{TsxProvider, TypeScriptProvider};

use super::SyntaxProvider;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static storage for JavaScript provider.
static JAVASCRIPT_PROVIDER: OnceCell<JavaScriptProvider> = OnceCell::new();

/// Static storage for TypeScript provider.
static TYPESCRIPT_PROVIDER: OnceCell<TypeScriptProvider> = OnceCell::new();

/// Static storage for TSX provider.
static TSX_PROVIDER: OnceCell<TsxProvider> = OnceCell::new();

/// Whether providers have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all available syntax providers.
///
/// This is idempotent - calling it multiple times is safe.
pub fn register_providers() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }

    JAVASCRIPT_PROVIDER.get_or_init(JavaScriptProvider::new);
    TYPESCRIPT_PROVIDER.get_or_init(TypeScriptProvider::new);
    TSX_PROVIDER.get_or_init(TsxProvider::new);
}

/// Get a provider for the given file extension (without dot).
pub fn get_provider(ext: &str) -> Option<&'static dyn SyntaxProvider> {
    register_providers();

    match ext {
        "js" | "mjs" | "cjs" | "jsx" => JAVASCRIPT_PROVIDER
            .get()
            .map(|p| p as &'static dyn SyntaxProvider),
        "ts" | "mts" | "cts" => TYPESCRIPT_PROVIDER
            .get()
            .map(|p| p as &'static dyn SyntaxProvider),
        "tsx" => TSX_PROVIDER.get().map(|p| p as &'static dyn SyntaxProvider),
        _ => None,
    }
}

/// Get a provider for a module path, by its extension.
pub fn provider_for_path(path: &str) -> Option<&'static dyn SyntaxProvider> {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    get_provider(ext)
}

/// All extensions a provider is registered for.
pub fn registered_extensions() -> Vec<&'static str> {
    vec!["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_extension() {
        assert_eq!(get_provider("js").unwrap().language_id(), "javascript");
        assert_eq!(get_provider("mts").unwrap().language_id(), "typescript");
        assert_eq!(get_provider("tsx").unwrap().language_id(), "tsx");
        assert!(get_provider("css").is_none());
    }

    #[test]
    fn test_every_registered_extension_has_provider() {
        for ext in registered_extensions() {
            let provider = get_provider(ext).unwrap();
            assert!(provider.handles_extension(ext), "{}", ext);
        }
    }

    #[test]
    fn test_provider_for_path() {
        assert!(provider_for_path("src/a/my-el.ts").is_some());
        assert!(provider_for_path("README.md").is_none());
    }
}
