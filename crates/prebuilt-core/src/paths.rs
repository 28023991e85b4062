//! Cache root and scratch path resolution.

use dirs::cache_dir;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "PREBUILT_CACHE_DIR";

/// Tool cache provided by GitHub Actions runners.
pub const RUNNER_TOOL_CACHE_ENV: &str = "RUNNER_TOOL_CACHE";

/// Returns the cache root, or None if no candidate location can be resolved.
///
/// Order: `PREBUILT_CACHE_DIR`, `RUNNER_TOOL_CACHE`, then the platform cache
/// directory (`~/.cache/prebuilt` on Linux).
pub fn try_cache_root() -> Option<PathBuf> {
    for var in [CACHE_DIR_ENV, RUNNER_TOOL_CACHE_ENV] {
        if let Some(val) = std::env::var_os(var).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(val));
        }
    }
    cache_dir().map(|c| c.join("prebuilt"))
}

/// Temp path: `<root>/.tmp` (same volume as the cache, so commits can rename)
pub fn tmp_path(cache_root: &Path) -> PathBuf {
    cache_root.join(".tmp")
}

/// Extract the filename from a URL, ignoring any query string or fragment.
///
/// # Example
///
/// ```
/// use prebuilt_core::filename_from_url;
///
/// assert_eq!(filename_from_url("https://example.com/path/to/file.tar.gz"), "file.tar.gz");
/// assert_eq!(filename_from_url("https://example.com/a.zip?token=1"), "a.zip");
/// assert_eq!(filename_from_url(""), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or("");
    path.split('/').next_back().unwrap_or("")
}
