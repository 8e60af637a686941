//! Built-in defaults: listing endpoint, download directory, cache location,
//! and the client identity sent with every request.

use std::path::{Path, PathBuf};

/// Listing endpoint queried when `--url` is not given.
pub const DEFAULT_LISTING_URL: &str = "https://www.reddit.com/r/earthporn/hot/.json?limit=10";

/// User-Agent for every outbound request. Listing APIs reject anonymous
/// default agents, so this carries the crate name and version.
pub const USER_AGENT: &str = concat!("wallgrab/", env!("CARGO_PKG_VERSION"));

/// Cache file name, used when `--cache-file` is not given. The leading dot
/// keeps it out of the `random` pick (dotfiles are never served as images).
pub const CACHE_FILENAME: &str = ".wallgrab-cache.json";

/// Platform default download directory: the per-user pictures folder on
/// Windows, the per-user cache directory elsewhere. When no home directory
/// resolves at all, a relative `wallgrab` directory is the last resort.
pub fn default_dir() -> PathBuf {
    let base = if cfg!(windows) {
        dirs::picture_dir()
    } else {
        dirs::cache_dir()
    };
    match base {
        Some(dir) => dir.join("wallgrab"),
        None => PathBuf::from("wallgrab"),
    }
}

/// Default cache file location for a download directory.
pub fn default_cache_file(dir: &Path) -> PathBuf {
    dir.join(CACHE_FILENAME)
}
