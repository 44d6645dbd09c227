//! XDG-style path utilities for configuration and cache directories.
//!
//! Prefers XDG Base Directory conventions over OS-specific locations so the
//! same layout is used on every platform.

use std::path::PathBuf;

const APP_DIR: &str = "tlp";

/// Returns the configuration directory.
///
/// Resolution order:
/// 1. `$XDG_CONFIG_HOME/tlp` if `XDG_CONFIG_HOME` is set
/// 2. `~/.config/tlp` otherwise
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Returns the cache directory.
///
/// Resolution order:
/// 1. `$XDG_CACHE_HOME/tlp` if `XDG_CACHE_HOME` is set
/// 2. `~/.cache/tlp` otherwise
pub fn cache_dir() -> PathBuf {
    xdg_dir("XDG_CACHE_HOME", ".cache")
}

/// Default location of the persisted syntax-tree cache.
pub fn tree_cache_file() -> PathBuf {
    cache_dir().join("trees.cache")
}

fn xdg_dir(env_var: &str, home_fallback: &str) -> PathBuf {
    match std::env::var_os(env_var) {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join(APP_DIR),
        _ => home_dir().join(home_fallback).join(APP_DIR),
    }
}

/// The user's home directory, or the current directory when it cannot be
/// determined (e.g. in minimal containers).
fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
