//! Subcommand implementations.

use std::path::Path;

use crate::config::{CacheConfig, ConfigManager};
use crate::paths;

/// Tree cache command handlers.
pub mod cache;

/// Translation command handler.
pub mod translate;

/// Offload worker entry point.
pub mod worker;

/// Config manager for `--config`, or the default location.
pub fn config_manager(path: Option<&Path>) -> ConfigManager {
    path.map_or_else(ConfigManager::new, |p| ConfigManager::with_path(p.to_path_buf()))
}

/// The CLI always persists the tree cache; without an explicit
/// `persistent_path` it lives in the cache directory.
pub fn cli_cache_config(cache: &CacheConfig) -> CacheConfig {
    let mut cache = cache.clone();
    if cache.persistent_path.is_none() {
        cache.persistent_path = Some(paths::tree_cache_file());
    }
    cache
}
