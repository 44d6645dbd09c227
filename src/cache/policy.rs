use lru::LruCache;
use serde::{Deserialize, Serialize};

use super::tree_cache::CacheEntry;

/// Which entry a full cache gives up first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    /// Least recently accessed.
    #[default]
    Lru,
    /// Lowest access count within a bounded window of the least recent
    /// entries.
    #[serde(alias = "lfu_lite")]
    Lfu,
    /// Oldest insertion; entries also expire `ttl_seconds` after insertion.
    Ttl,
}

impl EvictionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Ttl => "ttl",
        }
    }

    /// Whether a read moves the entry to the most-recent end.
    ///
    /// TTL mode keeps pure insertion order so the tail is always the oldest
    /// entry.
    pub const fn promotes_on_read(self) -> bool {
        !matches!(self, Self::Ttl)
    }
}

impl std::fmt::Display for EvictionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of the entry to evict next, or `None` if the cache is empty.
///
/// LFU only inspects `window` entries from the least-recent end, so the
/// cost stays bounded no matter how large the cache is. Ties go to the
/// less recent entry.
pub(crate) fn pick_victim(
    mode: EvictionMode,
    entries: &LruCache<String, CacheEntry>,
    window: usize,
) -> Option<String> {
    match mode {
        EvictionMode::Lru | EvictionMode::Ttl => entries.peek_lru().map(|(key, _)| key.clone()),
        EvictionMode::Lfu => entries
            .iter()
            .rev()
            .take(window.max(1))
            .min_by_key(|(_, entry)| entry.access_count)
            .map(|(key, _)| key.clone()),
    }
}
