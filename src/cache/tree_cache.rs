use anyhow::{Context, Result, bail};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::clock::{Clock, SystemClock};
use super::persist::{self, PersistedEntry};
use super::policy::{EvictionMode, pick_victim};
use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::fs::atomic_write;
use crate::syntax::{ParsedTree, SourceParser};

/// One cached tree. Replaced wholesale on re-insert, never patched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub tree: Arc<ParsedTree>,
    pub size_bytes: u32,
    pub last_access: u64,
    pub access_count: u32,
    pub inserted_at: u64,
}

impl CacheEntry {
    fn new(key: String, tree: Arc<ParsedTree>, now: u64) -> Self {
        let size_bytes = u32::try_from(tree.estimated_bytes()).unwrap_or(u32::MAX);
        Self {
            key,
            tree,
            size_bytes,
            last_access: now,
            access_count: 0,
            inserted_at: now,
        }
    }

    const fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.inserted_at) > ttl_ms
    }

    fn touch(&mut self, now: u64) {
        self.last_access = now;
        self.access_count = self.access_count.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_evictions: u64,
    pub size_evictions: u64,
    pub eviction_mode: EvictionMode,
    pub persistent_enabled: bool,
    pub memory_bytes: usize,
    pub max_memory_bytes: Option<usize>,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    memory_bytes: usize,
    hits: u64,
    misses: u64,
    ttl_evictions: u64,
    size_evictions: u64,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(entry.size_bytes as usize);
        Some(entry)
    }
}

/// Source text → parsed tree cache shared by the control task and offload
/// jobs.
///
/// All access, including plain reads (which update recency and counters),
/// goes through one mutex.
pub struct SyntaxTreeCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
    max_memory_bytes: Option<usize>,
    parser: Arc<dyn SourceParser>,
    clock: Arc<dyn Clock>,
}

impl SyntaxTreeCache {
    /// Creates the cache, loading `persistent_path` if configured.
    pub fn new(config: CacheConfig, parser: Arc<dyn SourceParser>) -> Result<Self, ConfigError> {
        Self::with_clock(config, parser, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        parser: Arc<dyn SourceParser>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                memory_bytes: 0,
                hits: 0,
                misses: 0,
                ttl_evictions: 0,
                size_evictions: 0,
            }),
            max_memory_bytes: config.max_memory_bytes(),
            config,
            parser,
            clock,
        };

        if let Some(path) = cache.config.persistent_path.clone() {
            cache.load_from(&path);
        }

        Ok(cache)
    }

    pub fn cache_key(source: &str) -> String {
        hex::encode(Sha256::digest(source.as_bytes()))
    }

    pub const fn eviction_mode(&self) -> EvictionMode {
        self.config.eviction_mode
    }

    /// Cached tree for `source`; never parses.
    pub fn get(&self, source: &str) -> Option<Arc<ParsedTree>> {
        self.lookup(&Self::cache_key(source))
    }

    /// Cached tree for `source`, parsing and inserting it on a miss.
    pub fn parse(&self, source: &str) -> Arc<ParsedTree> {
        let key = Self::cache_key(source);
        if let Some(tree) = self.lookup(&key) {
            return tree;
        }

        // Parse without holding the lock.
        let tree = Arc::new(self.parser.parse(source));
        self.store_new(key, Arc::clone(&tree));
        tree
    }

    /// Inserts a tree produced elsewhere (e.g. by an offload worker).
    pub fn insert(&self, source: &str, tree: ParsedTree) -> Arc<ParsedTree> {
        let tree = Arc::new(tree);
        self.store_new(Self::cache_key(source), Arc::clone(&tree));
        tree
    }

    fn lookup(&self, key: &str) -> Option<Arc<ParsedTree>> {
        let now = self.clock.now_ms();
        let ttl_ms = self.ttl_ms();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let entry = if self.config.eviction_mode.promotes_on_read() {
            state.entries.get_mut(key)
        } else {
            state.entries.peek_mut(key)
        };

        let expired = match entry {
            Some(entry) if ttl_ms.is_some_and(|ttl| entry.is_expired(now, ttl)) => true,
            Some(entry) => {
                entry.touch(now);
                let tree = Arc::clone(&entry.tree);
                state.hits += 1;
                return Some(tree);
            }
            None => false,
        };

        if expired {
            state.remove(key);
            state.ttl_evictions += 1;
        }
        state.misses += 1;
        None
    }

    fn store_new(&self, key: String, tree: Arc<ParsedTree>) {
        let entry = CacheEntry::new(key, tree, self.clock.now_ms());
        let mut state = self.state.lock();
        self.store(&mut state, entry);
    }

    /// Makes room under both the entry cap and the byte budget, then inserts.
    ///
    /// Returns `false` when the entry alone exceeds the byte budget.
    fn store(&self, state: &mut CacheState, entry: CacheEntry) -> bool {
        let size = entry.size_bytes as usize;
        if self.max_memory_bytes.is_some_and(|budget| size > budget) {
            tracing::debug!(size, "tree larger than the cache memory budget; not cached");
            return false;
        }

        state.remove(&entry.key);

        while state.entries.len() >= self.config.max_size {
            if !self.evict_one(state) {
                break;
            }
        }
        if let Some(budget) = self.max_memory_bytes {
            while state.memory_bytes + size > budget {
                if !self.evict_one(state) {
                    break;
                }
            }
        }

        state.memory_bytes += size;
        state.entries.put(entry.key.clone(), entry);
        true
    }

    fn evict_one(&self, state: &mut CacheState) -> bool {
        let Some(victim) = pick_victim(
            self.config.eviction_mode,
            &state.entries,
            self.config.lfu_scan_window,
        ) else {
            return false;
        };

        if state.remove(&victim).is_some() {
            state.size_evictions += 1;
            tracing::trace!(key = %victim, mode = %self.config.eviction_mode, "evicted tree");
            true
        } else {
            false
        }
    }

    fn ttl_ms(&self) -> Option<u64> {
        (self.config.eviction_mode == EvictionMode::Ttl)
            .then(|| self.config.ttl_seconds.saturating_mul(1000))
    }

    /// Evicts every expired entry (TTL mode only) and returns how many.
    pub fn cleanup_expired_entries(&self) -> usize {
        let Some(ttl_ms) = self.ttl_ms() else {
            return 0;
        };
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        state.ttl_evictions += expired.len() as u64;

        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), "expired trees cleaned up");
        }
        expired.len()
    }

    /// Runs [`Self::cleanup_expired_entries`] every `cleanup_interval_secs`
    /// until the cache is dropped.
    ///
    /// Returns `None` outside TTL mode or when no interval is configured.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.config.eviction_mode != EvictionMode::Ttl {
            return None;
        }
        let period = Duration::from_secs(self.config.cleanup_interval_secs?);
        let cache = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.cleanup_expired_entries();
            }
        }))
    }

    pub fn get_stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            size: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            ttl_evictions: state.ttl_evictions,
            size_evictions: state.size_evictions,
            eviction_mode: self.config.eviction_mode,
            persistent_enabled: self.config.persistent_path.is_some(),
            memory_bytes: state.memory_bytes,
            max_memory_bytes: self.max_memory_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry; counters are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.memory_bytes = 0;
    }

    /// Writes all entries to `persistent_path`, least recent first.
    pub fn save_to_disk(&self) -> Result<usize> {
        let Some(path) = self.config.persistent_path.as_deref() else {
            bail!("Tree cache persistence is not configured (cache.persistent_path)");
        };

        let snapshot: Vec<PersistedEntry> = {
            let state = self.state.lock();
            state
                .entries
                .iter()
                .rev()
                .map(|(_, entry)| PersistedEntry {
                    key: entry.key.clone(),
                    tree: ParsedTree::clone(&entry.tree),
                    size_bytes: entry.size_bytes,
                    access_count: entry.access_count,
                    inserted_at: entry.inserted_at,
                    last_access: entry.last_access,
                })
                .collect()
        };

        let bytes = persist::encode(
            &snapshot,
            self.config.eviction_mode,
            self.config.enable_compression,
        )?;
        atomic_write(path, &bytes)
            .with_context(|| format!("Failed to save tree cache: {}", path.display()))?;

        tracing::debug!(entries = snapshot.len(), path = %path.display(), "tree cache saved");
        Ok(snapshot.len())
    }

    /// Best-effort load; any problem leaves the cache empty or partially
    /// filled, never fails construction.
    fn load_from(&self, path: &Path) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read tree cache; starting empty");
                return;
            }
        };

        let decoded = match persist::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring tree cache file");
                return;
            }
        };

        let now = self.clock.now_ms();
        let ttl_ms = self.ttl_ms();
        let mut skipped = decoded.skipped;
        let mut loaded = 0;
        let mut state = self.state.lock();

        for persisted in decoded.entries {
            let mut entry = CacheEntry::new(persisted.key, Arc::new(persisted.tree), persisted.inserted_at);
            entry.access_count = persisted.access_count;
            entry.last_access = persisted.last_access;
            if entry.size_bytes != persisted.size_bytes {
                tracing::trace!(
                    stored = persisted.size_bytes,
                    estimated = entry.size_bytes,
                    "tree size estimate changed since save"
                );
            }

            if ttl_ms.is_some_and(|ttl| entry.is_expired(now, ttl)) {
                skipped += 1;
                continue;
            }
            if self.store(&mut state, entry) {
                loaded += 1;
            } else {
                skipped += 1;
            }
        }

        tracing::debug!(loaded, skipped, path = %path.display(), "tree cache loaded");
    }
}

impl std::fmt::Debug for SyntaxTreeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTreeCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
