//! Syntax-tree cache with pluggable eviction and optional persistence.

mod clock;
mod persist;
mod policy;
mod tree_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::EvictionMode;
pub use tree_cache::{CacheEntry, CacheStats, SyntaxTreeCache};
