use std::collections::BTreeMap;

use super::chunk::ChunkOutcome;

/// Holds out-of-order outcomes until every lower index has been released.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next: u32,
    pending: BTreeMap<u32, ChunkOutcome>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `outcome`. Returns `false` (and drops it) if its index was
    /// already released or is already buffered.
    pub fn push(&mut self, outcome: ChunkOutcome) -> bool {
        if outcome.index < self.next || self.pending.contains_key(&outcome.index) {
            tracing::warn!(index = outcome.index, "duplicate chunk outcome dropped");
            return false;
        }
        self.pending.insert(outcome.index, outcome);
        true
    }

    /// Next outcome in index order, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<ChunkOutcome> {
        let outcome = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(outcome)
    }

    /// Index the buffer is waiting for.
    pub const fn next_index(&self) -> u32 {
        self.next
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
