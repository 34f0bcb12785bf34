/// Version bookkeeping for optimistic updates.
/// Issues monotonically increasing version numbers for local edits and
/// tracks which of them the remote store has not yet acknowledged.
use grid::CellId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct VersionManager {
    /// Global across all cells, so this writer's edits carry a total order
    counter: u64,
    pending: HashMap<CellId, u64>,
}

impl VersionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next version for a local edit and mark it pending.
    pub fn next_version(&mut self, cell: CellId) -> u64 {
        self.counter += 1;
        self.pending.insert(cell, self.counter);
        self.counter
    }

    /// Drop the pending entry once the store acknowledged persistence.
    /// Silent no-op for untracked cells.
    pub fn confirm(&mut self, cell: CellId) {
        self.pending.remove(&cell);
    }

    /// Drop the pending entry on failure. The counter is never decremented,
    /// so a rolled-back version number cannot be reissued and a late
    /// duplicate cannot pass for a fresh edit.
    pub fn rollback(&mut self, cell: CellId) {
        self.pending.remove(&cell);
    }

    /// True iff any edit is still awaiting confirmation. Gates
    /// flush-on-unload in the embedding application.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_version(&self, cell: CellId) -> Option<u64> {
        self.pending.get(&cell).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
