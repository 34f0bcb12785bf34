/// Advisory, time-boxed cell locks scoped to the local client's view.
/// Expiry is cooperative: stale entries are dropped lazily on the next
/// accessor call or by the periodic clear_stale sweep, never by a timer
/// firing callbacks.
use chrono::{DateTime, Duration, Utc};
use grid::CellId;
use std::collections::HashMap;

use crate::WriterId;

/// Comfortably longer than the batch-flush delay plus one network round
/// trip, so an in-flight edit cannot lose its own lock before persisting.
pub const DEFAULT_LOCK_TTL_MS: i64 = 5000;

/// Ephemeral claim over a cell
#[derive(Debug, Clone)]
pub struct CellLock {
    pub cell: CellId,
    pub holder: WriterId,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CellLockManager {
    locks: HashMap<CellId, CellLock>,
    ttl: Duration,
}

impl CellLockManager {
    pub fn new() -> Self {
        Self::with_ttl(Duration::milliseconds(DEFAULT_LOCK_TTL_MS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            locks: HashMap::new(),
            ttl,
        }
    }

    fn is_stale(&self, lock: &CellLock) -> bool {
        Utc::now() - lock.acquired_at > self.ttl
    }

    /// Claim a cell. Re-entrant for the current holder (refreshing the
    /// TTL); returns false without touching state if another writer holds
    /// a live lock. A false return means "do not apply this edit".
    pub fn acquire(&mut self, cell: CellId, holder: WriterId) -> bool {
        if let Some(existing) = self.locks.get(&cell) {
            if existing.holder != holder && !self.is_stale(existing) {
                return false;
            }
        }
        self.locks.insert(
            cell,
            CellLock {
                cell,
                holder,
                acquired_at: Utc::now(),
            },
        );
        true
    }

    /// Release a cell. No-op unless `holder` matches the lock's holder,
    /// so a writer cannot release someone else's claim.
    pub fn release(&mut self, cell: CellId, holder: WriterId) {
        let held_by_caller = self
            .locks
            .get(&cell)
            .map(|lock| lock.holder == holder)
            .unwrap_or(false);
        if held_by_caller {
            self.locks.remove(&cell);
        }
    }

    pub fn is_locked(&mut self, cell: CellId) -> bool {
        self.expire_if_stale(cell);
        self.locks.contains_key(&cell)
    }

    pub fn locked_by(&mut self, cell: CellId) -> Option<WriterId> {
        self.expire_if_stale(cell);
        self.locks.get(&cell).map(|lock| lock.holder)
    }

    fn expire_if_stale(&mut self, cell: CellId) {
        let stale = self
            .locks
            .get(&cell)
            .map(|lock| self.is_stale(lock))
            .unwrap_or(false);
        if stale {
            self.locks.remove(&cell);
        }
    }

    /// Full sweep of expired entries. Intended to run on a fixed interval
    /// so a stale lock cannot linger in a UI that never reads it.
    pub fn clear_stale(&mut self) {
        let ttl = self.ttl;
        let now = Utc::now();
        self.locks.retain(|_, lock| now - lock.acquired_at <= ttl);
    }

    /// Snapshot of live locks only.
    pub fn all_locks(&self) -> HashMap<CellId, WriterId> {
        let now = Utc::now();
        self.locks
            .values()
            .filter(|lock| now - lock.acquired_at <= self.ttl)
            .map(|lock| (lock.cell, lock.holder))
            .collect()
    }
}

impl Default for CellLockManager {
    fn default() -> Self {
        Self::new()
    }
}
