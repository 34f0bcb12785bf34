/// Last-writer-wins conflict resolution for concurrent cell edits.
/// The comparison key is (timestamp, version); cell content is never
/// inspected when picking a winner.
use grid::CellValue;
use serde::{Deserialize, Serialize};

use crate::{CollabError, Result, TimestampMs, WriterId};

/// A cell value stamped with enough metadata to arbitrate concurrent writes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionedCellValue {
    /// The cell's scalar content
    pub value: CellValue,

    /// Wall-clock milliseconds at which the writer produced this value
    pub timestamp: TimestampMs,

    /// Identity of the originating client
    pub writer_id: WriterId,

    /// Writer-local version, strictly increasing per writer (not global)
    pub version: u64,
}

impl VersionedCellValue {
    pub fn new(value: CellValue, timestamp: TimestampMs, writer_id: WriterId, version: u64) -> Self {
        Self {
            value,
            timestamp,
            writer_id,
            version,
        }
    }

    fn sort_key(&self) -> (TimestampMs, u64) {
        (self.timestamp, self.version)
    }
}

/// Pick the winner between a local and a remote write to the same cell.
///
/// A strictly greater timestamp wins outright; equal timestamps fall back
/// to the higher version. A full tie prefers `remote`, so a client never
/// resurrects its own value over an identical-keyed incoming one.
pub fn resolve(local: &VersionedCellValue, remote: &VersionedCellValue) -> VersionedCellValue {
    if local.sort_key() > remote.sort_key() {
        local.clone()
    } else {
        remote.clone()
    }
}

/// N-way merge of concurrent updates to one cell: sort descending by
/// (timestamp, version) and take the head. Pairwise resolution is not
/// associative, so this fixed reduction order is the contract.
pub fn merge_cell_updates(updates: &[VersionedCellValue]) -> Result<VersionedCellValue> {
    let mut sorted: Vec<&VersionedCellValue> = updates.iter().collect();
    sorted.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));

    match sorted.into_iter().next() {
        Some(winner) => Ok(winner.clone()),
        None => Err(CollabError::EmptyMerge),
    }
}
