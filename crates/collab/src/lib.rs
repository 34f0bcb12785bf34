/// Client-side concurrency control for multi-writer grid editing.
/// Sits between the UI and an eventually-consistent last-writer-wins
/// remote store that offers no transactions or locking of its own.
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod conflict;
pub use conflict::*;

mod version;
pub use version::*;

mod lock;
pub use lock::*;

mod batch;
pub use batch::*;

mod queue;
pub use queue::*;

mod sync;
pub use sync::*;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("cell {cell} is locked by another writer")]
    LockContention {
        cell: grid::CellId,
        holder: Option<WriterId>,
    },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("cannot merge an empty set of updates")]
    EmptyMerge,

    #[error("structural operation failed: {0}")]
    Structural(String),

    #[error("structural operation discarded before it started")]
    OperationDiscarded,
}

pub type Result<T> = std::result::Result<T, CollabError>;

/// Writer identity for a collaborative session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriterId(pub uuid::Uuid);

impl WriterId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WriterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WriterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session identifier for a collaborative editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock milliseconds, the primary conflict-resolution key
pub type TimestampMs = i64;

/// Source of wall timestamps for locally originated edits.
/// Supplied by the embedding application; tests inject fixed clocks.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> TimestampMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        chrono::Utc::now().timestamp_millis()
    }
}
