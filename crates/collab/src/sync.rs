/// Synchronization facade: wires locking, versioning, batching, and the
/// operation queue together behind the call contract the UI layer uses.
/// The remote store itself stays behind the PersistenceSink trait.
use async_trait::async_trait;
use grid::{CellId, CellValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    resolve, BatchUpdateManager, CellLockManager, Clock, CollabError, OperationQueue,
    QueuedOperation, Result, SessionId, SystemClock, VersionManager, VersionedCellValue, WriterId,
    DEFAULT_FLUSH_DELAY, DEFAULT_LOCK_TTL_MS,
};

/// Write boundary to the remote store: a dumb last-write sink with no
/// compare-and-swap. May fail; rejection propagates to the caller.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Persist a single cell write.
    async fn persist(&self, cell: CellId, value: VersionedCellValue) -> Result<()>;

    /// Persist a coalesced batch. Defaults to one persist call per cell.
    async fn persist_batch(&self, batch: HashMap<CellId, VersionedCellValue>) -> Result<()> {
        for (cell, value) in batch {
            self.persist(cell, value).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub lock_ttl: chrono::Duration,
    pub flush_delay: Duration,
    pub sweep_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_ttl: chrono::Duration::milliseconds(DEFAULT_LOCK_TTL_MS),
            flush_delay: DEFAULT_FLUSH_DELAY,
            sweep_interval: Duration::from_secs(2),
        }
    }
}

/// Wraps the caller's sink so every persistence outcome settles the
/// version and lock state it affected: confirm + release on success,
/// rollback + release on failure. The failure itself still propagates.
struct SessionSink {
    inner: Arc<dyn PersistenceSink>,
    versions: Arc<Mutex<VersionManager>>,
    locks: Arc<Mutex<CellLockManager>>,
    writer_id: WriterId,
}

impl SessionSink {
    async fn settle(&self, cells: &[CellId], confirmed: bool) {
        let mut versions = self.versions.lock().await;
        let mut locks = self.locks.lock().await;
        for &cell in cells {
            if confirmed {
                versions.confirm(cell);
            } else {
                versions.rollback(cell);
            }
            locks.release(cell, self.writer_id);
        }
    }
}

#[async_trait]
impl PersistenceSink for SessionSink {
    async fn persist(&self, cell: CellId, value: VersionedCellValue) -> Result<()> {
        match self.inner.persist(cell, value).await {
            Ok(()) => {
                self.settle(&[cell], true).await;
                Ok(())
            }
            Err(err) => {
                self.settle(&[cell], false).await;
                Err(err)
            }
        }
    }

    async fn persist_batch(&self, batch: HashMap<CellId, VersionedCellValue>) -> Result<()> {
        let cells: Vec<CellId> = batch.keys().copied().collect();
        match self.inner.persist_batch(batch).await {
            Ok(()) => {
                self.settle(&cells, true).await;
                Ok(())
            }
            Err(err) => {
                self.settle(&cells, false).await;
                Err(err)
            }
        }
    }
}

/// One collaborative editing session for one writer.
/// Owns all concurrency-control state; nothing here survives a restart,
/// and locks are never reconciled through the remote store.
pub struct SyncSession {
    session_id: SessionId,
    writer_id: WriterId,
    clock: Arc<dyn Clock>,
    versions: Arc<Mutex<VersionManager>>,
    locks: Arc<Mutex<CellLockManager>>,
    batch: BatchUpdateManager,
    queue: OperationQueue,
    /// Settling sink shared with the batcher, kept for non-batched writes
    sink: Arc<SessionSink>,
    /// Materialized local view of resolved cell state
    state: Mutex<HashMap<CellId, VersionedCellValue>>,
    sweep: JoinHandle<()>,
}

impl SyncSession {
    pub fn new(session_id: SessionId, writer_id: WriterId, sink: Arc<dyn PersistenceSink>) -> Self {
        Self::with_config(
            session_id,
            writer_id,
            sink,
            SyncConfig::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn with_config(
        session_id: SessionId,
        writer_id: WriterId,
        sink: Arc<dyn PersistenceSink>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let versions = Arc::new(Mutex::new(VersionManager::new()));
        let locks = Arc::new(Mutex::new(CellLockManager::with_ttl(config.lock_ttl)));

        let session_sink = Arc::new(SessionSink {
            inner: sink,
            versions: Arc::clone(&versions),
            locks: Arc::clone(&locks),
            writer_id,
        });
        let batch = BatchUpdateManager::with_delay(
            Arc::clone(&session_sink) as Arc<dyn PersistenceSink>,
            config.flush_delay,
        );

        let sweep_locks = Arc::clone(&locks);
        let sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.sweep_interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                sweep_locks.lock().await.clear_stale();
            }
        });

        Self {
            session_id,
            writer_id,
            clock,
            versions,
            locks,
            batch,
            queue: OperationQueue::new(),
            sink: session_sink,
            state: Mutex::new(HashMap::new()),
            sweep,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn writer_id(&self) -> WriterId {
        self.writer_id
    }

    /// Apply a local edit: lock the cell, stamp it with a fresh version
    /// and timestamp, update the local view, and hand it to the batcher.
    /// LockContention means the edit was not applied.
    pub async fn edit_cell(&self, cell: CellId, value: CellValue) -> Result<VersionedCellValue> {
        {
            let mut locks = self.locks.lock().await;
            if !locks.acquire(cell, self.writer_id) {
                let holder = locks.locked_by(cell);
                debug!(%cell, "edit refused, cell locked by another writer");
                return Err(CollabError::LockContention { cell, holder });
            }
        }

        let version = self.versions.lock().await.next_version(cell);
        let update = VersionedCellValue::new(value, self.clock.now_ms(), self.writer_id, version);

        self.state.lock().await.insert(cell, update.clone());
        self.batch.add_update(cell, update.clone()).await;

        Ok(update)
    }

    /// Apply a local edit and persist it immediately, bypassing the
    /// debounce window. Same locking and stamping as edit_cell; the store
    /// acknowledgement (or failure) settles version and lock state before
    /// this returns.
    pub async fn edit_cell_now(&self, cell: CellId, value: CellValue) -> Result<VersionedCellValue> {
        {
            let mut locks = self.locks.lock().await;
            if !locks.acquire(cell, self.writer_id) {
                let holder = locks.locked_by(cell);
                return Err(CollabError::LockContention { cell, holder });
            }
        }

        let version = self.versions.lock().await.next_version(cell);
        let update = VersionedCellValue::new(value, self.clock.now_ms(), self.writer_id, version);

        self.state.lock().await.insert(cell, update.clone());
        self.sink.persist(cell, update.clone()).await?;

        Ok(update)
    }

    /// Read-path merge for an incoming remote change: resolve it against
    /// the local view, store and return the winner for the UI to render.
    pub async fn apply_remote(&self, cell: CellId, remote: VersionedCellValue) -> VersionedCellValue {
        let mut state = self.state.lock().await;
        let winner = match state.get(&cell) {
            Some(local) => resolve(local, &remote),
            None => remote,
        };
        state.insert(cell, winner.clone());
        winner
    }

    /// Mirror another writer's advisory lock claim into the local view,
    /// so edits to that cell are refused here until it expires or is
    /// released. Returns false if the claim lost to a live local lock.
    pub async fn observe_remote_lock(&self, cell: CellId, holder: WriterId) -> bool {
        self.locks.lock().await.acquire(cell, holder)
    }

    /// Mirror another writer's lock release.
    pub async fn observe_remote_release(&self, cell: CellId, holder: WriterId) {
        self.locks.lock().await.release(cell, holder);
    }

    /// Submit a structural operation (row/column insert or delete) for
    /// strictly serialized execution. Bypasses locking and batching.
    pub fn enqueue_structural<T, F>(&self, op: F) -> QueuedOperation<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        self.queue.enqueue(op)
    }

    /// Flush the batcher immediately. Call on teardown/session end so the
    /// last sub-delay-old edit is not lost.
    pub async fn flush_now(&self) -> Result<()> {
        self.batch.force_flush().await
    }

    /// Abandon pending cell edits without persisting them (error path
    /// only). Rolls back their versions and releases their locks.
    pub async fn abandon_pending(&self) {
        self.batch.clear().await;
        let mut versions = self.versions.lock().await;
        let mut locks = self.locks.lock().await;
        for (cell, _) in locks.all_locks() {
            versions.rollback(cell);
            locks.release(cell, self.writer_id);
        }
    }

    /// Discard structural operations that have not started yet.
    pub fn clear_structural(&self) {
        self.queue.clear();
    }

    /// True iff some local edit is still awaiting store acknowledgement.
    pub async fn has_pending_edits(&self) -> bool {
        self.versions.lock().await.has_pending()
    }

    pub async fn locked_cells(&self) -> HashMap<CellId, WriterId> {
        self.locks.lock().await.all_locks()
    }

    pub async fn locked_by(&self, cell: CellId) -> Option<WriterId> {
        self.locks.lock().await.locked_by(cell)
    }

    /// Resolved value of a cell in the local view, if any write reached it.
    pub async fn cell(&self, cell: CellId) -> Option<VersionedCellValue> {
        self.state.lock().await.get(&cell).cloned()
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.sweep.abort();
    }
}
