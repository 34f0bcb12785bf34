/// Debounced coalescing of cell writes.
/// A burst of edits produces exactly one flush after the burst quiesces;
/// within one window the last value per cell wins.
use grid::CellId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{PersistenceSink, Result, VersionedCellValue};

pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(100);

#[derive(Default)]
struct BatchState {
    pending: HashMap<CellId, VersionedCellValue>,
    /// Bumped on every mutation; an armed timer only fires if the epoch
    /// it was armed with is still current, which restarts the debounce
    /// window without any timer-handle bookkeeping.
    epoch: u64,
}

pub struct BatchUpdateManager {
    state: Arc<Mutex<BatchState>>,
    delay: Duration,
    sink: Arc<dyn PersistenceSink>,
}

impl BatchUpdateManager {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self::with_delay(sink, DEFAULT_FLUSH_DELAY)
    }

    pub fn with_delay(sink: Arc<dyn PersistenceSink>, delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(BatchState::default())),
            delay,
            sink,
        }
    }

    /// Insert or overwrite the pending entry for `cell` and restart the
    /// single debounce window.
    pub async fn add_update(&self, cell: CellId, value: VersionedCellValue) {
        let armed_epoch = {
            let mut state = self.state.lock().await;
            state.pending.insert(cell, value);
            state.epoch += 1;
            state.epoch
        };

        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Swap the map out synchronously before the async flush, so
            // edits arriving during the await start a fresh batch.
            let batch = {
                let mut state = state.lock().await;
                if state.epoch != armed_epoch {
                    // A newer edit restarted the window; that timer owns the flush.
                    return;
                }
                std::mem::take(&mut state.pending)
            };

            if batch.is_empty() {
                return;
            }

            // At-most-once delivery per window: no retry, no re-enqueue.
            if let Err(err) = sink.persist_batch(batch).await {
                warn!(%err, "debounced batch flush failed");
            }
        });
    }

    /// Cancel any armed timer and flush immediately. Required on session
    /// teardown so the last sub-delay-old edit is not lost. Sink failures
    /// propagate to the caller.
    pub async fn force_flush(&self) -> Result<()> {
        let batch = {
            let mut state = self.state.lock().await;
            state.epoch += 1;
            std::mem::take(&mut state.pending)
        };

        if batch.is_empty() {
            return Ok(());
        }

        self.sink.persist_batch(batch).await
    }

    /// Discard pending edits without flushing. Abandonment only, never
    /// normal shutdown.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        state.pending.clear();
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grid::CellValue;
    use crate::WriterId;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<HashMap<CellId, VersionedCellValue>>>,
    }

    #[async_trait]
    impl PersistenceSink for RecordingSink {
        async fn persist(&self, cell: CellId, value: VersionedCellValue) -> Result<()> {
            let mut single = HashMap::new();
            single.insert(cell, value);
            self.batches.lock().await.push(single);
            Ok(())
        }

        async fn persist_batch(&self, batch: HashMap<CellId, VersionedCellValue>) -> Result<()> {
            self.batches.lock().await.push(batch);
            Ok(())
        }
    }

    fn update(text: &str, version: u64) -> VersionedCellValue {
        VersionedCellValue::new(CellValue::text(text), 1000, WriterId::new(), version)
    }

    #[tokio::test]
    async fn test_burst_coalesces_to_one_flush_with_last_value() {
        let sink = Arc::new(RecordingSink::default());
        let manager = BatchUpdateManager::with_delay(sink.clone(), Duration::from_millis(20));
        let cell = CellId::new(0, 0);

        manager.add_update(cell, update("v1", 1)).await;
        manager.add_update(cell, update("v2", 2)).await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let batches = sink.batches.lock().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][&cell].value, CellValue::text("v2"));
    }

    #[tokio::test]
    async fn test_edits_to_different_cells_share_one_flush() {
        let sink = Arc::new(RecordingSink::default());
        let manager = BatchUpdateManager::with_delay(sink.clone(), Duration::from_millis(20));

        manager.add_update(CellId::new(0, 0), update("a", 1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.add_update(CellId::new(1, 1), update("b", 2)).await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let batches = sink.batches.lock().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn test_force_flush_is_immediate_and_cancels_timer() {
        let sink = Arc::new(RecordingSink::default());
        let manager = BatchUpdateManager::with_delay(sink.clone(), Duration::from_millis(50));
        let cell = CellId::new(0, 0);

        manager.add_update(cell, update("v1", 1)).await;
        manager.force_flush().await.unwrap();

        assert_eq!(sink.batches.lock().await.len(), 1);
        assert_eq!(manager.pending_len().await, 0);

        // The armed timer must not produce a second, empty flush
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(sink.batches.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_force_flush_on_empty_is_a_no_op() {
        let sink = Arc::new(RecordingSink::default());
        let manager = BatchUpdateManager::with_delay(sink.clone(), Duration::from_millis(20));

        manager.force_flush().await.unwrap();
        assert!(sink.batches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_discards_without_flushing() {
        let sink = Arc::new(RecordingSink::default());
        let manager = BatchUpdateManager::with_delay(sink.clone(), Duration::from_millis(20));

        manager.add_update(CellId::new(0, 0), update("doomed", 1)).await;
        manager.clear().await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(sink.batches.lock().await.is_empty());
        assert_eq!(manager.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_new_edit_during_flush_starts_fresh_batch() {
        let sink = Arc::new(RecordingSink::default());
        let manager = BatchUpdateManager::with_delay(sink.clone(), Duration::from_millis(10));
        let cell = CellId::new(0, 0);

        manager.add_update(cell, update("first", 1)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        manager.add_update(cell, update("second", 2)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let batches = sink.batches.lock().await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][&cell].value, CellValue::text("first"));
        assert_eq!(batches[1][&cell].value, CellValue::text("second"));
    }
}
