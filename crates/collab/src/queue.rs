/// Strict FIFO serialization of structural (shape-changing) operations.
/// Row/column inserts and deletes are index-based read-modify-write
/// sequences over the whole grid shape; two of them interleaved race
/// destructively, so at most one runs at a time.
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{CollabError, Result};

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    processing: bool,
}

/// Handle for a queued operation, resolving with that operation's own
/// outcome once the queue reaches it.
pub struct QueuedOperation<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for QueuedOperation<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            // The queue was cleared before this operation started
            Err(_) => Err(CollabError::OperationDiscarded),
        })
    }
}

#[derive(Clone, Default)]
pub struct OperationQueue {
    state: Arc<Mutex<QueueState>>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit an operation. Operations run one at a time in exact enqueue
    /// order; a failing operation rejects only its own handle and the
    /// queue keeps draining.
    pub fn enqueue<T, F>(&self, op: F) -> QueuedOperation<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            async move {
                // Caller may have dropped its handle; the outcome is then discarded
                let _ = tx.send(op.await);
            }
            .boxed()
        });

        let start_drainer = {
            let mut state = self.lock();
            state.jobs.push_back(job);
            if state.processing {
                false
            } else {
                state.processing = true;
                true
            }
        };

        if start_drainer {
            let state = Arc::clone(&self.state);
            tokio::spawn(Self::drain(state));
        }

        QueuedOperation { rx }
    }

    async fn drain(state: Arc<Mutex<QueueState>>) {
        loop {
            let job = {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                match guard.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        guard.processing = false;
                        break;
                    }
                }
            };
            // Never start job N+1 before job N's future resolves
            job().await;
        }
        debug!("structural operation queue drained");
    }

    /// Discard all not-yet-started operations; their handles resolve with
    /// OperationDiscarded. An operation already in flight is not
    /// interrupted.
    pub fn clear(&self) {
        self.lock().jobs.clear();
    }

    /// Number of operations waiting to start (excludes one in flight).
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when nothing is queued and nothing is running.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.jobs.is_empty() && !state.processing
    }
}
