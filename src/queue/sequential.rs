use std::{
    collections::VecDeque,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::{sync::oneshot, time::Instant};

use crate::types::OpId;

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Outcome of an enqueued operation that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum QueueError<E> {
    /// Removed by [`OperationQueue::clear`] before it started.
    #[error("operation {0} cancelled before it started")]
    Cancelled(OpId),
    /// The operation's own work failed.
    #[error("operation failed: {0}")]
    Failed(E),
    /// The operation's work panicked. The queue keeps draining.
    #[error("operation {0} panicked")]
    Panicked(OpId),
}

/// Read-only view of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    /// Operations waiting to start.
    pub pending: usize,
    /// True while a drain task is running.
    pub is_processing: bool,
    /// Operation currently executing.
    pub active: Option<OpId>,
}

impl QueueStatus {
    /// Nothing pending and nothing running.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && !self.is_processing && self.active.is_none()
    }
}

struct PendingOp {
    id: OpId,
    enqueued_at: Instant,
    job: Job,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingOp>,
    is_processing: bool,
    active: Option<OpId>,
}

struct Shared {
    state: Mutex<QueueState>,
    next_id: AtomicU64,
}

/// FIFO serializer for async work.
///
/// At most one operation executes at a time, in the order `enqueue` was
/// called. A drain task is spawned on the current tokio runtime whenever work
/// arrives at an idle queue and exits once the queue is empty again. Clones
/// share the same queue.
#[derive(Clone)]
pub struct OperationQueue {
    shared: Arc<Shared>,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("status", &self.status())
            .finish()
    }
}

impl OperationQueue {
    /// Creates an idle queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Appends `work` and returns a future for its outcome.
    ///
    /// Nothing runs synchronously: `work` is invoked later on the drain task.
    /// Must be called from within a tokio runtime. Dropping the returned future
    /// does not cancel the operation.
    pub fn enqueue<T, E, F, Fut>(&self, id: Option<OpId>, work: F) -> Enqueued<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let id = id.unwrap_or_else(|| self.generate_id());
        let (tx, rx) = oneshot::channel();
        let op_id = id.clone();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let outcome = match AssertUnwindSafe(async move { work().await })
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(QueueError::Failed(err)),
                    Err(_) => {
                        tracing::error!(op_id = %op_id, "operation panicked");
                        Err(QueueError::Panicked(op_id))
                    }
                };
                let _ = tx.send(outcome);
            })
        });

        let start_drain = {
            let mut state = self.lock();
            state.pending.push_back(PendingOp {
                id: id.clone(),
                enqueued_at: Instant::now(),
                job,
            });
            tracing::trace!(op_id = %id, pending = state.pending.len(), "enqueued");
            !std::mem::replace(&mut state.is_processing, true)
        };

        if start_drain {
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }

        Enqueued { id, rx }
    }

    /// Drops every operation that has not started yet.
    ///
    /// Their futures resolve to [`QueueError::Cancelled`]. The running
    /// operation, if any, is left to finish. Returns how many were cancelled.
    pub fn clear(&self) -> usize {
        let cancelled: Vec<PendingOp> = {
            let mut state = self.lock();
            state.pending.drain(..).collect()
        };
        if !cancelled.is_empty() {
            tracing::debug!(count = cancelled.len(), "cleared pending operations");
        }
        cancelled.len()
    }

    /// Current pending count, processing flag, and active operation.
    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            pending: state.pending.len(),
            is_processing: state.is_processing,
            active: state.active.clone(),
        }
    }

    /// Next id from this queue's counter (`op-1`, `op-2`, ...).
    pub fn generate_id(&self) -> OpId {
        let n = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        format!("op-{n}")
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        lock_state(&self.shared)
    }
}

fn lock_state(shared: &Shared) -> MutexGuard<'_, QueueState> {
    shared.state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drain(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = lock_state(&shared);
            match state.pending.pop_front() {
                Some(op) => {
                    state.active = Some(op.id.clone());
                    op
                }
                None => {
                    state.is_processing = false;
                    state.active = None;
                    return;
                }
            }
        };

        tracing::trace!(
            op_id = %next.id,
            waited_ms = next.enqueued_at.elapsed().as_millis() as u64,
            "operation started"
        );
        (next.job)().await;
        tracing::trace!(op_id = %next.id, "operation settled");

        lock_state(&shared).active = None;
    }
}

/// Future returned by [`OperationQueue::enqueue`].
#[must_use = "the outcome of an enqueued operation is only observable by awaiting it"]
pub struct Enqueued<T, E> {
    id: OpId,
    rx: oneshot::Receiver<Result<T, QueueError<E>>>,
}

impl<T, E> Unpin for Enqueued<T, E> {}

impl<T, E> Enqueued<T, E> {
    /// Id the operation was enqueued under.
    pub fn id(&self) -> &OpId {
        &self.id
    }
}

impl<T, E> Future for Enqueued<T, E> {
    type Output = Result<T, QueueError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|res| match res {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::Cancelled(this.id.clone())),
        })
    }
}
