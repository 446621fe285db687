use std::{
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};

use crate::{
    backend::{BackendError, CartBackend},
    config::CartConfig,
    core::cart::CartState,
    item::{CartItem, ItemDraft},
    op::CartOp,
    queue::{Enqueued, OperationQueue, QueueError, QueueStatus},
    types::{LineKey, OpId, SessionId},
};

use super::events::CartEvent;

/// Why a cart mutation or runtime request did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// The backend rejected or failed the tool call; the local change was undone.
    #[error("cart update failed: {0}")]
    Backend(#[from] BackendError),
    /// Removed from the queue before it started.
    #[error("cart update {0} was cancelled before it started")]
    Cancelled(OpId),
    /// The mutation panicked; any local change was undone.
    #[error("cart update {0} panicked")]
    Panicked(OpId),
    /// The resync worker has shut down.
    #[error("cart runtime is no longer running")]
    ChannelClosed,
}

impl From<QueueError<CartError>> for CartError {
    fn from(value: QueueError<CartError>) -> Self {
        match value {
            QueueError::Cancelled(id) => Self::Cancelled(id),
            QueueError::Failed(err) => err,
            QueueError::Panicked(id) => Self::Panicked(id),
        }
    }
}

/// Settled result of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// Queue id of the mutation.
    pub op_id: OpId,
    /// Line after the mutation; `None` when the line no longer exists.
    pub item: Option<CartItem>,
}

/// Result of a [`CartHandle::sync_cart`] attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Local items now mirror the server.
    Applied {
        /// Number of lines after the resync.
        lines: usize,
        /// Cart total after the resync.
        total: f64,
    },
    /// Mutations were in flight; local items were left alone.
    Skipped,
    /// The snapshot fetch failed; local items were left alone.
    Failed(String),
}

struct CartShared {
    state: Mutex<CartState>,
    backend: Arc<dyn CartBackend>,
    session_id: SessionId,
    events_tx: broadcast::Sender<CartEvent>,
}

impl CartShared {
    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CartEvent) {
        let _ = self.events_tx.send(event);
    }
}

enum ResyncMsg {
    Trigger,
    Shutdown { resp: oneshot::Sender<()> },
}

/// Handle to one cart session: its optimistic state, queue, and resync worker.
///
/// Clones share the same session.
#[derive(Clone)]
pub struct CartHandle {
    shared: Arc<CartShared>,
    queue: OperationQueue,
    resync_tx: mpsc::UnboundedSender<ResyncMsg>,
}

/// Starts the resync worker for `state` and returns the session handle.
///
/// Must be called from within a tokio runtime.
pub fn spawn_cart(state: CartState, backend: Arc<dyn CartBackend>, config: CartConfig) -> CartHandle {
    let (events_tx, _) = broadcast::channel::<CartEvent>(config.event_buffer.max(1));
    let (resync_tx, resync_rx) = mpsc::unbounded_channel::<ResyncMsg>();

    let shared = Arc::new(CartShared {
        state: Mutex::new(state),
        backend,
        session_id: config.session_id.clone(),
        events_tx,
    });

    spawn_resync_worker(Arc::clone(&shared), resync_rx, config.resync_debounce());

    CartHandle {
        shared,
        queue: OperationQueue::new(),
        resync_tx,
    }
}

impl CartHandle {
    /// Receiver for every [`CartEvent`] emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Session the backend tracks this cart under.
    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    /// Adds `draft`, incrementing the line when it already exists.
    pub fn add_item(&self, draft: ItemDraft) -> MutationFuture {
        self.mutate(CartOp::Add { draft })
    }

    /// Removes the line for `key`.
    pub fn remove_item(&self, key: LineKey) -> MutationFuture {
        self.mutate(CartOp::Remove { key })
    }

    /// Sets the quantity for `key`; `quantity <= 0` removes the line.
    pub fn update_quantity(&self, key: LineKey, quantity: i64) -> MutationFuture {
        self.mutate(CartOp::SetQuantity { key, quantity })
    }

    /// Empties the cart.
    pub fn clear_cart(&self) -> MutationFuture {
        self.mutate(CartOp::Clear)
    }

    /// Replaces local items with the server snapshot unless mutations are in flight.
    pub async fn sync_cart(&self) -> SyncOutcome {
        sync_from_backend(&self.shared).await
    }

    /// Requests a debounced resync.
    pub fn request_resync(&self) -> Result<(), CartError> {
        self.resync_tx
            .send(ResyncMsg::Trigger)
            .map_err(|_| CartError::ChannelClosed)
    }

    /// Current lines, including optimistic changes.
    pub fn items(&self) -> Vec<CartItem> {
        self.shared.lock().items().to_vec()
    }

    /// Current total, rounded to cents.
    pub fn total(&self) -> f64 {
        self.shared.lock().total()
    }

    /// Copy of the full cart state, including backup and pending ids.
    pub fn snapshot(&self) -> CartState {
        self.shared.lock().clone()
    }

    /// Status of the mutation queue.
    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Cancels queued mutations that have not started.
    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    /// Cancels queued mutations and stops the resync worker.
    ///
    /// A mutation already running still settles, including any rollback.
    pub async fn shutdown(&self) -> Result<(), CartError> {
        self.queue.clear();
        let (tx, rx) = oneshot::channel();
        self.resync_tx
            .send(ResyncMsg::Shutdown { resp: tx })
            .map_err(|_| CartError::ChannelClosed)?;
        rx.await.map_err(|_| CartError::ChannelClosed)
    }

    fn mutate(&self, op: CartOp) -> MutationFuture {
        let op_id = self.queue.generate_id();
        let shared = Arc::clone(&self.shared);
        let resync_tx = self.resync_tx.clone();
        let id = op_id.clone();
        let inner = self
            .queue
            .enqueue(Some(op_id), move || run_mutation(shared, resync_tx, id, op));
        MutationFuture { inner }
    }
}

/// Future for a queued cart mutation.
#[must_use = "mutation outcomes are only observable by awaiting them"]
pub struct MutationFuture {
    inner: Enqueued<MutationOutcome, CartError>,
}

impl MutationFuture {
    /// Queue id of the mutation.
    pub fn id(&self) -> &OpId {
        self.inner.id()
    }
}

impl Future for MutationFuture {
    type Output = Result<MutationOutcome, CartError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|res| res.map_err(CartError::from))
    }
}

fn targets_missing_line(state: &CartState, op: &CartOp) -> bool {
    match op {
        CartOp::Remove { key } | CartOp::SetQuantity { key, .. } => !state.contains(key),
        CartOp::Add { .. } | CartOp::Clear => false,
    }
}

async fn run_mutation(
    shared: Arc<CartShared>,
    resync_tx: mpsc::UnboundedSender<ResyncMsg>,
    op_id: OpId,
    op: CartOp,
) -> Result<MutationOutcome, CartError> {
    let tool = op.tool_name();

    let (backup, item) = {
        let mut state = shared.lock();
        if targets_missing_line(&state, &op) {
            tracing::debug!(op_id = %op_id, tool, "line not in cart; nothing to do");
            return Ok(MutationOutcome { op_id, item: None });
        }
        let backup = state.begin(&op_id);
        let item = state.apply(&op);
        (backup, item)
    };

    tracing::debug!(op_id = %op_id, tool, "optimistic update applied");
    shared.emit(CartEvent::Optimistic {
        op_id: op_id.clone(),
        tool,
    });

    let result = match AssertUnwindSafe(shared.backend.invoke(op.to_request(&shared.session_id)))
        .catch_unwind()
        .await
    {
        Ok(result) => result.map_err(CartError::from),
        Err(_) => Err(CartError::Panicked(op_id.clone())),
    };

    let (result, idle) = {
        let mut state = shared.lock();
        let result = match result {
            Ok(_) => Ok(item),
            Err(err) => {
                state.rollback(backup);
                Err(err)
            }
        };
        let idle = state.settle(&op_id);
        (result, idle)
    };

    match &result {
        Ok(_) => {
            tracing::debug!(op_id = %op_id, tool, "mutation confirmed");
            shared.emit(CartEvent::Confirmed { op_id: op_id.clone() });
        }
        Err(err) => {
            tracing::warn!(op_id = %op_id, tool, error = %err, "mutation rejected; rolled back");
            shared.emit(CartEvent::RolledBack {
                op_id: op_id.clone(),
                error: err.to_string(),
            });
        }
    }

    if idle {
        let _ = resync_tx.send(ResyncMsg::Trigger);
    }

    let item = result?;
    Ok(MutationOutcome { op_id, item })
}

async fn sync_from_backend(shared: &CartShared) -> SyncOutcome {
    let epoch = {
        let state = shared.lock();
        if state.has_pending_mutations() {
            tracing::debug!(pending = state.pending_mutations().len(), "resync skipped; mutations in flight");
            drop(state);
            shared.emit(CartEvent::ResyncSkipped);
            return SyncOutcome::Skipped;
        }
        state.epoch()
    };

    let snapshot = match shared.backend.fetch_cart(&shared.session_id).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(session_id = %shared.session_id, error = %err, "cart resync failed");
            let error = err.to_string();
            shared.emit(CartEvent::ResyncFailed { error: error.clone() });
            return SyncOutcome::Failed(error);
        }
    };

    let applied = {
        let mut state = shared.lock();
        if state.has_pending_mutations() || state.epoch() != epoch {
            None
        } else {
            state.replace_from_snapshot(snapshot);
            Some((state.items().len(), state.total()))
        }
    };

    match applied {
        Some((lines, total)) => {
            tracing::info!(session_id = %shared.session_id, lines, total, "cart resynced");
            shared.emit(CartEvent::Resynced { lines, total });
            SyncOutcome::Applied { lines, total }
        }
        None => {
            tracing::debug!("resync discarded; a mutation started during the fetch");
            shared.emit(CartEvent::ResyncSkipped);
            SyncOutcome::Skipped
        }
    }
}

fn spawn_resync_worker(
    shared: Arc<CartShared>,
    mut rx: mpsc::UnboundedReceiver<ResyncMsg>,
    debounce: Duration,
) {
    tokio::spawn(async move {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(ResyncMsg::Trigger) => {
                            deadline = Some(Instant::now() + debounce);
                        }
                        Some(ResyncMsg::Shutdown { resp }) => {
                            let _ = resp.send(());
                            break;
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    let _ = sync_from_backend(&shared).await;
                }
            }
        }
    });
}
