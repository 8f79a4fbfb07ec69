//! UI-side handle of the channel

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::message::{CorrelationId, Envelope, Reply, ReplyEnvelope, Request};

/// Errors surfaced to the UI side by the channel itself
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Backend is not accepting requests")]
    Closed,
    #[error("Backend dropped the request without replying")]
    Dropped,
}

type PendingMap = Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<Reply>>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable sender used by UI code to talk to the backend
///
/// The backend treats the channel as open for as long as any clone is
/// alive. Dropping the last clone is how the window signals it closed.
#[derive(Clone)]
pub struct ChannelClient {
    outbox: mpsc::Sender<Envelope>,
    pending: PendingMap,
}

impl ChannelClient {
    pub(super) fn spawn(
        outbox: mpsc::Sender<Envelope>,
        replies: mpsc::Receiver<ReplyEnvelope>,
    ) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(route_replies(replies, Arc::clone(&pending)));
        Self { outbox, pending }
    }

    /// Fire-and-forget
    pub async fn send(&self, request: Request) -> Result<(), ChannelError> {
        debug!("send {}", request.channel());
        self.outbox
            .send(Envelope::Fire(request))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Send a request tagged with a fresh correlation id.
    ///
    /// If the backend never answers, [`PendingReply::wait`] never resolves;
    /// use [`PendingReply::wait_timeout`] when a deadline is needed.
    pub async fn request(&self, request: Request) -> Result<PendingReply, ChannelError> {
        let id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        // Built before sending so a failed send still cleans up the entry
        let pending = PendingReply {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        };

        debug!("request {} [{}]", request.channel(), id);
        self.outbox
            .send(Envelope::Correlated { id, request })
            .await
            .map_err(|_| ChannelError::Closed)?;
        Ok(pending)
    }

    /// Round-trip carrying its own reply slot. Rename is answered before the
    /// backend reads the next envelope; other requests run concurrently.
    pub async fn request_sync(&self, request: Request) -> Result<Reply, ChannelError> {
        let (tx, rx) = oneshot::channel();
        debug!("request_sync {}", request.channel());
        self.outbox
            .send(Envelope::Sync { request, reply: tx })
            .await
            .map_err(|_| ChannelError::Closed)?;
        rx.await.map_err(|_| ChannelError::Dropped)
    }

    /// Number of correlated requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// A correlated request waiting for its single reply
///
/// Dropping it abandons interest: the map entry is removed and a reply
/// arriving later is discarded by the router.
pub struct PendingReply {
    id: CorrelationId,
    rx: oneshot::Receiver<Reply>,
    pending: PendingMap,
}

impl PendingReply {
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    pub async fn wait(mut self) -> Result<Reply, ChannelError> {
        (&mut self.rx).await.map_err(|_| ChannelError::Dropped)
    }

    /// Wait at most `deadline`. `Ok(None)` means the deadline won.
    pub async fn wait_timeout(mut self, deadline: Duration) -> Result<Option<Reply>, ChannelError> {
        match tokio::time::timeout(deadline, &mut self.rx).await {
            Ok(Ok(reply)) => Ok(Some(reply)),
            Ok(Err(_)) => Err(ChannelError::Dropped),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.id);
    }
}

async fn route_replies(mut replies: mpsc::Receiver<ReplyEnvelope>, pending: PendingMap) {
    while let Some(envelope) = replies.recv().await {
        let waiter = lock(&pending).remove(&envelope.correlation_id);
        match waiter {
            Some(tx) => {
                if tx.send(envelope.reply).is_err() {
                    debug!("Requester for [{}] went away", envelope.correlation_id);
                }
            }
            None => debug!(
                "Dropping reply for settled or unknown request [{}]",
                envelope.correlation_id
            ),
        }
    }
    // Backend is gone; wake every waiter with Dropped
    lock(&pending).clear();
}
