//! Correlated message channel between the UI side and the backend
//!
//! Three delivery modes are supported:
//! - fire-and-forget ([`ChannelClient::send`])
//! - one-shot correlated request/response ([`ChannelClient::request`])
//! - synchronous round-trip with its own reply slot
//!   ([`ChannelClient::request_sync`])
//!
//! Correlated replies are routed through a map from correlation id to a
//! pending completion handle. The first reply for an id resolves it and
//! removes the entry; any further reply for the same id is dropped.

mod client;
mod message;

pub use client::{ChannelClient, ChannelError, PendingReply};
pub use message::{CorrelationId, Envelope, Reply, ReplyEnvelope, Request};

use tokio::sync::mpsc;

/// Backend half of a channel pair
pub struct BackendEndpoint {
    /// Requests coming from the UI side
    pub inbox: mpsc::Receiver<Envelope>,
    /// Correlated replies going back to the UI side
    pub outbox: mpsc::Sender<ReplyEnvelope>,
}

/// Create a connected UI client and backend endpoint.
///
/// Must be called inside a Tokio runtime: the client's reply router is
/// spawned here.
pub fn pair(capacity: usize) -> (ChannelClient, BackendEndpoint) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (reply_tx, reply_rx) = mpsc::channel(capacity);
    let client = ChannelClient::spawn(request_tx, reply_rx);
    (
        client,
        BackendEndpoint {
            inbox: request_rx,
            outbox: reply_tx,
        },
    )
}
