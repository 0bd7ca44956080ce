//! Per-connection outbound handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use subhub_core::{ConnectionId, IdentityId, OutboundMessage};
use tokio::sync::mpsc;
use tracing::warn;

/// A connected WebSocket client, as seen by the tasks that write to it.
///
/// All outbound frames go through [`ClientConnection::send`], which never
/// blocks: when the writer falls behind, frames are dropped and counted.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Identity that acts as the caller for every request on this connection.
    pub caller: IdentityId,
    tx: mpsc::Sender<String>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of frames dropped due to a full or closed channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, caller: IdentityId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            caller,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a raw text frame for the writer task.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send_text(&self, text: String) -> bool {
        if self.tx.try_send(text).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize an outbound frame and queue it.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send_text(json),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize frame");
                false
            }
        }
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
