//! Periodic `Heartbeat` frames.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use subhub_core::OutboundMessage;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::ClientConnection;

/// Why the pulse loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseResult {
    /// The session was torn down.
    Cancelled,
    /// The writer side of the connection is gone.
    Closed,
}

/// Send a `Heartbeat` frame every `interval` until cancelled.
///
/// The first pulse goes out one full interval after the call, not
/// immediately. A pulse that cannot be queued (writer backed up) is dropped
/// and counted on the connection; the loop keeps going. Once `cancel` fires
/// no further pulse is queued.
pub async fn run_pulse(
    connection: Arc<ClientConnection>,
    interval: Duration,
    cancel: CancellationToken,
) -> PulseResult {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return PulseResult::Cancelled,
            _ = ticker.tick() => {
                if connection.is_closed() {
                    return PulseResult::Closed;
                }
                if connection.send(&OutboundMessage::heartbeat()) {
                    counter!("pulses_sent_total").increment(1);
                } else {
                    debug!(conn_id = %connection.id, "pulse dropped");
                }
            }
        }
    }
}
