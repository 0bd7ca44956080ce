//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use subhub_core::{ConnectionId, IdentityId, OutboundMessage, ProtocolError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::dispatch::{Dispatcher, HandleResult};
use super::pulse::run_pulse;
use super::tracker::ConnectionTracker;

/// Inbound frames queued ahead of the dispatch loop.
const INBOUND_QUEUE: usize = 64;

/// How long the writer may keep flushing after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-session tunables.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Interval between `Heartbeat` frames.
    pub pulse_interval: Duration,
    /// Outbound frames buffered before dropping.
    pub max_send_queue: usize,
}

/// One entry on the per-connection inbound queue.
#[derive(Debug)]
enum Inbound {
    /// A text frame to validate and dispatch.
    Frame(String),
    /// A frame that could not be decoded; answered with this error in turn.
    Rejected(ProtocolError),
}

/// Run a WebSocket session for a connected client.
///
/// 1. Spawns a writer that owns the socket sink
/// 2. Spawns the pulse loop
/// 3. Feeds inbound frames to a single dispatch loop, so requests from
///    one connection are handled strictly in arrival order
/// 4. On close or transport error, cancels the pulse and any pending delay,
///    then tears down
#[instrument(skip_all, fields(conn_id = %connection_id, caller = %caller))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    caller: IdentityId,
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<ConnectionTracker>,
    options: SessionOptions,
    shutdown: CancellationToken,
) {
    let (ws_tx, ws_rx) = ws.split();
    drive_session(
        ws_tx,
        ws_rx,
        connection_id,
        caller,
        dispatcher,
        tracker,
        options,
        shutdown,
    )
    .await;
}

#[allow(clippy::too_many_arguments)]
async fn drive_session<Tx, Rx, E>(
    mut ws_tx: Tx,
    mut ws_rx: Rx,
    connection_id: ConnectionId,
    caller: IdentityId,
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<ConnectionTracker>,
    options: SessionOptions,
    shutdown: CancellationToken,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (send_tx, mut send_rx) = mpsc::channel::<String>(options.max_send_queue.max(1));
    let connection = Arc::new(ClientConnection::new(connection_id, caller, send_tx));
    let cancel = shutdown.child_token();

    info!("client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);
    tracker.add(connection.clone()).await;

    let mut writer = tokio::spawn(async move {
        while let Some(text) = send_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let pulse = tokio::spawn(run_pulse(
        connection.clone(),
        options.pulse_interval,
        cancel.clone(),
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(INBOUND_QUEUE);
    let dispatch = tokio::spawn(run_dispatch_loop(
        inbound_rx,
        connection.clone(),
        dispatcher,
        cancel.clone(),
    ));

    let mut fault = None;
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                debug!("session cancelled by shutdown");
                break;
            }
            next = ws_rx.next() => next,
        };
        let msg = match next {
            None => break,
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(error = %e, "transport error");
                fault = Some(ProtocolError::TransportFault(e.to_string()));
                break;
            }
        };
        let item = match msg {
            Message::Text(t) => Inbound::Frame(t.as_str().to_owned()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(s) => Inbound::Frame(s.to_owned()),
                Err(_) => {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    Inbound::Rejected(ProtocolError::MalformedRequest)
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        if inbound_tx.send(item).await.is_err() {
            break;
        }
    }

    // Teardown: nothing queued after this point reaches the registry.
    cancel.cancel();
    drop(inbound_tx);
    let _ = pulse.await;
    let _ = dispatch.await;

    if let Some(err) = fault {
        let _ = connection.send(&OutboundMessage::error(&err));
    }

    let _ = tracker.remove(&connection.id).await;
    let dropped = connection.drop_count();
    let lifetime = connection.age();
    drop(connection);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(dropped, "client disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(lifetime.as_secs_f64());
}

/// Handle queued frames one at a time, in order, until the session ends.
async fn run_dispatch_loop(
    mut inbound: mpsc::Receiver<Inbound>,
    connection: Arc<ClientConnection>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = inbound.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        let reply = match item {
            Inbound::Frame(text) => match dispatcher.handle(&connection.caller, &text, &cancel).await {
                HandleResult::Reply(reply) => reply,
                HandleResult::Abandoned => break,
            },
            Inbound::Rejected(err) => dispatcher.reject(&err),
        };
        if cancel.is_cancelled() {
            break;
        }
        if !connection.send(&reply) {
            info!(conn_id = %connection.id, "failed to enqueue reply (channel full or closed)");
        }
    }
}
