//! WebSocket upgrade endpoint and per-connection socket loop.

use crate::server::{Frame, SignalRelay};
use crate::session::Session;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upgrade handler mounted on the signaling path.
pub async fn signaling_handler(
    ws: WebSocketUpgrade,
    Extension(relay): Extension<Arc<SignalRelay>>,
) -> Response {
    let max_message_size = relay.config().max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| run_connection(relay, socket))
}

/// Drive one signaling connection until it closes.
///
/// Inbound frames are applied in arrival order by this task. Outbound
/// frames go through a bounded queue drained by a single writer task, so
/// each receiver sees frames in the order they were enqueued. Direct
/// replies wait for room in this connection's own queue; fan-out to other
/// connections never waits.
pub async fn run_connection(relay: Arc<SignalRelay>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::channel::<Frame>(relay.config().outbound_queue_capacity);

    let replies = outbox.clone();
    let mut session = Session::new(relay.clone(), outbox);
    let id = session.id();
    tracing::info!("Connection opened: {}", id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = inbox.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                tracing::debug!("Write to {} failed: {}", id, e);
                break;
            }
        }
        if let Err(e) = sink.close().await {
            tracing::debug!("Close of {} failed: {}", id, e);
        }
    });

    let idle_timeout = match relay.config().idle_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::info!("Idle timeout ({}s) for {}", limit.as_secs(), id);
                    break;
                }
            },
            None => stream.next().await,
        };

        let reply = match next {
            Some(Ok(Message::Text(text))) => session.handle_text(&text),
            Some(Ok(Message::Binary(bytes))) => session.handle_binary(&bytes),
            // Control frames are answered by the WebSocket layer itself.
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => None,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::warn!("Transport error on {}: {}", id, e);
                break;
            }
        };

        if let Some(reply) = reply {
            if replies.send(reply).await.is_err() {
                tracing::debug!("Writer for {} is gone; dropping connection", id);
                break;
            }
        }
    }

    session.close();
    // Dropping the last outbox senders ends the writer.
    drop(replies);
    drop(session);
    if let Err(e) = writer.await {
        tracing::warn!("Writer task for {} failed: {}", id, e);
    }

    tracing::info!("Connection closed: {}", id);
}
