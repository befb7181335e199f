//! WebSocket endpoints
//!
//! Each accepted socket gets a connection handle from the relay and two halves:
//! a writer task that drains the handle's queue onto the socket, and a read
//! loop that feeds text frames to the role's `Session`. The read loop also
//! stops when the relay shuts the connection down. When it exits, for any
//! reason, the session's `finish` runs exactly once.

use super::state::AppState;
use crate::relay::{BroadcasterSession, DashboardSession, Flow, Session, ViewerSession};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long a closing connection may take to flush queued messages
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// WS /ws/dashboard
pub async fn dashboard_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (conn, outbound) = state.relay.open_connection();
        let shutdown = conn.shutdown_token();
        let session = DashboardSession::attach(state.relay.clone(), conn).await;
        serve(socket, outbound, shutdown, session).await;
    })
}

/// WS /ws/broadcast/:stream_id
pub async fn broadcast_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (conn, outbound) = state.relay.open_connection();
        let shutdown = conn.shutdown_token();
        let session = BroadcasterSession::new(state.relay.clone(), stream_id, conn);
        serve(socket, outbound, shutdown, session).await;
    })
}

/// WS /ws/view/:stream_id
pub async fn view_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (conn, outbound) = state.relay.open_connection();
        let shutdown = conn.shutdown_token();
        match ViewerSession::join(state.relay.clone(), stream_id, conn).await {
            Ok(session) => serve(socket, outbound, shutdown, session).await,
            Err(_) => {
                // The stream_not_found reply is already queued; flush it and close
                let (sink, _stream) = socket.split();
                write_outbound(sink, outbound).await;
            }
        }
    })
}

async fn serve<S: Session>(
    socket: WebSocket,
    outbound: mpsc::Receiver<String>,
    shutdown: CancellationToken,
    mut session: S,
) {
    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, outbound));

    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = shutdown.cancelled() => {
                debug!("Connection shut down by the relay");
                break;
            }
        };
        let Some(frame) = frame else { break };

        match frame {
            Ok(Message::Text(text)) => {
                if session.handle_text(&text).await == Flow::Close {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => debug!("Ignoring binary frame"),
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket read failed: {}", e);
                break;
            }
        }
    }

    session.finish().await;

    // Dropping the session releases the last sender, which lets the writer
    // flush what is queued and send a close frame.
    drop(session);
    match tokio::time::timeout(FLUSH_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("WebSocket writer task failed: {}", e),
        Err(_) => debug!("WebSocket writer did not flush in time"),
    }
}

/// Drain a connection's queue onto its socket until every sender is gone
async fn write_outbound(mut sink: SplitSink<WebSocket, Message>, mut outbound: mpsc::Receiver<String>) {
    while let Some(text) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!("WebSocket write failed: {}", e);
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}
