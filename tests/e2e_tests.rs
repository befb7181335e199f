// End-to-end tests over real WebSocket connections
//
// Each test binds the full router on an ephemeral port and drives it with
// tokio-tungstenite clients playing broadcaster, viewer and dashboard.

use anyhow::{anyhow, bail, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use signal_relay::{create_router, AppState, Relay};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_server(dir: &TempDir) -> Result<(SocketAddr, AppState)> {
    let state = AppState::new(Relay::new(32), dir.path().join("recordings"))?;
    let app = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, state))
}

async fn connect(addr: SocketAddr, path: &str) -> Result<Client> {
    let (client, _) = connect_async(format!("ws://{}{}", addr, path)).await?;
    Ok(client)
}

async fn send_json(client: &mut Client, value: Value) -> Result<()> {
    client.send(Message::Text(value.to_string())).await?;
    Ok(())
}

/// Next JSON text frame; `None` once the server closes the socket
async fn next_json(client: &mut Client) -> Result<Option<Value>> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for a message"))?;
        match frame {
            Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => continue,
            Some(Err(e)) => bail!("websocket error: {}", e),
        }
    }
}

async fn expect_json(client: &mut Client, kind: &str) -> Result<Value> {
    match next_json(client).await? {
        Some(message) if message["type"] == kind => Ok(message),
        Some(message) => bail!("expected {}, got {}", kind, message),
        None => bail!("expected {}, socket closed", kind),
    }
}

#[tokio::test]
async fn test_broadcast_view_and_stop() -> Result<()> {
    let dir = TempDir::new()?;
    let (addr, state) = spawn_server(&dir).await?;

    let mut dashboard = connect(addr, "/ws/dashboard").await?;
    let initial = expect_json(&mut dashboard, "stream_list").await?;
    assert_eq!(initial["streams"], json!([]));

    let mut broadcaster = connect(addr, "/ws/broadcast/s1").await?;
    send_json(
        &mut broadcaster,
        json!({"type": "start_stream", "latitude": 40.7, "longitude": -74.0, "notes": "pier"}),
    )
    .await?;
    let started = expect_json(&mut broadcaster, "stream_started").await?;
    assert_eq!(started["stream_id"], "s1");

    let roster = expect_json(&mut dashboard, "stream_list").await?;
    assert_eq!(roster["streams"][0]["id"], "s1");
    assert_eq!(roster["streams"][0]["notes"], "pier");

    let mut viewer = connect(addr, "/ws/view/s1").await?;
    let joined = expect_json(&mut broadcaster, "viewer_joined").await?;
    let viewer_id = joined["viewer_id"].clone();

    send_json(&mut broadcaster, json!({"type": "offer", "sdp": "X"})).await?;
    let offer = expect_json(&mut viewer, "offer").await?;
    assert_eq!(offer["sdp"], "X");
    assert_eq!(offer["stream_id"], "s1");

    send_json(&mut viewer, json!({"type": "answer", "sdp": "Y"})).await?;
    let answer = expect_json(&mut broadcaster, "answer").await?;
    assert_eq!(answer["sdp"], "Y");
    assert_eq!(answer["viewer_id"], viewer_id);

    send_json(&mut viewer, json!({"type": "ice_candidate", "candidate": "vc"})).await?;
    let candidate = expect_json(&mut broadcaster, "ice_candidate").await?;
    assert_eq!(candidate["candidate"], "vc");
    assert_eq!(candidate["viewer_id"], viewer_id);

    send_json(&mut broadcaster, json!({"type": "ice_candidate", "candidate": "bc"})).await?;
    let candidate = expect_json(&mut viewer, "ice_candidate").await?;
    assert_eq!(candidate["candidate"], "bc");
    assert_eq!(candidate["stream_id"], "s1");

    send_json(&mut broadcaster, json!({"type": "stop_stream"})).await?;
    expect_json(&mut viewer, "stream_ended").await?;
    let roster = expect_json(&mut dashboard, "stream_list").await?;
    assert_eq!(roster["streams"], json!([]));

    // The relay closes the broadcaster's socket after stop_stream
    assert!(next_json(&mut broadcaster).await?.is_none());
    assert!(state.relay.active_streams().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_viewer_of_missing_stream_is_told_and_closed() -> Result<()> {
    let dir = TempDir::new()?;
    let (addr, _state) = spawn_server(&dir).await?;

    let mut viewer = connect(addr, "/ws/view/nowhere").await?;
    let reply = expect_json(&mut viewer, "stream_not_found").await?;
    assert_eq!(reply["message"], "Stream not found");
    assert!(next_json(&mut viewer).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_broadcaster_disconnect_ends_stream() -> Result<()> {
    let dir = TempDir::new()?;
    let (addr, state) = spawn_server(&dir).await?;

    let mut broadcaster = connect(addr, "/ws/broadcast/s2").await?;
    send_json(&mut broadcaster, json!({"type": "start_stream"})).await?;
    expect_json(&mut broadcaster, "stream_started").await?;

    let mut viewer = connect(addr, "/ws/view/s2").await?;
    expect_json(&mut broadcaster, "viewer_joined").await?;

    // Drop the socket without a stop_stream
    drop(broadcaster);

    expect_json(&mut viewer, "stream_ended").await?;
    assert!(state.relay.active_stream("s2").await.is_none());
    assert!(state.relay.broadcaster_of("s2").await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_broadcaster_is_refused() -> Result<()> {
    let dir = TempDir::new()?;
    let (addr, state) = spawn_server(&dir).await?;

    let mut first = connect(addr, "/ws/broadcast/s3").await?;
    send_json(&mut first, json!({"type": "start_stream", "notes": "first"})).await?;
    expect_json(&mut first, "stream_started").await?;

    let mut second = connect(addr, "/ws/broadcast/s3").await?;
    send_json(&mut second, json!({"type": "start_stream", "notes": "second"})).await?;
    let error = expect_json(&mut second, "error").await?;
    assert_eq!(error["code"], "duplicate_stream");

    // The rejected connection going away leaves the original stream alone
    drop(second);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let session = state
        .relay
        .active_stream("s3")
        .await
        .ok_or_else(|| anyhow!("s3 should still be active"))?;
    assert_eq!(session.notes, "first");
    Ok(())
}
