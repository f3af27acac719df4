//! End-to-end tests: real listener, real WebSocket clients.

use futures_util::{SinkExt, StreamExt};
use signal_relay::config::RelayConfig;
use signal_relay::http::{build_router, StaticAssets};
use signal_relay::server::SignalRelay;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(200);

struct TestServer {
    addr: SocketAddr,
    relay: Arc<SignalRelay>,
    _assets: tempfile::TempDir,
}

async fn start(config: RelayConfig) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>entry</html>").unwrap();

    let relay = Arc::new(SignalRelay::new(config));
    let assets = Arc::new(StaticAssets::new(dir.path(), "index.html"));
    let app = build_router(relay.clone(), assets);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        relay,
        _assets: dir,
    }
}

async fn connect(server: &TestServer) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/signaling", server.addr))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::text(text.to_string())).await.unwrap();
}

/// Next text frame, failing the test if none arrives in time.
async fn recv_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if msg.is_text() {
            return msg.to_text().unwrap().to_string();
        }
    }
}

/// Round-trips a ping so every earlier frame from `ws` has been applied.
async fn sync(ws: &mut Client) {
    send(ws, r#"{"type":"ping"}"#).await;
    assert_eq!(recv_text(ws).await, r#"{"type":"pong"}"#);
}

async fn assert_silent(ws: &mut Client) {
    if let Ok(Some(Ok(msg))) = tokio::time::timeout(QUIET, ws.next()).await {
        assert!(!msg.is_text(), "unexpected frame: {msg:?}");
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn ping_yields_pong() {
    let server = start(RelayConfig::default()).await;
    let mut ws = connect(&server).await;

    send(&mut ws, r#"{"type":"ping"}"#).await;
    assert_eq!(recv_text(&mut ws).await, r#"{"type":"pong"}"#);
    assert_silent(&mut ws).await;
    assert_eq!(server.relay.total_topics(), 0);
}

#[tokio::test]
async fn publish_reaches_peer_and_stops_after_disconnect() {
    let server = start(RelayConfig::default()).await;
    let mut a = connect(&server).await;
    let mut b = connect(&server).await;

    send(&mut a, r#"{"type":"subscribe","topics":["space-1"]}"#).await;
    send(&mut b, r#"{"type":"subscribe","topics":["space-1"]}"#).await;
    sync(&mut a).await;
    sync(&mut b).await;

    let offer = r#"{"type":"publish","topic":"space-1","payload":"offer-xyz"}"#;
    send(&mut a, offer).await;
    assert_eq!(recv_text(&mut b).await, offer);

    b.close(None).await.unwrap();
    drop(b);
    let relay = server.relay.clone();
    wait_until(|| relay.member_count("space-1") == 1).await;

    send(&mut a, offer).await;
    // The pong is the first thing A sees: nothing was echoed back.
    sync(&mut a).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn fan_out_is_byte_identical_to_every_member() {
    let server = start(RelayConfig::default()).await;
    let mut sender = connect(&server).await;
    let mut receivers = Vec::new();
    for _ in 0..3 {
        let mut ws = connect(&server).await;
        send(&mut ws, r#"{"type":"subscribe","topics":["room"]}"#).await;
        sync(&mut ws).await;
        receivers.push(ws);
    }
    send(&mut sender, r#"{"type":"subscribe","topics":["room"]}"#).await;
    sync(&mut sender).await;

    let frame = r#"{"topic":"room",  "type":"publish","sdp":{"v":0,"lines":["a","b"]},"z":null}"#;
    send(&mut sender, frame).await;

    for ws in &mut receivers {
        assert_eq!(recv_text(ws).await, frame);
    }
    sync(&mut sender).await;
}

#[tokio::test]
async fn per_connection_order_is_preserved() {
    let server = start(RelayConfig::default()).await;
    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    send(&mut b, r#"{"type":"subscribe","topics":["seq"]}"#).await;
    sync(&mut b).await;

    let frames: Vec<String> = (0..20)
        .map(|n| format!(r#"{{"type":"publish","topic":"seq","n":{n}}}"#))
        .collect();
    for frame in &frames {
        send(&mut a, frame).await;
    }
    for frame in &frames {
        assert_eq!(&recv_text(&mut b).await, frame);
    }
}

#[tokio::test]
async fn pong_arrives_behind_a_backlog() {
    let config = RelayConfig {
        outbound_queue_capacity: 1,
        ..RelayConfig::default()
    };
    let server = start(config).await;
    let mut a = connect(&server).await;
    let mut b = connect(&server).await;
    send(&mut a, r#"{"type":"subscribe","topics":["busy"]}"#).await;
    sync(&mut a).await;

    for n in 0..50 {
        send(&mut b, &format!(r#"{{"type":"publish","topic":"busy","n":{n}}}"#)).await;
    }
    sync(&mut b).await;
    send(&mut a, r#"{"type":"ping"}"#).await;

    // Some publishes may be skipped; the pong never is.
    loop {
        let text = recv_text(&mut a).await;
        if text == r#"{"type":"pong"}"# {
            break;
        }
        assert!(text.contains(r#""topic":"busy""#), "{text}");
    }
}

#[tokio::test]
async fn garbage_does_not_close_connection() {
    let server = start(RelayConfig::default()).await;
    let mut ws = connect(&server).await;

    send(&mut ws, "this is not json").await;
    send(&mut ws, r#"{"type":"subscribe","topics":"not-a-list"}"#).await;
    send(&mut ws, r#"{"type":"publish","topic":"nobody-here"}"#).await;
    send(&mut ws, r#"{"type":"mystery"}"#).await;
    ws.send(Message::binary(vec![0xffu8, 0xfe])).await.unwrap();

    sync(&mut ws).await;
    assert_eq!(server.relay.total_topics(), 0);
}

#[tokio::test]
async fn binary_json_frames_are_understood() {
    let server = start(RelayConfig::default()).await;
    let mut ws = connect(&server).await;

    ws.send(Message::binary(br#"{"type":"ping"}"#.to_vec()))
        .await
        .unwrap();
    assert_eq!(recv_text(&mut ws).await, r#"{"type":"pong"}"#);
}

#[tokio::test]
async fn abrupt_disconnect_releases_topics() {
    let server = start(RelayConfig::default()).await;
    let mut ws = connect(&server).await;
    send(&mut ws, r#"{"type":"subscribe","topics":["a","b","c"]}"#).await;
    sync(&mut ws).await;
    assert_eq!(server.relay.total_topics(), 3);

    // No close frame: just drop the TCP connection.
    drop(ws);

    let relay = server.relay.clone();
    wait_until(|| relay.total_topics() == 0 && relay.open_connections() == 0).await;
}

#[tokio::test]
async fn idle_connections_are_closed() {
    let config = RelayConfig {
        idle_timeout_secs: 1,
        ..RelayConfig::default()
    };
    let server = start(config).await;
    let mut ws = connect(&server).await;
    send(&mut ws, r#"{"type":"subscribe","topics":["quiet"]}"#).await;
    sync(&mut ws).await;

    let relay = server.relay.clone();
    wait_until(|| !relay.has_topic("quiet")).await;

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "server did not close the idle connection");
}

#[tokio::test]
async fn other_paths_serve_the_application() {
    let server = start(RelayConfig::default()).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /space/abc HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("<html>entry</html>"), "{response}");
}
