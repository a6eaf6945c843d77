//! Integration tests for WebSocket connection, identification, ping/pong, and tab sync.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use tabsync_server::state::{AppState, Heartbeat};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port and return (base_url, addr).
async fn start_test_server() -> (String, SocketAddr) {
    let (base_url, addr, _state) = start_test_server_with(Heartbeat::default()).await;
    (base_url, addr)
}

/// Like `start_test_server`, but with custom heartbeat timing. Also returns
/// the shared state so tests can inspect the registry.
async fn start_test_server_with(heartbeat: Heartbeat) -> (String, SocketAddr, AppState) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = tabsync_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = AppState::new(db, heartbeat);

    let app = tabsync_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr, state)
}

async fn connect(addr: SocketAddr, user_id: &str) -> WsStream {
    let ws_url = format!("ws://{}/socket?userId={}", addr, user_id);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WS connect failed");
    ws_stream
}

/// Read the next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Stream ended")
            .expect("WS error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected a text frame, got: {:?}", other),
        }
    }
}

/// Assert nothing arrives for a short while.
async fn expect_silence(ws: &mut WsStream) {
    match tokio::time::timeout(Duration::from_millis(200), ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => {}
        Ok(other) => panic!("Expected no message, got: {:?}", other),
    }
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("WS send failed");
}

#[tokio::test]
async fn test_missing_user_id_closes_with_4001() {
    let (_base_url, addr, state) = start_test_server_with(Heartbeat::default()).await;

    let ws_url = format!("ws://{}/socket", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WS connect failed");

    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timed out waiting for close frame");
    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(frame.code, CloseCode::from(4001));
            assert_eq!(frame.reason.as_str(), "User ID not provided");
        }
        other => panic!("Expected close frame with 4001, got: {:?}", other),
    }

    // Rejected before registration: no user, no connection, no tab entry
    assert_eq!(state.tabs.connections().user_count(), 0);
    assert_eq!(state.tabs.store().user_count(), 0);
}

#[tokio::test]
async fn test_blank_user_id_is_rejected() {
    let (_base_url, addr, state) = start_test_server_with(Heartbeat::default()).await;

    let ws_url = format!("ws://{}/socket?userId=", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WS connect failed");

    match tokio::time::timeout(Duration::from_secs(5), ws.next()).await {
        Ok(Some(Ok(Message::Close(Some(frame))))) => {
            assert_eq!(frame.code, CloseCode::from(4001));
        }
        other => panic!("Expected close frame with 4001, got: {:?}", other),
    }

    assert!(state.tabs.connections().connections_for("").is_empty());
    assert_eq!(state.tabs.connections().user_count(), 0);
    assert!(!state.tabs.store().contains_user(""));
}

#[tokio::test]
async fn test_bootstrap_snapshot_on_connect() {
    let (_base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "alice").await;

    let bootstrap = next_json(&mut ws).await;
    assert_eq!(bootstrap, json!({"type": "openTabs", "tabs": {}}));
}

#[tokio::test]
async fn test_open_tab_broadcasts_to_all_user_connections() {
    let (_base_url, addr) = start_test_server().await;

    let mut a = connect(addr, "u1").await;
    let mut b = connect(addr, "u1").await;
    let mut other_user = connect(addr, "u2").await;
    next_json(&mut a).await;
    next_json(&mut b).await;
    next_json(&mut other_user).await;

    send_json(
        &mut a,
        json!({"type": "openTab", "tabId": "t1", "url": "http://x.com"}),
    )
    .await;

    let expected = json!({"type": "openTabs", "tabs": {"t1": "http://x.com"}});
    assert_eq!(next_json(&mut a).await, expected);
    assert_eq!(next_json(&mut b).await, expected);
    expect_silence(&mut other_user).await;
}

#[tokio::test]
async fn test_close_tab_event_and_numeric_tab_ids() {
    let (_base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "u1").await;
    next_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "openTab", "tabId": 7, "url": "http://a"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "openTabs", "tabs": {"7": "http://a"}})
    );

    send_json(&mut ws, json!({"type": "closeTab", "tabId": "7"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "openTabs", "tabs": {}})
    );
}

#[tokio::test]
async fn test_bad_messages_keep_connection_open() {
    let (_base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "u1").await;
    next_json(&mut ws).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    send_json(&mut ws, json!({"type": "reloadEverything"})).await;
    send_json(&mut ws, json!({"type": "openTab", "url": "http://missing-id"})).await;
    send_json(&mut ws, json!({"tabId": "t1"})).await;
    expect_silence(&mut ws).await;

    // Still open and still applying events
    send_json(&mut ws, json!({"type": "openTab", "tabId": "t1", "url": "http://x.com"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "openTabs", "tabs": {"t1": "http://x.com"}})
    );
}

#[tokio::test]
async fn test_ping_event_is_silent() {
    let (_base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "u1").await;
    next_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "ping"})).await;
    expect_silence(&mut ws).await;
}

#[tokio::test]
async fn test_websocket_ping_pong() {
    let (_base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "u1").await;
    next_json(&mut ws).await;

    ws.send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timed out waiting for pong");
    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_state_survives_reconnect() {
    let (_base_url, addr) = start_test_server().await;

    let mut first = connect(addr, "u1").await;
    next_json(&mut first).await;
    send_json(
        &mut first,
        json!({"type": "openTab", "tabId": "t1", "url": "http://x.com"}),
    )
    .await;
    next_json(&mut first).await;
    first.send(Message::Close(None)).await.unwrap();
    drop(first);

    let mut second = connect(addr, "u1").await;
    assert_eq!(
        next_json(&mut second).await,
        json!({"type": "openTabs", "tabs": {"t1": "http://x.com"}})
    );
}

#[tokio::test]
async fn test_http_close_sends_directive_then_state() {
    let (base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "u1").await;
    next_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "openTab", "tabId": "t1", "url": "http://x.com"})).await;
    next_json(&mut ws).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/tabs/close", base_url))
        .json(&json!({"userId": "u1", "tabId": "t1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["notified"], 1);
    assert_eq!(body["closed"], json!([{"tabId": "t1", "url": "http://x.com"}]));

    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "closeTab", "tabId": "t1", "url": "http://x.com", "userId": "u1"})
    );
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "openTabs", "tabs": {}})
    );
}

#[tokio::test]
async fn test_http_close_by_url_directive() {
    let (base_url, addr) = start_test_server().await;
    let mut ws = connect(addr, "u1").await;
    next_json(&mut ws).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/tabs/close", base_url))
        .json(&json!({"userId": "u1", "url": "http://nowhere"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // No tab matched, so only the directive arrives
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "closeTab", "url": "http://nowhere", "userId": "u1"})
    );
    expect_silence(&mut ws).await;
}

#[tokio::test]
async fn test_silent_peer_is_dropped_after_pong_timeout() {
    let heartbeat = Heartbeat {
        ping_interval: Duration::from_secs(1),
        pong_timeout: Duration::from_secs(1),
    };
    let (_base_url, addr, state) = start_test_server_with(heartbeat).await;

    // Never read from this socket, so the client never answers pings
    let _ws = connect(addr, "u1").await;

    let mut registered = state.tabs.connections().connection_count("u1");
    for _ in 0..40 {
        if registered == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
        registered = state.tabs.connections().connection_count("u1");
    }
    assert_eq!(registered, 0, "connection should be unregistered after pong timeout");
    assert_eq!(state.tabs.connections().user_count(), 0);

    // The user's (empty) tab entry outlives the connection
    assert!(state.tabs.store().contains_user("u1"));
}
