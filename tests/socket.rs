//! Socket push path against a local WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use lanyard_sync::{PresenceStatus, PresenceSync, SocketError, SyncConfig};

const INIT_STATE: &str = r#"{
    "op": 0,
    "t": "INIT_STATE",
    "d": {
        "discord_user": { "id": "4242", "username": "someone", "discriminator": "0007" },
        "discord_status": "online",
        "activities": []
    }
}"#;

const PRESENCE_UPDATE: &str = r#"{
    "op": 0,
    "t": "PRESENCE_UPDATE",
    "d": {
        "discord_user": { "id": "4242", "username": "someone", "discriminator": "0007" },
        "discord_status": "dnd",
        "activities": [
            { "type": 4, "name": "Custom Status", "state": "focus time" }
        ]
    }
}"#;

fn test_config(socket_url: String) -> SyncConfig {
    SyncConfig {
        socket_url,
        // point the REST side somewhere dead so any accidental cache miss
        // fails loudly instead of hitting the real API
        api_base_url: "http://127.0.0.1:9/v1/users".to_string(),
        connect_timeout: Duration::from_millis(500),
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn socket_delivers_normalized_events_and_warms_the_cache() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("ws addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("ws handshake");

        let frame = ws.next().await.expect("subscribe frame").expect("ws frame");
        let text = frame.into_text().expect("text frame");
        let value: serde_json::Value = serde_json::from_str(&text).expect("subscribe json");
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["subscribe_to_id"], "4242");

        ws.send(Message::Text(INIT_STATE.to_string()))
            .await
            .expect("send init state");
        // unrelated frames are ignored by the client
        ws.send(Message::Text(r#"{"op":1,"d":{"heartbeat_interval":30000}}"#.to_string()))
            .await
            .expect("send hello");
        ws.send(Message::Text(PRESENCE_UPDATE.to_string()))
            .await
            .expect("send presence update");

        // hold the connection open until the client closes
        while let Some(message) = ws.next().await {
            match message {
                Ok(message) if message.is_close() => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let sync = PresenceSync::new(test_config(format!("ws://{addr}")));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let socket = sync
        .subscribe_socket("4242", move |document| {
            let _ = tx.send(document.clone());
        })
        .await
        .expect("socket subscribe");

    let first = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first event in time")
        .expect("first event");
    assert!(first.success);
    assert_eq!(first.status, PresenceStatus::Online);

    let second = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("second event in time")
        .expect("second event");
    assert_eq!(second.status, PresenceStatus::DoNotDisturb);
    assert_eq!(second.custom_status_text.as_deref(), Some("focus time"));

    // pushed documents went through the cache: no REST call needed
    let cached = sync.fetch_cached("4242", Duration::from_secs(15)).await;
    assert_eq!(cached.status, PresenceStatus::DoNotDisturb);

    socket.close().await;
    server.await.expect("server task");
}

#[tokio::test]
async fn connect_times_out_when_the_handshake_stalls() {
    // a listener that never answers the websocket handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("ws addr");

    let sync = PresenceSync::new(test_config(format!("ws://{addr}")));
    let result = sync.subscribe_socket("4242", |_| {}).await;
    assert!(matches!(result, Err(SocketError::ConnectTimeout)));
    drop(listener);
}

#[tokio::test]
async fn connection_refused_surfaces_as_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind probe listener");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);

    let sync = PresenceSync::new(test_config(format!("ws://{addr}")));
    let result = sync.subscribe_socket("4242", |_| {}).await;
    assert!(matches!(result, Err(SocketError::Connect(_))));
}
