//! HTTP fetch path against a local loopback server.

use std::net::TcpListener;
use std::thread;

use lanyard_sync::{ActivityKind, PresenceStatus, PresenceSync, SyncConfig};

const SUCCESS_BODY: &str = r#"{
    "success": true,
    "data": {
        "discord_user": {
            "id": "4242",
            "username": "someone",
            "discriminator": "0007",
            "avatar": "a_deadbeef"
        },
        "discord_status": "idle",
        "activities": [
            { "type": 0, "name": "Factorio", "details": "Expanding the base" },
            { "type": 4, "name": "Custom Status", "state": "afk" }
        ]
    }
}"#;

const NOT_MONITORED_BODY: &str = r#"{
    "success": false,
    "error": { "code": "user_not_monitored", "message": "User is not being monitored" }
}"#;

/// Serve `responses` in order on a random loopback port, returning the
/// API base URL and a handle yielding the request paths seen.
fn spawn_server(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("bind loopback server");
    let addr = server.server_addr().to_ip().expect("ip listener");
    let base = format!("http://{addr}/v1/users");

    let handle = thread::spawn(move || {
        let mut paths = Vec::new();
        for (status, body) in responses {
            let Ok(request) = server.recv() else { break };
            paths.push(request.url().to_string());
            let response = tiny_http::Response::from_string(body)
                .with_status_code(tiny_http::StatusCode(status))
                .with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("static header"),
                );
            let _ = request.respond(response);
        }
        paths
    });

    (base, handle)
}

fn sync_against(base: String) -> PresenceSync {
    let config = SyncConfig {
        api_base_url: base,
        ..SyncConfig::default()
    };
    PresenceSync::new(config)
}

#[tokio::test]
async fn fetch_once_normalizes_a_successful_response() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (base, server) = spawn_server(vec![(200, SUCCESS_BODY)]);
    let sync = sync_against(base);

    let document = sync.fetch_once("4242").await;
    assert!(document.success);
    assert_eq!(document.status, PresenceStatus::Idle);

    let user = document.user.as_ref().expect("user present");
    assert_eq!(user.handle, "someone");
    assert_eq!(
        user.avatar_url,
        "https://cdn.discordapp.com/avatars/4242/a_deadbeef.gif?size=128"
    );

    assert_eq!(document.activities.len(), 2);
    assert_eq!(document.activities[0].kind, ActivityKind::Playing);
    assert_eq!(document.custom_status_text.as_deref(), Some("afk"));

    let paths = server.join().expect("server thread");
    assert_eq!(paths, vec!["/v1/users/4242".to_string()]);
}

#[tokio::test]
async fn http_error_status_becomes_a_failure_document() {
    let (base, server) = spawn_server(vec![(500, "oops")]);
    let sync = sync_against(base);

    let document = sync.fetch_once("4242").await;
    assert!(!document.success);
    assert_eq!(
        document.error_message.as_deref(),
        Some("Lanyard API returned 500")
    );
    server.join().expect("server thread");
}

#[tokio::test]
async fn upstream_rejection_becomes_a_failure_document() {
    let (base, server) = spawn_server(vec![(200, NOT_MONITORED_BODY)]);
    let sync = sync_against(base);

    let document = sync.fetch_once("4242").await;
    assert!(!document.success);
    assert_eq!(
        document.error_message.as_deref(),
        Some("User is not being monitored")
    );
    server.join().expect("server thread");
}

#[tokio::test]
async fn malformed_body_becomes_a_failure_document() {
    let (base, server) = spawn_server(vec![(200, "not json")]);
    let sync = sync_against(base);

    let document = sync.fetch_once("4242").await;
    assert!(!document.success);
    assert!(document.error_message.is_some());
    server.join().expect("server thread");
}

#[tokio::test]
async fn unreachable_upstream_becomes_a_failure_document() {
    // grab a port nothing is listening on
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);

    let sync = sync_against(format!("http://{addr}/v1/users"));
    let document = sync.fetch_once("4242").await;
    assert!(!document.success);
    assert!(document.error_message.is_some());
}
