//! Push-based presence over the Lanyard WebSocket.
//!
//! Alternative to the poll loop in [`crate::sync`]: subscribe once, then
//! receive `INIT_STATE` / `PRESENCE_UPDATE` events as they happen. Both
//! transports share the wire types and normalization in
//! [`crate::lanyard`].

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::SocketError;
use crate::lanyard::{normalize_data, PresenceData};
use crate::sync::UpdateCallback;

const OP_SUBSCRIBE: u8 = 2;
const EVENT_INIT_STATE: &str = "INIT_STATE";
const EVENT_PRESENCE_UPDATE: &str = "PRESENCE_UPDATE";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
struct SubscribeFrame {
    op: u8,
    d: SubscribeTarget,
}

#[derive(Debug, Serialize)]
struct SubscribeTarget {
    subscribe_to_id: String,
}

#[derive(Debug, Deserialize)]
struct EventFrame {
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: Option<serde_json::Value>,
}

/// Live socket subscription for one identity. Dropping the handle stops
/// the listen task; [`PresenceSocket::close`] does the same and waits for
/// it to finish.
pub struct PresenceSocket {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PresenceSocket {
    pub(crate) async fn connect(
        config: &SyncConfig,
        identity: &str,
        on_document: UpdateCallback,
    ) -> Result<Self, SocketError> {
        let connect_result = timeout(
            config.connect_timeout,
            connect_async(config.socket_url.as_str()),
        )
        .await;
        let (mut stream, _) = match connect_result {
            Ok(Ok(connection)) => connection,
            Ok(Err(error)) => {
                tracing::warn!("Presence socket connection error: {}", error);
                return Err(error.into());
            }
            Err(_) => {
                tracing::warn!("Presence socket connection timed out");
                return Err(SocketError::ConnectTimeout);
            }
        };

        let frame = SubscribeFrame {
            op: OP_SUBSCRIBE,
            d: SubscribeTarget {
                subscribe_to_id: identity.to_string(),
            },
        };
        stream
            .send(Message::Text(serde_json::to_string(&frame)?))
            .await?;
        tracing::debug!("Subscribed to presence events for {}", identity);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(listen(
            stream,
            identity.to_string(),
            config.avatar_size,
            on_document,
            cancel.clone(),
        ));

        Ok(Self {
            cancel,
            task: Some(task),
        })
    }

    /// Stop listening and wait for the task to wind down.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PresenceSocket {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(
    mut stream: WsStream,
    identity: String,
    avatar_size: u32,
    on_document: UpdateCallback,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = stream.close(None).await;
                break;
            }
            received = stream.next() => match received {
                Some(Ok(Message::Text(text))) => {
                    handle_event(&text, &identity, avatar_size, &on_document);
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::warn!("Presence socket for {} closed by upstream", identity);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::warn!("Presence socket error for {}: {}", identity, error);
                    break;
                }
            }
        }
    }
    tracing::debug!("Presence socket listener for {} stopped", identity);
}

fn handle_event(text: &str, identity: &str, avatar_size: u32, on_document: &UpdateCallback) {
    let frame: EventFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!("Unparseable presence socket frame for {}: {}", identity, error);
            return;
        }
    };

    match frame.t.as_deref() {
        Some(EVENT_INIT_STATE | EVENT_PRESENCE_UPDATE) => {}
        _ => return,
    }
    let Some(payload) = frame.d else { return };

    match serde_json::from_value::<PresenceData>(payload) {
        Ok(data) => {
            let document = normalize_data(&data, avatar_size);
            on_document(&document);
        }
        Err(error) => {
            tracing::warn!("Malformed presence payload for {}: {}", identity, error);
        }
    }
}
