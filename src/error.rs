use thiserror::Error;

/// Failures from the HTTP fetch path.
///
/// Upstream rejections (non-2xx status, `success:false` payloads) never
/// appear here: they are converted to failure documents so a flaky
/// upstream cannot crash a caller. `Cancelled` is the one variant that
/// reaches direct callers, so an intentional abort is distinguishable
/// from an unreachable upstream.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to reach presence API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("fetch cancelled by caller")]
    Cancelled,
}

/// Failures establishing the WebSocket push channel.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to connect to presence socket: {0}")]
    Connect(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("timed out connecting to presence socket")]
    ConnectTimeout,

    #[error("failed to encode subscribe message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for SocketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SocketError::Connect(Box::new(err))
    }
}
