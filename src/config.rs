use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.lanyard.rest/v1/users";
const DEFAULT_SOCKET_URL: &str = "wss://api.lanyard.rest/socket";
const DEFAULT_USER_AGENT: &str = concat!("lanyard-sync/", env!("CARGO_PKG_VERSION"));
const DEFAULT_AVATAR_SIZE: u32 = 128;
const DEFAULT_CACHE_TTL_MS: u64 = 15_000;
const DEFAULT_FAILURE_TTL_MS: u64 = 5_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Endpoints and timing knobs shared by every fetch path.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// REST endpoint prefix; the identity is appended as a path segment.
    pub api_base_url: String,
    /// WebSocket endpoint for the push path.
    pub socket_url: String,
    pub user_agent: String,
    /// Pixel size requested for derived avatar URLs.
    pub avatar_size: u32,
    /// Default freshness window for cached documents.
    pub cache_ttl: Duration,
    /// Freshness window applied to failed fetches; clamped to the
    /// caller's TTL.
    pub failure_ttl: Duration,
    /// Default poll cadence for subscriptions.
    pub poll_interval: Duration,
    /// Connect + handshake deadline for the socket path.
    pub connect_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            avatar_size: DEFAULT_AVATAR_SIZE,
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            failure_ttl: Duration::from_millis(DEFAULT_FAILURE_TTL_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}
