//! Client-side sync layer for the Lanyard presence API
//! (<https://api.lanyard.rest>).
//!
//! [`PresenceSync`] is the single entry point: one-off fetches
//! ([`PresenceSync::fetch_once`]), TTL-cached fetches
//! ([`PresenceSync::fetch_cached`]), and shared poll loops that fan one
//! request stream out to any number of observers
//! ([`PresenceSync::subscribe`]). A push-based WebSocket path
//! ([`PresenceSync::subscribe_socket`]) is available as an alternative to
//! polling; both produce the same normalized [`PresenceDocument`].

mod config;
mod document;
mod error;
mod lanyard;
mod socket;
mod sync;

pub use config::SyncConfig;
pub use document::{
    avatar_url, embed_avatar_url, Activity, ActivityAssets, ActivityKind, PresenceDocument,
    PresenceStatus, PresenceUser,
};
pub use error::{FetchError, SocketError};
pub use lanyard::LanyardHttp;
pub use socket::PresenceSocket;
pub use sync::{PresenceApi, PresenceSync, Subscription, UpdateCallback};

pub use tokio_util::sync::CancellationToken;
