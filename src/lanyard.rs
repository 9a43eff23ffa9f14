//! Lanyard REST wire format, the normalization step, and the HTTP client.
//!
//! The socket path ([`crate::socket`]) feeds its push payloads through the
//! same [`normalize_data`] so both transports produce identical documents.

use async_trait::async_trait;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;

use crate::config::SyncConfig;
use crate::document::{
    avatar_url, embed_avatar_url, Activity, ActivityAssets, ActivityKind, PresenceDocument,
    PresenceStatus, PresenceUser,
};
use crate::error::FetchError;
use crate::sync::PresenceApi;

/// Top-level REST response envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PresenceResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<PresenceData>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
}

/// Presence payload, shared by REST `data` and socket event `d` fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PresenceData {
    #[serde(default)]
    pub discord_user: Option<WireUser>,
    #[serde(default)]
    pub discord_status: Option<String>,
    #[serde(default)]
    pub activities: Vec<WireActivity>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireActivity {
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub timestamps: Option<WireTimestamps>,
    #[serde(default)]
    pub assets: Option<WireAssets>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireTimestamps {
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireAssets {
    #[serde(default)]
    pub large_image: Option<String>,
    #[serde(default)]
    pub large_text: Option<String>,
    #[serde(default)]
    pub small_image: Option<String>,
    #[serde(default)]
    pub small_text: Option<String>,
}

pub(crate) fn normalize_response(response: PresenceResponse, avatar_size: u32) -> PresenceDocument {
    if !response.success {
        let message = response
            .error
            .and_then(|error| error.message)
            .unwrap_or_else(|| "Lanyard API reported a failure".to_string());
        return PresenceDocument::failure(message);
    }
    match response.data {
        Some(data) => normalize_data(&data, avatar_size),
        None => PresenceDocument::failure("Lanyard response carried no presence data"),
    }
}

/// Build a normalized document from one presence payload. Activity order
/// is preserved as received.
pub(crate) fn normalize_data(data: &PresenceData, avatar_size: u32) -> PresenceDocument {
    let user = data.discord_user.as_ref().map(|user| {
        let resolved = match user.avatar.as_deref() {
            Some(hash) => avatar_url(&user.id, hash, avatar_size),
            None => embed_avatar_url(user.discriminator.as_deref()),
        };
        PresenceUser {
            id: user.id.clone(),
            handle: user.username.clone(),
            avatar: user.avatar.clone(),
            discriminator: user.discriminator.clone(),
            avatar_url: resolved,
        }
    });

    let status = data
        .discord_status
        .as_deref()
        .map_or(PresenceStatus::Offline, PresenceStatus::from_api);

    let activities: Vec<Activity> = data
        .activities
        .iter()
        .map(|activity| Activity {
            kind: ActivityKind::from(activity.kind),
            name: activity.name.clone(),
            details: activity.details.clone(),
            state: activity.state.clone(),
            application_id: activity.application_id.clone(),
            timestamp_start: activity.timestamps.as_ref().and_then(|t| t.start),
            timestamp_end: activity.timestamps.as_ref().and_then(|t| t.end),
            assets: activity.assets.as_ref().map(|assets| ActivityAssets {
                large_image: assets.large_image.clone(),
                large_text: assets.large_text.clone(),
                small_image: assets.small_image.clone(),
                small_text: assets.small_text.clone(),
            }),
        })
        .collect();

    let custom_status_text = activities
        .iter()
        .find(|activity| activity.kind == ActivityKind::CustomStatus)
        .and_then(|activity| activity.state.clone());

    PresenceDocument {
        success: true,
        user,
        status,
        activities,
        custom_status_text,
        error_message: None,
    }
}

/// HTTP client for the Lanyard REST endpoint.
pub struct LanyardHttp {
    client: reqwest::Client,
    config: SyncConfig,
}

impl LanyardHttp {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn fetch(&self, identity: &str) -> Result<PresenceDocument, FetchError> {
        let encoded = percent_encode(identity.as_bytes(), NON_ALPHANUMERIC);
        let url = format!("{}/{}", self.config.api_base_url, encoded);
        tracing::debug!("Fetching presence for {}", identity);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Lanyard API returned {} for {}", status.as_u16(), identity);
            return Ok(PresenceDocument::failure(format!(
                "Lanyard API returned {}",
                status.as_u16()
            )));
        }

        let parsed: PresenceResponse = response.json().await?;
        Ok(normalize_response(parsed, self.config.avatar_size))
    }
}

#[async_trait]
impl PresenceApi for LanyardHttp {
    async fn fetch_presence(&self, identity: &str) -> Result<PresenceDocument, FetchError> {
        self.fetch(identity).await
    }
}
