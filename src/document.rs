//! Normalized presence model shared by the polling and socket paths.

use serde::{Deserialize, Serialize};

const AVATAR_CDN_BASE: &str = "https://cdn.discordapp.com/avatars";
const EMBED_AVATAR_CDN_BASE: &str = "https://cdn.discordapp.com/embed/avatars";
const APP_ASSET_CDN_BASE: &str = "https://cdn.discordapp.com/app-assets";
const EXTERNAL_MEDIA_BASE: &str = "https://media.discordapp.net/external";
const SPOTIFY_IMAGE_BASE: &str = "https://i.scdn.co/image";

/// Number of stock embed avatars Discord serves.
const EMBED_AVATAR_COUNT: u32 = 5;

/// Overall availability reported by Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Map an upstream status string. Anything unrecognized is treated as
    /// offline rather than rejected.
    pub fn from_api(value: &str) -> Self {
        match value {
            "online" => Self::Online,
            "idle" => Self::Idle,
            "dnd" => Self::DoNotDisturb,
            _ => Self::Offline,
        }
    }

    pub fn is_online(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Idle => write!(f, "idle"),
            Self::DoNotDisturb => write!(f, "dnd"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Activity category, carried as a numeric code on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    CustomStatus,
    Competing,
    Unknown(u8),
}

impl ActivityKind {
    /// Human-readable verb for the activity header line.
    pub fn label(self) -> &'static str {
        match self {
            Self::Streaming => "Streaming",
            Self::Listening => "Listening to",
            Self::Watching => "Watching",
            Self::Competing => "Competing in",
            _ => "Playing",
        }
    }
}

impl From<u8> for ActivityKind {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Playing,
            1 => Self::Streaming,
            2 => Self::Listening,
            3 => Self::Watching,
            4 => Self::CustomStatus,
            5 => Self::Competing,
            other => Self::Unknown(other),
        }
    }
}

impl From<ActivityKind> for u8 {
    fn from(kind: ActivityKind) -> u8 {
        match kind {
            ActivityKind::Playing => 0,
            ActivityKind::Streaming => 1,
            ActivityKind::Listening => 2,
            ActivityKind::Watching => 3,
            ActivityKind::CustomStatus => 4,
            ActivityKind::Competing => 5,
            ActivityKind::Unknown(code) => code,
        }
    }
}

/// Image references attached to an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActivityAssets {
    pub large_image: Option<String>,
    pub large_text: Option<String>,
    pub small_image: Option<String>,
    pub small_text: Option<String>,
}

/// One entry from the user's activity list, in the order received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub name: String,
    pub details: Option<String>,
    pub state: Option<String>,
    pub application_id: Option<String>,
    /// Epoch milliseconds.
    pub timestamp_start: Option<i64>,
    pub timestamp_end: Option<i64>,
    pub assets: Option<ActivityAssets>,
}

impl Activity {
    pub fn large_image_url(&self) -> Option<String> {
        let image = self.assets.as_ref()?.large_image.as_deref()?;
        Some(resolve_asset_image(image, self.application_id.as_deref()))
    }

    pub fn small_image_url(&self) -> Option<String> {
        let image = self.assets.as_ref()?.small_image.as_deref()?;
        Some(resolve_asset_image(image, self.application_id.as_deref()))
    }
}

/// The user the presence belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub id: String,
    pub handle: String,
    /// Raw avatar hash, when the user has a custom avatar.
    pub avatar: Option<String>,
    pub discriminator: Option<String>,
    /// Resolved CDN URL, falling back to a stock embed avatar.
    pub avatar_url: String,
}

/// Normalized result of one presence lookup.
///
/// Lookups that fail for any recoverable reason still produce a document,
/// with `success` false and a diagnostic in `error_message`. The message
/// is for logs and placeholders only; its wording is not stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceDocument {
    pub success: bool,
    pub user: Option<PresenceUser>,
    pub status: PresenceStatus,
    pub activities: Vec<Activity>,
    /// State text of the custom-status activity, when one is present.
    pub custom_status_text: Option<String>,
    pub error_message: Option<String>,
}

impl PresenceDocument {
    /// Placeholder document for a failed lookup.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            status: PresenceStatus::Offline,
            activities: Vec::new(),
            custom_status_text: None,
            error_message: Some(message.into()),
        }
    }

    /// Serialized form used to decide whether two documents are the same
    /// for notification purposes.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// CDN URL for a custom avatar hash. Animated hashes (`a_` prefix)
/// resolve to a gif, static hashes to a png.
pub fn avatar_url(user_id: &str, avatar_hash: &str, size: u32) -> String {
    let ext = if avatar_hash.starts_with("a_") { "gif" } else { "png" };
    format!("{AVATAR_CDN_BASE}/{user_id}/{avatar_hash}.{ext}?size={size}")
}

/// Stock embed avatar for users without a custom one, picked
/// deterministically from the discriminator.
pub fn embed_avatar_url(discriminator: Option<&str>) -> String {
    let index = discriminator
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(0)
        % EMBED_AVATAR_COUNT;
    format!("{EMBED_AVATAR_CDN_BASE}/{index}.png")
}

fn resolve_asset_image(image: &str, application_id: Option<&str>) -> String {
    if let Some(rest) = image.strip_prefix("spotify:") {
        return format!("{SPOTIFY_IMAGE_BASE}/{rest}");
    }
    if let Some(rest) = image.strip_prefix("mp:external/") {
        return format!("{EXTERNAL_MEDIA_BASE}/{rest}");
    }
    format!(
        "{APP_ASSET_CDN_BASE}/{}/{image}.png",
        application_id.unwrap_or_default()
    )
}
