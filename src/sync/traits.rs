use std::sync::Arc;

use async_trait::async_trait;

use crate::document::PresenceDocument;
use crate::error::FetchError;

/// Transport seam between the sync manager and the upstream presence API.
///
/// Production code uses [`crate::LanyardHttp`]; tests inject scripted
/// implementations to drive cache and poll behavior deterministically.
#[async_trait]
pub trait PresenceApi: Send + Sync {
    /// Fetch the current presence for one identity.
    ///
    /// Upstream rejections (non-2xx, `success:false`) come back as failure
    /// documents, not errors; `Err` is reserved for transport problems.
    async fn fetch_presence(&self, identity: &str) -> Result<PresenceDocument, FetchError>;
}

/// Observer callback invoked with each delivered document.
pub type UpdateCallback = Arc<dyn Fn(&PresenceDocument) + Send + Sync>;
