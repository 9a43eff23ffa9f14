//! Cache, subscription groups, and the shared poll loops behind them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::traits::{PresenceApi, UpdateCallback};
use crate::config::SyncConfig;
use crate::document::PresenceDocument;
use crate::error::{FetchError, SocketError};
use crate::lanyard::LanyardHttp;
use crate::socket::PresenceSocket;

struct CacheEntry {
    document: PresenceDocument,
    expires_at: Instant,
}

struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// All observers of one identity, multiplexed onto a single poll task.
/// Exists exactly as long as the observer set is non-empty.
struct SubscriptionGroup {
    subscribers: HashMap<u64, UpdateCallback>,
    poll: PollHandle,
    last_fingerprint: Option<String>,
}

struct SyncShared {
    api: Arc<dyn PresenceApi>,
    config: SyncConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
    groups: Mutex<HashMap<String, SubscriptionGroup>>,
    next_subscriber_id: AtomicU64,
}

/// Cached, shared-polling access to presence documents.
///
/// One instance owns the process-wide cache and subscription state; hand
/// clones to consumers instead of reaching for a global.
#[derive(Clone)]
pub struct PresenceSync {
    shared: Arc<SyncShared>,
}

impl PresenceSync {
    pub fn new(config: SyncConfig) -> Self {
        let api = Arc::new(LanyardHttp::new(config.clone()));
        Self::with_api(config, api)
    }

    /// Build against a caller-supplied transport.
    pub fn with_api(config: SyncConfig, api: Arc<dyn PresenceApi>) -> Self {
        Self {
            shared: Arc::new(SyncShared {
                api,
                config,
                cache: Mutex::new(HashMap::new()),
                groups: Mutex::new(HashMap::new()),
                next_subscriber_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// One uncached lookup. Transport and upstream failures come back as
    /// failure documents; this never errors and never panics.
    pub async fn fetch_once(&self, identity: &str) -> PresenceDocument {
        self.shared.fetch_once(identity).await
    }

    /// Like [`PresenceSync::fetch_once`], but abortable. The only error
    /// returned is [`FetchError::Cancelled`]; cancellation drops the
    /// in-flight request and leaves the cache untouched.
    pub async fn fetch_once_cancellable(
        &self,
        identity: &str,
        cancel: &CancellationToken,
    ) -> Result<PresenceDocument, FetchError> {
        tokio::select! {
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            document = self.shared.fetch_once(identity) => Ok(document),
        }
    }

    /// Cached lookup: returns the stored document while it is fresh,
    /// otherwise fetches and stores with `ttl` (failures are stored with
    /// the shorter failure TTL).
    pub async fn fetch_cached(&self, identity: &str, ttl: Duration) -> PresenceDocument {
        self.shared.fetch_cached(identity, ttl).await
    }

    /// Register an observer for an identity, starting its shared poll
    /// loop if this is the first one. The loop fetches immediately, then
    /// every `interval`, and notifies observers only when the document's
    /// fingerprint changed. An already-cached document is delivered to
    /// the new observer synchronously.
    ///
    /// The loop keeps the interval of the subscriber that started it;
    /// later subscribers join at that cadence.
    pub fn subscribe<F>(&self, identity: &str, on_update: F, interval: Duration) -> Subscription
    where
        F: Fn(&PresenceDocument) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let callback: UpdateCallback = Arc::new(on_update);

        {
            let mut groups = self.shared.groups.lock();
            // Existence check and loop start stay under one lock with no
            // await point, so concurrent subscribes cannot race a second
            // loop into existence.
            let group = groups.entry(identity.to_string()).or_insert_with(|| {
                tracing::debug!("Starting poll loop for {}", identity);
                let cancel = CancellationToken::new();
                let task = tokio::spawn(poll_loop(
                    Arc::clone(&self.shared),
                    identity.to_string(),
                    interval,
                    cancel.clone(),
                ));
                SubscriptionGroup {
                    subscribers: HashMap::new(),
                    poll: PollHandle { cancel, task },
                    last_fingerprint: None,
                }
            });
            group.subscribers.insert(id, Arc::clone(&callback));
        }

        // Known data is handed over right away; a new observer should not
        // sit through a full interval for a document we already hold.
        let cached = {
            let cache = self.shared.cache.lock();
            cache.get(identity).map(|entry| entry.document.clone())
        };
        if let Some(document) = cached {
            callback(&document);
        }

        Subscription {
            shared: Arc::downgrade(&self.shared),
            identity: identity.to_string(),
            id,
        }
    }

    /// Push-based alternative to [`PresenceSync::subscribe`]: connects to
    /// the presence socket, subscribes to `identity`, and invokes
    /// `on_update` for every pushed state. Documents received this way
    /// also warm the cache.
    pub async fn subscribe_socket<F>(
        &self,
        identity: &str,
        on_update: F,
    ) -> Result<PresenceSocket, SocketError>
    where
        F: Fn(&PresenceDocument) + Send + Sync + 'static,
    {
        let shared = Arc::downgrade(&self.shared);
        let cache_key = identity.to_string();
        let sink: UpdateCallback = Arc::new(move |document: &PresenceDocument| {
            if let Some(shared) = shared.upgrade() {
                shared.store_document(&cache_key, document);
            }
            on_update(document);
        });
        PresenceSocket::connect(&self.shared.config, identity, sink).await
    }

    /// Drop one cached entry, or all of them. Active subscriptions are
    /// unaffected beyond their next tick fetching for real.
    pub fn clear_cache(&self, identity: Option<&str>) {
        let mut cache = self.shared.cache.lock();
        match identity {
            Some(identity) => {
                cache.remove(identity);
            }
            None => cache.clear(),
        }
    }

    pub fn subscriber_count(&self, identity: &str) -> usize {
        self.shared
            .groups
            .lock()
            .get(identity)
            .map_or(0, |group| group.subscribers.len())
    }

    /// Stop every poll loop and clear all state. Outstanding
    /// [`Subscription`] handles become no-ops.
    pub fn shutdown(&self) {
        let mut groups = self.shared.groups.lock();
        for (identity, group) in groups.drain() {
            tracing::debug!("Stopping poll loop for {}", identity);
            group.poll.stop();
        }
        drop(groups);
        self.shared.cache.lock().clear();
    }
}

impl SyncShared {
    async fn fetch_once(&self, identity: &str) -> PresenceDocument {
        match self.api.fetch_presence(identity).await {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!("Presence fetch failed for {}: {}", identity, error);
                PresenceDocument::failure(error.to_string())
            }
        }
    }

    async fn fetch_cached(&self, identity: &str, ttl: Duration) -> PresenceDocument {
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(identity) {
                if Instant::now() < entry.expires_at {
                    return entry.document.clone();
                }
            }
        }

        let document = self.fetch_once(identity).await;

        // failed lookups are still cached, briefly, to damp retry storms
        let effective_ttl = if document.success {
            ttl
        } else {
            self.config.failure_ttl.min(ttl)
        };
        let entry = CacheEntry {
            document: document.clone(),
            expires_at: Instant::now() + effective_ttl,
        };
        // entries are replaced wholesale, never patched in place
        self.cache.lock().insert(identity.to_string(), entry);

        document
    }

    fn store_document(&self, identity: &str, document: &PresenceDocument) {
        let entry = CacheEntry {
            document: document.clone(),
            expires_at: Instant::now() + self.config.cache_ttl,
        };
        self.cache.lock().insert(identity.to_string(), entry);
    }
}

/// Handle for one registered observer. Dropping it (or calling
/// [`Subscription::unsubscribe`]) removes the observer; the identity's
/// poll loop stops the moment its last observer is gone.
#[must_use = "dropping the handle unsubscribes immediately"]
pub struct Subscription {
    shared: Weak<SyncShared>,
    identity: String,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // removal happens in Drop
    }

    fn remove(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut groups = shared.groups.lock();
        let Some(group) = groups.get_mut(&self.identity) else {
            return;
        };
        group.subscribers.remove(&self.id);
        if group.subscribers.is_empty() {
            if let Some(group) = groups.remove(&self.identity) {
                tracing::debug!(
                    "Last subscriber for {} gone, stopping poll loop",
                    self.identity
                );
                group.poll.stop();
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

async fn poll_loop(
    shared: Arc<SyncShared>,
    identity: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = poll_tick(&shared, &identity, interval) => {}
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    tracing::debug!("Poll loop for {} stopped", identity);
}

async fn poll_tick(shared: &SyncShared, identity: &str, interval: Duration) {
    // The interval doubles as this tick's cache TTL: a document some other
    // caller fetched moments ago is fresh enough to reuse, and clear_cache
    // forces the next tick onto the network.
    let document = shared.fetch_cached(identity, interval).await;

    // The group may have been torn down while the fetch was in flight.
    let callbacks = {
        let mut groups = shared.groups.lock();
        let Some(group) = groups.get_mut(identity) else {
            return;
        };
        let fingerprint = document.fingerprint();
        if group.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            None
        } else {
            group.last_fingerprint = Some(fingerprint);
            Some(group.subscribers.values().cloned().collect::<Vec<_>>())
        }
    };

    if let Some(callbacks) = callbacks {
        for callback in callbacks {
            callback(&document);
        }
    }
}
