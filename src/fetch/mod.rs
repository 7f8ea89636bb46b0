//! Revalidating fetch cache
//!
//! Key-based cache over the client core, in the spirit of a
//! stale-while-revalidate data hook:
//! - an absent key skips fetching entirely
//! - keys are revalidated when mounted and when focus is regained
//! - failures are retried a fixed number of times at a fixed interval
//! - a failure (or a `success: false` envelope) is announced once per
//!   occurrence, never per retry attempt
//! - every fetch takes a sequence number; only the latest one may write
//!   to the entry

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use reqwest::Method;
use serde_json::Value;

use crate::config::FetchConfig;
use crate::http::{ApiClient, ApiError, ApiRequest, Envelope};
use crate::notify::Notice;

/// Message used when a `success: false` envelope carries none
pub const FETCH_FAILED: &str = "An error occurred while fetching data";

/// Identifies a cached resource: path plus query parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    path: String,
    query: BTreeMap<String, String>,
}

impl ResourceKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn to_request(&self, client: &ApiClient) -> ApiRequest {
        self.query
            .iter()
            .fold(client.request(Method::GET, &self.path), |req, (k, v)| {
                req.query(k.as_str(), v)
            })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        Ok(())
    }
}

/// Per-key fetch state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Settled,
    Failed,
}

/// Point-in-time view of a cache entry
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub data: Option<Envelope<Value>>,
    pub error: Option<Arc<ApiError>>,
    /// No data yet and a fetch is running
    pub is_loading: bool,
    /// A fetch is running
    pub is_validating: bool,
    pub state: FetchState,
    pub last_validated: Option<DateTime<Utc>>,
}

/// Fixed-interval retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay between attempts
    pub interval: Duration,
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            interval: Duration::from_millis(config.retry_interval_ms),
        }
    }
}

#[derive(Default)]
struct Entry {
    data: Option<Envelope<Value>>,
    error: Option<Arc<ApiError>>,
    state: FetchState,
    validating: bool,
    seq: u64,
    mounts: usize,
    last_validated: Option<DateTime<Utc>>,
    hide_notifications: bool,
    /// Last `success: false` envelope that was announced
    announced: Option<Envelope<Value>>,
}

impl Entry {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.validating && self.data.is_none(),
            is_validating: self.validating,
            state: self.state,
            last_validated: self.last_validated,
        }
    }

    /// State to fall back to when an in-flight fetch is abandoned
    fn resting_state(&self) -> FetchState {
        if self.error.is_some() {
            FetchState::Failed
        } else if self.data.is_some() {
            FetchState::Settled
        } else {
            FetchState::Idle
        }
    }
}

/// What to do once the entry lock is released
enum Followup {
    Nothing,
    Announce(String),
    ReportFailure { error: Arc<ApiError>, announce: bool },
}

/// Revalidating fetch cache
pub struct FetchCache {
    client: Arc<ApiClient>,
    retry: RetryPolicy,
    revalidate_on_focus: bool,
    revalidate_on_mount: bool,
    entries: Mutex<HashMap<ResourceKey, Entry>>,
}

impl FetchCache {
    /// Create a cache with the `[fetch]` config section
    pub fn new(client: Arc<ApiClient>, config: &FetchConfig) -> Self {
        Self {
            client,
            retry: RetryPolicy::from(config),
            revalidate_on_focus: config.revalidate_on_focus,
            revalidate_on_mount: config.revalidate_on_mount,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a cache with both revalidation triggers enabled
    pub fn with_retry(client: Arc<ApiClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            revalidate_on_focus: true,
            revalidate_on_mount: true,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current view of a key without fetching
    pub fn snapshot(&self, key: Option<&ResourceKey>) -> Option<Snapshot> {
        let key = key?;
        Some(
            self.entries()
                .get(key)
                .map(Entry::snapshot)
                .unwrap_or_else(|| Entry::default().snapshot()),
        )
    }

    /// Suppress notifications for a key (the caller shows errors itself)
    pub fn set_hide_notifications(&self, key: &ResourceKey, hide: bool) {
        self.entries().entry(key.clone()).or_default().hide_notifications = hide;
    }

    /// Register a consumer of `key`. Revalidates unless mount revalidation
    /// is disabled. An absent key does nothing.
    pub async fn mount(&self, key: Option<&ResourceKey>) -> Option<Snapshot> {
        let key = key?;
        {
            let mut entries = self.entries();
            entries.entry(key.clone()).or_default().mounts += 1;
        }

        if self.revalidate_on_mount {
            Some(self.revalidate(key).await)
        } else {
            self.snapshot(Some(key))
        }
    }

    /// Drop a consumer of `key`. When the last one leaves, any in-flight
    /// fetch loses the right to write to the entry.
    pub fn unmount(&self, key: Option<&ResourceKey>) {
        let Some(key) = key else { return };
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.mounts = entry.mounts.saturating_sub(1);
            if entry.mounts == 0 {
                entry.seq += 1;
                entry.validating = false;
                entry.state = entry.resting_state();
                tracing::debug!(key = %key, "last consumer detached");
            }
        }
    }

    /// Focus regained: revalidate every mounted key
    pub async fn focus(&self) -> Vec<Snapshot> {
        if !self.revalidate_on_focus {
            return Vec::new();
        }

        let keys: Vec<ResourceKey> = self
            .entries()
            .iter()
            .filter(|(_, e)| e.mounts > 0)
            .map(|(k, _)| k.clone())
            .collect();

        tracing::debug!(count = keys.len(), "revalidating on focus");
        join_all(keys.iter().map(|k| self.revalidate(k))).await
    }

    /// Force a fetch regardless of triggers (used after mutations)
    pub async fn refetch(&self, key: Option<&ResourceKey>) -> Option<Snapshot> {
        let key = key?;
        Some(self.revalidate(key).await)
    }

    /// Drop a cached entry
    pub fn invalidate(&self, key: &ResourceKey) {
        self.entries().remove(key);
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        tracing::debug!(count = count, "fetch cache cleared");
    }

    async fn revalidate(&self, key: &ResourceKey) -> Snapshot {
        let seq = {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            entry.seq += 1;
            entry.validating = true;
            entry.state = FetchState::Loading;
            entry.seq
        };

        let result = self.fetch_with_retry(key, seq).await;

        let (snapshot, followup) = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                tracing::debug!(key = %key, "entry invalidated while fetching");
                return Entry::default().snapshot();
            };

            if entry.seq != seq {
                tracing::debug!(key = %key, seq, latest = entry.seq, "discarding stale response");
                return entry.snapshot();
            }

            entry.validating = false;
            entry.last_validated = Some(Utc::now());

            let followup = match result {
                Ok(envelope) => {
                    let followup = if envelope.success {
                        entry.announced = None;
                        Followup::Nothing
                    } else if entry.announced.as_ref() == Some(&envelope) {
                        Followup::Nothing
                    } else {
                        entry.announced = Some(envelope.clone());
                        if entry.hide_notifications {
                            Followup::Nothing
                        } else {
                            Followup::Announce(envelope.message_or(FETCH_FAILED))
                        }
                    };
                    entry.data = Some(envelope);
                    entry.error = None;
                    entry.state = FetchState::Settled;
                    followup
                }
                Err(err) => {
                    let error = Arc::new(err);
                    entry.error = Some(Arc::clone(&error));
                    entry.state = FetchState::Failed;
                    Followup::ReportFailure {
                        error,
                        announce: !entry.hide_notifications,
                    }
                }
            };

            (entry.snapshot(), followup)
        };

        match followup {
            Followup::Nothing => {}
            Followup::Announce(message) => {
                tracing::warn!(key = %key, message = %message, "fetch returned failure envelope");
                self.client.notifier().notify(&Notice::error(message));
            }
            Followup::ReportFailure { error, announce } => {
                if self.client.handle_failure(&error, announce).is_none() && announce {
                    // Not a request failure (bad body); still tell the user once
                    self.client.notifier().notify(&Notice::error(FETCH_FAILED));
                }
            }
        }

        snapshot
    }

    fn is_current(&self, key: &ResourceKey, seq: u64) -> bool {
        self.entries().get(key).is_some_and(|e| e.seq == seq)
    }

    async fn fetch_with_retry(
        &self,
        key: &ResourceKey,
        seq: u64,
    ) -> Result<Envelope<Value>, ApiError> {
        let mut attempt = 0;
        loop {
            let request = key.to_request(&self.client).silent();
            match self.client.send::<Value>(request).await {
                Ok(envelope) => return Ok(envelope),
                Err(err)
                    if err.failure().is_some()
                        && attempt < self.retry.max_retries
                        && self.is_current(key, seq) =>
                {
                    attempt += 1;
                    tracing::debug!(
                        key = %key,
                        attempt,
                        max = self.retry.max_retries,
                        error = %err,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(self.retry.interval).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::Harness;
    use crate::http::TransportError;
    use serde_json::json;

    fn cache(h: &Harness, max_retries: u32) -> FetchCache {
        FetchCache::with_retry(
            h.client.clone(),
            RetryPolicy {
                max_retries,
                interval: Duration::from_millis(1),
            },
        )
    }

    fn products() -> ResourceKey {
        ResourceKey::new("/product/fetch-products")
            .param("page", 1)
            .param("limit", 20)
    }

    #[test]
    fn test_key_display_is_stable() {
        let a = ResourceKey::new("/x").param("b", 2).param("a", 1);
        let b = ResourceKey::new("/x").param("a", 1).param("b", 2);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "/x?a=1&b=2");
        assert_eq!(ResourceKey::new("/y").to_string(), "/y");
    }

    #[tokio::test]
    async fn test_absent_key_skips_fetch() {
        let h = Harness::new();
        let cache = cache(&h, 3);

        assert!(cache.mount(None).await.is_none());
        assert!(cache.refetch(None).await.is_none());
        assert!(cache.snapshot(None).is_none());
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_mount_fetches_and_settles() {
        let h = Harness::new();
        let cache = cache(&h, 3);
        h.transport
            .push_json(200, json!({"success": true, "data": {"results": [], "pages": 1}}));

        let key = products();
        assert_eq!(cache.snapshot(Some(&key)).unwrap().state, FetchState::Idle);

        let snap = cache.mount(Some(&key)).await.unwrap();
        assert_eq!(snap.state, FetchState::Settled);
        assert!(!snap.is_loading);
        assert!(!snap.is_validating);
        assert!(snap.data.unwrap().success);
        assert!(snap.last_validated.is_some());

        let req = h.transport.last_request().unwrap();
        assert_eq!(req.url, "http://api.test/product/fetch-products");
        assert_eq!(req.query_value("limit"), Some("20"));
    }

    #[tokio::test]
    async fn test_two_failures_then_success_is_silent() {
        let h = Harness::new();
        let cache = cache(&h, 3);
        h.transport.push_json(500, json!({}));
        h.transport.push_error(TransportError::Connect("reset".into()));
        h.transport.push_json(200, json!({"success": true, "data": [1, 2]}));

        let snap = cache.mount(Some(&products())).await.unwrap();

        assert_eq!(snap.state, FetchState::Settled);
        assert!(snap.error.is_none());
        assert_eq!(snap.data.unwrap().data.unwrap(), json!([1, 2]));
        assert_eq!(h.transport.request_count(), 3);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_failure_announced_once() {
        let h = Harness::new();
        let cache = cache(&h, 2);
        for _ in 0..3 {
            h.transport.push_json(503, json!({}));
        }

        let snap = cache.mount(Some(&products())).await.unwrap();

        assert_eq!(snap.state, FetchState::Failed);
        assert_eq!(snap.error.unwrap().status(), Some(503));
        assert_eq!(h.transport.request_count(), 3);
        assert_eq!(h.notifier.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_entry_recovers_on_refetch() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        h.transport.push_json(500, json!({}));
        h.transport.push_json(200, json!({"success": true, "data": []}));

        let key = products();
        assert_eq!(cache.mount(Some(&key)).await.unwrap().state, FetchState::Failed);
        let snap = cache.refetch(Some(&key)).await.unwrap();
        assert_eq!(snap.state, FetchState::Settled);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_envelope_announced_once_per_occurrence() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        let empty = json!({"success": false, "message": "No products found"});
        h.transport.push_json(200, empty.clone());
        h.transport.push_json(200, empty);
        h.transport
            .push_json(200, json!({"success": false, "message": "Catalog locked"}));

        let key = products();
        cache.mount(Some(&key)).await;
        cache.refetch(Some(&key)).await;
        cache.refetch(Some(&key)).await;

        assert_eq!(
            h.notifier.messages(),
            vec!["No products found".to_string(), "Catalog locked".to_string()]
        );
    }

    #[tokio::test]
    async fn test_hidden_notifications() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        let key = products();
        cache.set_hide_notifications(&key, true);
        h.transport.push_json(500, json!({}));

        let snap = cache.mount(Some(&key)).await.unwrap();
        assert_eq!(snap.state, FetchState::Failed);
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_stale_response_discarded() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        h.transport.push_delayed_json(
            Duration::from_millis(50),
            200,
            json!({"success": true, "data": "old"}),
        );
        h.transport
            .push_json(200, json!({"success": true, "data": "new"}));

        let key = products();
        let (_first, _second) =
            tokio::join!(cache.refetch(Some(&key)), cache.refetch(Some(&key)));

        let snap = cache.snapshot(Some(&key)).unwrap();
        assert_eq!(snap.data.unwrap().data.unwrap(), json!("new"));
        assert_eq!(snap.state, FetchState::Settled);
    }

    #[tokio::test]
    async fn test_unmount_detaches_in_flight_fetch() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        h.transport.push_delayed_json(
            Duration::from_millis(50),
            200,
            json!({"success": true, "data": "late"}),
        );

        let key = products();
        tokio::join!(cache.mount(Some(&key)), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.unmount(Some(&key));
        });

        let snap = cache.snapshot(Some(&key)).unwrap();
        assert!(snap.data.is_none());
        assert_eq!(snap.state, FetchState::Idle);
        assert!(!snap.is_validating);
    }

    #[tokio::test]
    async fn test_focus_revalidates_mounted_keys_only() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        for _ in 0..4 {
            h.transport.push_json(200, json!({"success": true, "data": []}));
        }

        let a = products();
        let b = ResourceKey::new("/category/fetch-categories").param("page", 1);
        cache.mount(Some(&a)).await;
        cache.mount(Some(&b)).await;
        cache.unmount(Some(&b));
        assert_eq!(h.transport.request_count(), 2);

        let snaps = cache.focus().await;
        assert_eq!(snaps.len(), 1);
        assert_eq!(h.transport.request_count(), 3);
        assert_eq!(
            h.transport.last_request().unwrap().url,
            "http://api.test/product/fetch-products"
        );
    }

    #[tokio::test]
    async fn test_triggers_can_be_disabled() {
        let h = Harness::new();
        let config = FetchConfig {
            retry_count: 0,
            retry_interval_ms: 1,
            revalidate_on_focus: false,
            revalidate_on_mount: false,
        };
        let cache = FetchCache::new(h.client.clone(), &config);

        let key = products();
        let snap = cache.mount(Some(&key)).await.unwrap();
        assert_eq!(snap.state, FetchState::Idle);
        assert!(cache.focus().await.is_empty());
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_drops_entry() {
        let h = Harness::new();
        let cache = cache(&h, 0);
        h.transport.push_json(200, json!({"success": true, "data": []}));

        let key = products();
        cache.mount(Some(&key)).await;
        cache.invalidate(&key);
        let snap = cache.snapshot(Some(&key)).unwrap();
        assert!(snap.data.is_none());
        assert_eq!(snap.state, FetchState::Idle);
    }
}
