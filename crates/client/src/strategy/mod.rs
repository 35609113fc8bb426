//! The four fetch/cache strategies and their fallbacks.
//!
//! Only fetch failures trigger fallback or queueing. A response with any HTTP
//! status is passed through unchanged; only 2xx responses are written to a
//! container. Store errors are logged and treated as a miss or a skipped
//! write, so they never reach the caller.

mod coalesce;

use std::sync::Arc;

use http::Method;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use waypost_core::{
    AppConfig, CacheKind, CacheRecord, Container, EdgeRequest, EdgeResponse, Error, MutationQueue, QueuedMutation,
    RequestSignature, ResponseSnapshot, ResponseSource, VersionedStore,
};

use crate::classify::{CachePolicy, Strategy};
use crate::fetch::Transport;
use coalesce::InflightFetches;

/// Engine settings derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Page served from the static container to offline navigations.
    pub offline_path: String,
    /// Share one network call between concurrent cache-reading fetches.
    pub coalesce: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { offline_path: "/offline.html".into(), coalesce: true }
    }
}

impl From<&AppConfig> for EngineOptions {
    fn from(config: &AppConfig) -> Self {
        Self { offline_path: config.offline_path.clone(), coalesce: config.coalesce_fetches }
    }
}

#[derive(Clone)]
struct Fetcher {
    transport: Arc<dyn Transport>,
    inflight: Option<Arc<InflightFetches>>,
}

impl Fetcher {
    async fn fetch(&self, request: &EdgeRequest) -> Result<ResponseSnapshot, Error> {
        match &self.inflight {
            Some(inflight) => inflight.fetch(self.transport.as_ref(), request).await,
            None => self.transport.fetch(request).await,
        }
    }
}

/// Executes cache policies against a [`VersionedStore`], a [`MutationQueue`]
/// and a [`Transport`].
pub struct StrategyEngine {
    store: Arc<VersionedStore>,
    queue: Arc<dyn MutationQueue>,
    fetcher: Fetcher,
    offline_path: String,
    shutdown: CancellationToken,
    refreshes: TaskTracker,
}

impl StrategyEngine {
    pub fn new(
        store: Arc<VersionedStore>, queue: Arc<dyn MutationQueue>, transport: Arc<dyn Transport>,
        options: EngineOptions,
    ) -> Self {
        let inflight = options.coalesce.then(|| Arc::new(InflightFetches::default()));
        Self {
            store,
            queue,
            fetcher: Fetcher { transport, inflight },
            offline_path: options.offline_path,
            shutdown: CancellationToken::new(),
            refreshes: TaskTracker::new(),
        }
    }

    /// Run `policy` for `request` in the current version's container of the policy's kind.
    pub async fn execute(&self, request: &EdgeRequest, policy: &CachePolicy) -> EdgeResponse {
        let container = self.store.container_name(policy.kind);
        let max_age = policy.max_age_seconds;

        match policy.strategy {
            Strategy::CacheFirst => self.cache_first(request, &container, max_age).await,
            Strategy::NetworkFirst => self.network_first(request, &container, max_age).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, &container, max_age).await,
            Strategy::NetworkOnly => self.network_only(request).await,
        }
    }

    /// Serve from the container if present, otherwise fetch and store.
    pub async fn cache_first(&self, request: &EdgeRequest, container_name: &str, max_age_seconds: u64) -> EdgeResponse {
        let container = self.store.container(container_name);

        if let Some(record) = lookup(&container, request).await {
            tracing::debug!(
                container = container_name,
                url = %request.url,
                fresh = record.is_fresh(max_age_seconds),
                "cache hit"
            );
            return EdgeResponse::new(record.value, ResponseSource::Cache);
        }

        tracing::debug!(container = container_name, url = %request.url, "cache miss");
        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                store_snapshot(&container, request, &snapshot).await;
                EdgeResponse::new(snapshot, ResponseSource::Network)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed on cache miss");
                self.offline_fallback(request).await
            }
        }
    }

    /// Prefer the network; fall back to the container, then the offline response.
    pub async fn network_first(
        &self, request: &EdgeRequest, container_name: &str, max_age_seconds: u64,
    ) -> EdgeResponse {
        let container = self.store.container(container_name);

        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                store_snapshot(&container, request, &snapshot).await;
                EdgeResponse::new(snapshot, ResponseSource::Network)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed; trying cache");
                match lookup(&container, request).await {
                    Some(record) => {
                        tracing::debug!(
                            container = container_name,
                            fresh = record.is_fresh(max_age_seconds),
                            "serving cached copy"
                        );
                        EdgeResponse::new(record.value, ResponseSource::Cache)
                    }
                    None => self.offline_fallback(request).await,
                }
            }
        }
    }

    /// Serve the cached copy at once and refresh it in the background.
    ///
    /// The caller never waits for nor sees the refreshed value. On a miss the
    /// caller waits on the network like cache-first.
    pub async fn stale_while_revalidate(
        &self, request: &EdgeRequest, container_name: &str, max_age_seconds: u64,
    ) -> EdgeResponse {
        let container = self.store.container(container_name);

        if let Some(record) = lookup(&container, request).await {
            tracing::debug!(
                container = container_name,
                url = %request.url,
                fresh = record.is_fresh(max_age_seconds),
                "serving cached copy; revalidating"
            );
            self.spawn_refresh(request.clone(), container);
            return EdgeResponse::new(record.value, ResponseSource::Cache);
        }

        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                store_snapshot(&container, request, &snapshot).await;
                EdgeResponse::new(snapshot, ResponseSource::Network)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed on cache miss");
                self.offline_fallback(request).await
            }
        }
    }

    /// Never cached. A failed write is queued for replay and acknowledged with 202.
    pub async fn network_only(&self, request: &EdgeRequest) -> EdgeResponse {
        let err = match self.fetcher.transport.fetch(request).await {
            Ok(snapshot) => return EdgeResponse::new(snapshot, ResponseSource::Network),
            Err(e) => e,
        };

        if request.method == Method::GET || request.method == Method::HEAD {
            tracing::warn!(url = %request.url, error = %err, "fetch failed");
            return self.offline_fallback(request).await;
        }

        let mutation = QueuedMutation::from_request(request);
        match self.queue.enqueue(&mutation).await {
            Ok(()) => {
                tracing::info!(
                    id = %mutation.id,
                    method = %mutation.method,
                    url = %mutation.url,
                    error = %err,
                    "queued mutation for replay"
                );
                EdgeResponse::new(ResponseSnapshot::queued(), ResponseSource::Queued)
            }
            Err(e) => {
                tracing::error!(url = %request.url, error = %e, "failed to queue mutation");
                self.offline_fallback(request).await
            }
        }
    }

    /// Cached offline page for navigations, otherwise a plain 503.
    pub async fn offline_fallback(&self, request: &EdgeRequest) -> EdgeResponse {
        if request.is_navigation() {
            match request.url.join(&self.offline_path) {
                Ok(url) => {
                    let container = self.store.container_for(CacheKind::Static);
                    let key = RequestSignature::new(&Method::GET, &url);
                    match container.get(&key).await {
                        Ok(Some(record)) => return EdgeResponse::new(record.value, ResponseSource::Offline),
                        Ok(None) => tracing::debug!(offline_path = %self.offline_path, "offline page not cached"),
                        Err(e) => tracing::warn!(error = %e, "offline page lookup failed"),
                    }
                }
                Err(e) => tracing::warn!(offline_path = %self.offline_path, error = %e, "invalid offline path"),
            }
        }
        EdgeResponse::new(ResponseSnapshot::offline(), ResponseSource::Offline)
    }

    fn spawn_refresh(&self, request: EdgeRequest, container: Container) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let fetcher = self.fetcher.clone();
        let token = self.shutdown.clone();
        self.refreshes.spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(url = %request.url, "revalidation cancelled");
                    return;
                }
                result = fetcher.fetch(&request) => result,
            };

            match result {
                Ok(snapshot) => store_snapshot(&container, &request, &snapshot).await,
                Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation fetch failed"),
            }
        });
    }

    /// Wait for every background refresh started so far.
    pub async fn wait_for_refreshes(&self) {
        self.refreshes.close();
        self.refreshes.wait().await;
        self.refreshes.reopen();
    }

    /// Abort in-flight refreshes and wait for them to stop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.refreshes.close();
        self.refreshes.wait().await;
    }
}

async fn lookup(container: &Container, request: &EdgeRequest) -> Option<CacheRecord> {
    match container.get(&request.signature()).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(container = container.name(), error = %e, "cache read failed; treating as miss");
            None
        }
    }
}

/// Write a complete 2xx snapshot; anything else is skipped.
async fn store_snapshot(container: &Container, request: &EdgeRequest, snapshot: &ResponseSnapshot) {
    if !snapshot.is_success() {
        tracing::debug!(status = snapshot.status, url = %request.url, "not caching non-2xx response");
        return;
    }

    let record = CacheRecord::new(request.signature(), snapshot.clone());
    if let Err(e) = container.put(&record).await {
        tracing::warn!(container = container.name(), error = %e, "cache write failed");
    }
}
