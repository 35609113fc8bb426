//! The edge worker: classifier, strategy engine, versioned store and sync
//! orchestrator wired together behind one handle.

use std::sync::Arc;

use futures::future::try_join_all;
use http::Method;
use url::Url;
use waypost_core::{
    Activation, AppConfig, CacheRecord, CacheStore, EdgeRequest, EdgeResponse, Error, MutationQueue, QueuedMutation,
    VersionedStore,
};

use crate::classify::{CachePolicy, Classifier};
use crate::fetch::{Transport, resolve};
use crate::strategy::{EngineOptions, StrategyEngine};
use crate::sync::{DrainReport, SyncOrchestrator};

/// Outcome of [`EdgeWorker::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub version: String,
    pub precached: Vec<String>,
}

pub struct EdgeWorker {
    origin: Url,
    precache: Vec<String>,
    classifier: Classifier,
    store: Arc<VersionedStore>,
    queue: Arc<dyn MutationQueue>,
    transport: Arc<dyn Transport>,
    engine: StrategyEngine,
    sync: SyncOrchestrator,
}

impl EdgeWorker {
    /// Build a worker with the dashboard policy tables.
    pub fn new(
        config: &AppConfig, store: Arc<dyn CacheStore>, queue: Arc<dyn MutationQueue>, transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let classifier = Classifier::standard(config)?;
        Self::with_classifier(config, classifier, store, queue, transport)
    }

    pub fn with_classifier(
        config: &AppConfig, classifier: Classifier, store: Arc<dyn CacheStore>, queue: Arc<dyn MutationQueue>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let origin =
            Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", config.origin)))?;
        let store = Arc::new(VersionedStore::new(store, config.cache_version.clone()));
        let engine = StrategyEngine::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&transport),
            EngineOptions::from(config),
        );
        let sync = SyncOrchestrator::new(Arc::clone(&queue), Arc::clone(&transport));

        Ok(Self { origin, precache: config.precache.clone(), classifier, store, queue, transport, engine, sync })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    /// Build a request for `target`, resolved against the origin.
    pub fn request(&self, method: Method, target: &str) -> Result<EdgeRequest, Error> {
        let url = resolve(&self.origin, target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(EdgeRequest::new(method, url))
    }

    pub fn classify(&self, request: &EdgeRequest) -> CachePolicy {
        self.classifier.classify_request(request)
    }

    /// Classify and serve one request, returning the policy that was applied.
    pub async fn dispatch(&self, request: &EdgeRequest) -> (CachePolicy, EdgeResponse) {
        let policy = self.classify(request);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            strategy = %policy.strategy,
            pattern = %policy.pattern,
            "classified request"
        );
        let response = self.engine.execute(request, &policy).await;
        (policy, response)
    }

    pub async fn handle(&self, request: &EdgeRequest) -> EdgeResponse {
        self.dispatch(request).await.1
    }

    /// Fetch the precache manifest and write it into the new version's static container.
    ///
    /// All or nothing: any fetch failure or non-2xx response aborts before anything is stored.
    pub async fn install(&self) -> Result<Installation, Error> {
        let requests = self
            .precache
            .iter()
            .map(|path| self.request(Method::GET, path))
            .collect::<Result<Vec<_>, _>>()?;

        let records = try_join_all(requests.into_iter().map(|request| async move {
            let snapshot = self
                .transport
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url)))?;
            if !snapshot.is_success() {
                return Err(Error::InstallFailed(format!("{}: status {}", request.url, snapshot.status)));
            }
            Ok(CacheRecord::new(request.signature(), snapshot))
        }))
        .await?;

        self.store.install(&records).await?;
        Ok(Installation { version: self.store.version().to_string(), precached: self.precache.clone() })
    }

    pub async fn activate(&self) -> Result<Activation, Error> {
        self.store.activate().await
    }

    /// The reconnect/sync hook.
    pub async fn drain(&self) -> Result<DrainReport, Error> {
        self.sync.drain().await
    }

    pub fn sync(&self) -> &SyncOrchestrator {
        &self.sync
    }

    pub async fn pending(&self) -> Result<Vec<QueuedMutation>, Error> {
        self.queue.list_all().await
    }

    /// Stop background revalidation.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Strategy;
    use crate::testing::MockTransport;
    use waypost_core::{CacheKind, EdgeDb, MemoryStore, ResponseSnapshot, ResponseSource};

    fn config() -> AppConfig {
        AppConfig { origin: "https://app.example.com".into(), ..AppConfig::default() }
    }

    fn worker_on(backing: Arc<MemoryStore>, transport: Arc<MockTransport>) -> EdgeWorker {
        EdgeWorker::new(&config(), backing.clone(), backing, transport).unwrap()
    }

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        let worker = worker_on(backing.clone(), transport.clone());

        let installation = worker.install().await.unwrap();

        assert_eq!(installation.version, "v1");
        assert_eq!(installation.precached.len(), 6);
        assert_eq!(transport.call_count(), 6);
        assert!(worker.store().is_installed());

        let request = worker.request(Method::GET, "/offline.html").unwrap();
        let record = worker.store().container_for(CacheKind::Static).get(&request.signature()).await.unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        transport.respond(Method::GET, "https://app.example.com/manifest.json", ResponseSnapshot::new(404, "missing"));
        let worker = worker_on(backing.clone(), transport);

        let err = worker.install().await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed(_)));
        assert!(!worker.store().is_installed());
        assert!(backing.container_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_route_served_offline_without_network() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        let worker = worker_on(backing, transport.clone());

        let request = worker.request(Method::GET, "/dashboard/classes-v2/container/123").unwrap().navigate();
        let first = worker.handle(&request).await;
        assert_eq!(first.source, ResponseSource::Network);

        transport.set_online(false);
        let calls_before = transport.call_count();
        let (policy, second) = worker.dispatch(&request).await;

        assert_eq!(policy.pattern, "/dashboard/classes-v2/container/:id");
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.snapshot, first.snapshot);
        assert_eq!(transport.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_offline_navigation_after_install() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        transport.respond(
            Method::GET,
            "https://app.example.com/offline.html",
            ResponseSnapshot::new(200, "<p>offline</p>").with_header("content-type", "text/html"),
        );
        let worker = worker_on(backing, transport.clone());
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        transport.set_online(false);
        let request = worker.request(Method::GET, "/dashboard/classes-v2/analytics").unwrap().navigate();
        let response = worker.handle(&request).await;

        assert_eq!(response.source, ResponseSource::Offline);
        assert_eq!(response.snapshot.body_text(), "<p>offline</p>");
    }

    #[tokio::test]
    async fn test_precached_shell_served_offline() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        transport.respond(Method::GET, "https://app.example.com/", ResponseSnapshot::new(200, "<app shell>"));
        let worker = worker_on(backing, transport.clone());
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        transport.set_online(false);
        let calls_before = transport.call_count();

        let root = worker.request(Method::GET, "/").unwrap().navigate();
        let (policy, response) = worker.dispatch(&root).await;
        assert!(policy.precache);
        assert_eq!(worker.store().container_name(policy.kind), "static-v1");
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.snapshot.body_text(), "<app shell>");

        for path in ["/index.html", "/manifest.json"] {
            let request = worker.request(Method::GET, path).unwrap();
            let (policy, response) = worker.dispatch(&request).await;
            assert_eq!(policy.kind, CacheKind::Static, "{path}");
            assert_eq!(response.source, ResponseSource::Cache, "{path}");
            assert_eq!(response.snapshot.body_text(), format!("GET https://app.example.com{path}"));
        }

        assert_eq!(transport.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_network_first_api_falls_back_to_api_container() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        let worker = worker_on(backing, transport.clone());
        let request = worker.request(Method::GET, "/api/v2/bookings").unwrap();

        let (policy, online) = worker.dispatch(&request).await;
        assert_eq!(policy.strategy, Strategy::NetworkFirst);
        assert_eq!(worker.store().container_name(policy.kind), "api-v1");
        assert_eq!(online.source, ResponseSource::Network);
        assert_eq!(transport.call_count(), 1);

        let stored = worker.store().container("api-v1").get(&request.signature()).await.unwrap();
        assert_eq!(stored.map(|record| record.value), Some(online.snapshot.clone()));

        transport.set_online(false);
        let (_, offline) = worker.dispatch(&request).await;

        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.snapshot.body, online.snapshot.body);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_first_api_served_offline_from_api_container() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::online());
        transport.respond(
            Method::GET,
            "https://app.example.com/api/v2/packages",
            ResponseSnapshot::new(200, r#"{"packages":[]}"#).with_header("content-type", "application/json"),
        );
        let worker = worker_on(backing, transport.clone());
        let request = worker.request(Method::GET, "/api/v2/packages").unwrap();

        let (policy, online) = worker.dispatch(&request).await;
        assert_eq!(policy.strategy, Strategy::CacheFirst);
        assert_eq!(online.source, ResponseSource::Network);
        let stored = worker.store().container("api-v1").get(&request.signature()).await.unwrap();
        let stored_body = stored.map(|record| record.value.body_text().into_owned());
        assert_eq!(stored_body.as_deref(), Some(r#"{"packages":[]}"#));

        transport.set_online(false);
        let calls_before = transport.call_count();
        let (_, offline) = worker.dispatch(&request).await;

        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.snapshot.body, online.snapshot.body);
        assert_eq!(offline.snapshot.body_text(), r#"{"packages":[]}"#);
        assert_eq!(transport.call_count(), calls_before);
    }

    #[tokio::test]
    async fn test_offline_write_then_reconnect() {
        let backing = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::offline());
        let worker = worker_on(backing, transport.clone());

        let request = worker
            .request(Method::POST, "/api/v2/bookings")
            .unwrap()
            .with_header("content-type", "application/json")
            .with_body(r#"{"class":12}"#);
        let response = worker.handle(&request).await;

        assert_eq!(response.snapshot.status, 202);
        assert_eq!(worker.pending().await.unwrap().len(), 1);

        transport.set_online(true);
        let report = worker.drain().await.unwrap();

        assert_eq!(report.replayed, 1);
        assert!(worker.pending().await.unwrap().is_empty());
        let replayed = transport.calls().last().cloned().unwrap();
        assert_eq!(replayed.method, Method::POST);
        assert_eq!(replayed.headers, request.headers);
        assert_eq!(replayed.body, request.body);
    }

    #[tokio::test]
    async fn test_version_bump_evicts_old_containers() {
        let db = Arc::new(EdgeDb::open_in_memory().await.unwrap());
        let transport = Arc::new(MockTransport::online());

        let v1 = EdgeWorker::new(&config(), db.clone(), db.clone(), transport.clone()).unwrap();
        v1.install().await.unwrap();
        v1.activate().await.unwrap();
        let api = v1.request(Method::GET, "/api/v2/packages").unwrap();
        v1.handle(&api).await;

        let bumped = AppConfig { cache_version: "v2".into(), ..config() };
        let v2 = EdgeWorker::new(&bumped, db.clone(), db.clone(), transport).unwrap();
        v2.install().await.unwrap();
        let activation = v2.activate().await.unwrap();

        assert_eq!(activation.evicted, vec!["api-v1", "static-v1"]);
        assert_eq!(db.container_names().await.unwrap(), vec!["static-v2"]);
        assert!(v2.activate().await.unwrap().evicted.is_empty());
    }

    #[test]
    fn test_rejects_bad_origin() {
        let backing = Arc::new(MemoryStore::new());
        let bad = AppConfig { origin: "not a url".into(), ..AppConfig::default() };
        let result = EdgeWorker::new(&bad, backing.clone(), backing, Arc::new(MockTransport::online()));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
