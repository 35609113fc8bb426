//! Request classification.
//!
//! Maps `(method, path)` to a [`CachePolicy`]. Evaluation order:
//! 1. Static-asset destinations (script, style, image, font)
//! 2. Paths under the API prefix, via a `{method, path}` table
//! 3. The navigation route table, first match wins
//! 4. A default policy keyed on the method
//!
//! Only GET may use a caching strategy; other methods are downgraded to
//! network-only after lookup.

pub mod pattern;
pub mod policy;

use std::collections::HashMap;

use http::Method;
use waypost_core::{AppConfig, CacheKind, Destination, EdgeRequest, Error};

pub use pattern::RoutePattern;
pub use policy::{CachePolicy, Strategy};

/// One year; static assets are fingerprinted.
pub const STATIC_MAX_AGE_SECS: u64 = 31_536_000;
pub const PRECACHE_MAX_AGE_SECS: u64 = 86_400;
pub const PAGE_CACHE_FIRST_MAX_AGE_SECS: u64 = 3600;
pub const PAGE_NETWORK_FIRST_MAX_AGE_SECS: u64 = 60;

const DEFAULT_PATTERN: &str = "*";

/// Ordered route table plus API lookup table.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_prefix: String,
    default_max_age: u64,
    routes: Vec<(RoutePattern, CachePolicy)>,
    api: HashMap<(Method, String), CachePolicy>,
}

impl Classifier {
    /// An empty classifier; every request gets the default policy.
    pub fn new(api_prefix: impl Into<String>, default_max_age: u64) -> Self {
        Self { api_prefix: api_prefix.into(), default_max_age, routes: Vec::new(), api: HashMap::new() }
    }

    /// Append a navigation route. Declaration order is match order.
    pub fn route(
        mut self, pattern: &str, strategy: Strategy, kind: CacheKind, max_age_seconds: u64,
    ) -> Result<Self, Error> {
        let parsed = RoutePattern::parse(pattern)?;
        self.routes.push((parsed, CachePolicy::new(pattern, strategy, kind, max_age_seconds)));
        Ok(self)
    }

    /// Append a navigation route that is also fetched at install.
    pub fn precached_route(mut self, pattern: &str) -> Result<Self, Error> {
        let parsed = RoutePattern::parse(pattern)?;
        let policy =
            CachePolicy::new(pattern, Strategy::CacheFirst, CacheKind::Static, PRECACHE_MAX_AGE_SECS).precached();
        self.routes.push((parsed, policy));
        Ok(self)
    }

    /// Register an API policy for an exact `METHOD path` key.
    pub fn api_route(mut self, method: Method, path: &str, strategy: Strategy, max_age_seconds: u64) -> Self {
        let policy = CachePolicy::new(format!("{method} {path}"), strategy, CacheKind::Api, max_age_seconds)
            .for_method(method.clone());
        self.api.insert((method, path.to_string()), policy);
        self
    }

    /// The dashboard route and API tables.
    pub fn standard(config: &AppConfig) -> Result<Self, Error> {
        use Strategy::*;

        let mut precached: Vec<&str> = Vec::new();
        let manifest = config.precache.iter().map(String::as_str);
        for path in manifest.chain(["/dashboard/classes-v2", "/dashboard/classes-v2/containers"]) {
            if !precached.contains(&path) {
                precached.push(path);
            }
        }

        let mut classifier = Self::new(config.api_prefix.clone(), config.default_max_age_secs);
        for path in precached {
            classifier = classifier.precached_route(path)?;
        }

        let classifier = classifier
            .route("/dashboard/classes-v2/container/:id", CacheFirst, CacheKind::Pages, PAGE_CACHE_FIRST_MAX_AGE_SECS)?
            .route("/dashboard/classes-v2/assignments", CacheFirst, CacheKind::Pages, PAGE_CACHE_FIRST_MAX_AGE_SECS)?
            .route("/dashboard/classes-v2/students", CacheFirst, CacheKind::Pages, PAGE_CACHE_FIRST_MAX_AGE_SECS)?
            .route("/dashboard/bookings", NetworkFirst, CacheKind::Pages, PAGE_NETWORK_FIRST_MAX_AGE_SECS)?
            .route("/dashboard/classes-v2/calendar", NetworkFirst, CacheKind::Pages, PAGE_NETWORK_FIRST_MAX_AGE_SECS)?
            .route("/dashboard/classes-v2/analytics", NetworkFirst, CacheKind::Pages, PAGE_NETWORK_FIRST_MAX_AGE_SECS)?
            .route("/dashboard/classes-v2/create", NetworkOnly, CacheKind::Pages, 0)?
            .route("/dashboard/classes-v2/edit/:id", NetworkOnly, CacheKind::Pages, 0)?
            .route("/dashboard/classes-v2/settings", NetworkOnly, CacheKind::Pages, 0)?
            .route("/assets/*", CacheFirst, CacheKind::Static, STATIC_MAX_AGE_SECS)?
            .route("/icons/*", CacheFirst, CacheKind::Static, STATIC_MAX_AGE_SECS)?
            .route("/fonts/*", CacheFirst, CacheKind::Static, STATIC_MAX_AGE_SECS)?
            .api_route(Method::GET, "/api/v2/containers", CacheFirst, 300)
            .api_route(Method::GET, "/api/v2/containers/:id", CacheFirst, 300)
            .api_route(Method::GET, "/api/v2/packages", CacheFirst, 3600)
            .api_route(Method::GET, "/api/v2/instructors", CacheFirst, 1800)
            .api_route(Method::GET, "/api/v2/assignments", NetworkFirst, 120)
            .api_route(Method::GET, "/api/v2/bookings", NetworkFirst, 60);

        Ok(classifier)
    }

    /// Classify by method and path alone. Any query string is ignored.
    pub fn classify(&self, method: &Method, path: &str) -> CachePolicy {
        self.classify_with(method, path, Destination::Empty)
    }

    /// Classify an intercepted request, taking its destination into account.
    pub fn classify_request(&self, request: &EdgeRequest) -> CachePolicy {
        self.classify_with(&request.method, request.path(), request.destination)
    }

    fn classify_with(&self, method: &Method, path: &str, destination: Destination) -> CachePolicy {
        let path = path.split_once('?').map_or(path, |(p, _)| p);

        let policy = if destination.is_static_asset() {
            static_asset_policy(destination)
        } else if path.starts_with(&self.api_prefix) {
            self.lookup_api(method, path)
                .unwrap_or_else(|| self.default_policy(method, CacheKind::Api))
        } else {
            self.routes
                .iter()
                .find(|(pattern, _)| pattern.matches(path))
                .map(|(_, policy)| policy.clone())
                .unwrap_or_else(|| self.default_policy(method, CacheKind::Pages))
        };

        if *method != Method::GET && policy.strategy.uses_cache() {
            tracing::debug!(%method, path, pattern = %policy.pattern, "write request downgraded to network-only");
            return policy.downgrade_to_network_only();
        }
        policy
    }

    fn lookup_api(&self, method: &Method, path: &str) -> Option<CachePolicy> {
        let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };

        if let Some(policy) = self.api.get(&(method.clone(), path.to_string())) {
            return Some(policy.clone());
        }

        let (head, last) = path.rsplit_once('/')?;
        if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.api.get(&(method.clone(), format!("{head}/:id"))).cloned()
    }

    fn default_policy(&self, method: &Method, kind: CacheKind) -> CachePolicy {
        if *method == Method::GET {
            CachePolicy::new(DEFAULT_PATTERN, Strategy::NetworkFirst, kind, self.default_max_age)
        } else {
            CachePolicy::new(DEFAULT_PATTERN, Strategy::NetworkOnly, kind, 0)
        }
    }
}

fn static_asset_policy(destination: Destination) -> CachePolicy {
    let label = serde_json::to_value(destination)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    CachePolicy::new(format!("destination:{label}"), Strategy::CacheFirst, CacheKind::Static, STATIC_MAX_AGE_SECS)
}
