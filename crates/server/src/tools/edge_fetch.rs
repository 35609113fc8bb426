//! edge_fetch tool implementation.
//!
//! Runs one request through the classifier and strategy engine, exactly as an
//! intercepted request would be served.

use http::Method;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::{CachePolicy, EdgeWorker};
use waypost_core::{Destination, EdgeResponse, ResponseSource};

use super::json_result;
use crate::error::ToolError;

/// One request or response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Input parameters for the edge_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EdgeFetchParams {
    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Path on the configured origin, or an absolute URL.
    pub path: String,

    /// Request headers, in order.
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,

    /// Request body as text.
    #[serde(default)]
    pub body: Option<String>,

    /// Fetch destination; script, style, image and font are served as static assets.
    #[serde(default)]
    pub destination: Option<Destination>,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the edge_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EdgeFetchOutput {
    pub status: u16,
    pub headers: Vec<HeaderEntry>,
    /// Response body, decoded lossily as UTF-8.
    pub body: String,
    /// Where the response came from: cache, network, offline or queued.
    pub source: ResponseSource,
    /// Strategy that served the request.
    pub strategy: String,
    /// Route pattern or table key that matched.
    pub pattern: String,
    /// Container read or written; absent for network-only.
    pub container: Option<String>,
}

impl EdgeFetchOutput {
    fn new(policy: &CachePolicy, container: Option<String>, response: EdgeResponse) -> Self {
        let snapshot = response.snapshot;
        Self {
            status: snapshot.status,
            body: snapshot.body_text().into_owned(),
            headers: snapshot
                .headers
                .into_iter()
                .map(|(name, value)| HeaderEntry { name, value })
                .collect(),
            source: response.source,
            strategy: policy.strategy.to_string(),
            pattern: policy.pattern.clone(),
            container,
        }
    }
}

/// Implementation of the edge_fetch tool.
pub async fn fetch_impl(worker: &EdgeWorker, params: EdgeFetchParams) -> Result<CallToolResult, McpError> {
    if params.path.trim().is_empty() {
        return Err(ToolError::InvalidInput("path cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("invalid method: {}", params.method)))?;

    let mut request = worker.request(method, &params.path)?;
    for header in params.headers {
        request = request.with_header(header.name, header.value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }
    if let Some(destination) = params.destination {
        request = request.with_destination(destination);
    }
    if params.navigate {
        request = request.navigate();
    }

    let (policy, response) = worker.dispatch(&request).await;
    let container = policy
        .strategy
        .uses_cache()
        .then(|| worker.store().container_name(policy.kind));

    tracing::debug!(
        url = %request.url,
        strategy = %policy.strategy,
        source = %response.source,
        status = response.snapshot.status,
        "edge_fetch served"
    );

    json_result(&EdgeFetchOutput::new(&policy, container, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::worker;

    fn params(method: &str, path: &str) -> EdgeFetchParams {
        EdgeFetchParams {
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            body: None,
            destination: None,
            navigate: false,
        }
    }

    #[tokio::test]
    async fn test_fetch_online() {
        let (worker, _) = worker(true).await;

        let result = fetch_impl(&worker, params("GET", "/api/v2/packages")).await;
        assert!(result.is_ok());
        assert!(!result.unwrap().is_error.unwrap_or(false));
    }

    #[tokio::test]
    async fn test_fetch_offline_write_is_queued() {
        let (worker, _) = worker(false).await;
        let mut write = params("post", "/dashboard/classes-v2/create");
        write.headers = vec![HeaderEntry { name: "content-type".into(), value: "application/json".into() }];
        write.body = Some(r#"{"title":"Ashtanga"}"#.into());

        let result = fetch_impl(&worker, write).await;
        assert!(result.is_ok());

        let pending = worker.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].method, "POST");
        assert_eq!(pending[0].headers, vec![("content-type".to_string(), "application/json".to_string())]);
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let (worker, _) = worker(true).await;

        assert!(fetch_impl(&worker, params("GET", "  ")).await.is_err());
        assert!(fetch_impl(&worker, params("NOT A METHOD", "/")).await.is_err());
    }

    #[test]
    fn test_output_shape() {
        let policy = CachePolicy::new(
            "GET /api/v2/packages",
            waypost_client::Strategy::CacheFirst,
            waypost_core::CacheKind::Api,
            3600,
        );
        let response = EdgeResponse::new(
            waypost_core::ResponseSnapshot::new(200, "[]").with_header("content-type", "application/json"),
            ResponseSource::Cache,
        );

        let output = EdgeFetchOutput::new(&policy, Some("api-v1".into()), response);
        let json = serde_json::to_value(&output).unwrap();

        assert_eq!(json["status"], 200);
        assert_eq!(json["source"], "cache");
        assert_eq!(json["strategy"], "cache-first");
        assert_eq!(json["container"], "api-v1");
        assert_eq!(json["headers"][0]["name"], "content-type");
    }
}
