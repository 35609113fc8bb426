//! edge_lifecycle tool implementation.
//!
//! Re-runs the install or activate step for the configured cache version.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::EdgeWorker;

use super::json_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    /// Fetch the precache manifest into the static container.
    Install,
    /// Evict containers from other versions.
    Activate,
}

/// Parameters for the edge_lifecycle tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EdgeLifecycleParams {
    pub action: LifecycleAction,
}

/// Output from the edge_lifecycle tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EdgeLifecycleOutput {
    pub version: String,
    /// Paths precached by install.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precached: Vec<String>,
    /// Containers deleted by activate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evicted: Vec<String>,
    pub installed: bool,
    pub controlling: bool,
}

/// Implementation of the edge_lifecycle tool.
pub async fn lifecycle_impl(worker: &EdgeWorker, params: EdgeLifecycleParams) -> Result<CallToolResult, McpError> {
    let mut output = EdgeLifecycleOutput { version: worker.store().version().to_string(), ..Default::default() };

    match params.action {
        LifecycleAction::Install => output.precached = worker.install().await?.precached,
        LifecycleAction::Activate => output.evicted = worker.activate().await?.evicted,
    }

    output.installed = worker.store().is_installed();
    output.controlling = worker.store().is_controlling();
    json_result(&output)
}
