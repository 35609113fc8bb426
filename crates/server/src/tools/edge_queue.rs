//! edge_queue tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::EdgeWorker;
use waypost_core::QueuedMutation;

use super::json_result;

/// Output from the edge_queue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EdgeQueueOutput {
    pub count: usize,
    /// Pending mutations in insertion order.
    pub pending: Vec<QueuedMutation>,
}

/// Implementation of the edge_queue tool.
pub async fn queue_impl(worker: &EdgeWorker) -> Result<CallToolResult, McpError> {
    let pending = worker.pending().await?;
    json_result(&EdgeQueueOutput { count: pending.len(), pending })
}
