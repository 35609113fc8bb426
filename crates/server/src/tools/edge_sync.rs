//! edge_sync tool implementation.
//!
//! The host's reconnect/sync trigger: drains the mutation queue once.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waypost_client::{DrainReport, EdgeWorker};

use super::json_result;

/// Output from the edge_sync tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeSyncOutput {
    /// Replays sent this drain.
    pub attempted: usize,
    /// Replays delivered and dequeued.
    pub replayed: usize,
    /// Entries kept for the next drain.
    pub failed: usize,
    /// Queue length after the drain.
    pub remaining: usize,
}

impl From<DrainReport> for EdgeSyncOutput {
    fn from(report: DrainReport) -> Self {
        Self {
            attempted: report.attempted,
            replayed: report.replayed,
            failed: report.failed,
            remaining: report.remaining,
        }
    }
}

/// Implementation of the edge_sync tool.
pub async fn sync_impl(worker: &EdgeWorker) -> Result<CallToolResult, McpError> {
    let report = worker.drain().await?;
    json_result(&EdgeSyncOutput::from(report))
}
