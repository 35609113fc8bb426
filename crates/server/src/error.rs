//! Structured errors for the waypost server.
//!
//! Tool parameter problems surface as `INVALID_INPUT`; subsystem failures use
//! the codes carried by `waypost_core::Error`.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised by the tool layer itself.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., unknown HTTP method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A tool result could not be serialized.
    #[error("ENCODE_FAILED: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Encode(err.to_string())
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::Encode(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
