//! MCP error construction
//!
//! Servers split failures into two classes: the caller sent something it can
//! fix (`invalid_params`), or the server itself failed (`internal_error`).
//! Both may carry a JSON payload so clients can branch on more than the text.

use rmcp::ErrorData as McpError;
use serde_json::Value;

/// Result type for tool implementations
pub type McpResult<T> = Result<T, McpError>;

/// The request was wrong: unknown name, missing confirmation, bad state
pub fn caller_error(message: impl Into<String>, data: Option<Value>) -> McpError {
    McpError::invalid_params(message.into(), data)
}

/// The server failed: storage, I/O
pub fn server_error(message: impl Into<String>, data: Option<Value>) -> McpError {
    McpError::internal_error(message.into(), data)
}
