//! MCP Common - plumbing shared by MCP servers in this workspace
//!
//! - **Tracing**: [`init_tracing`] sends logs to stderr, keeping stdout for the protocol
//! - **Errors**: [`caller_error`] / [`server_error`] build MCP errors with structured data
//! - **Results**: [`json_success`] wraps a serializable response
//! - **Embedding**: [`EmbeddableMcp`] calls a server's tools in-process
//!
//! ```rust,ignore
//! use mcp_common::{caller_error, json_success};
//!
//! async fn my_tool(&self) -> Result<CallToolResult, McpError> {
//!     let response = self.service.run().await.map_err(|e| caller_error(e.to_string(), None))?;
//!     json_success(&response)
//! }
//! ```

pub mod embeddable;
pub mod error;
pub mod init;
pub mod result;

pub use embeddable::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{caller_error, server_error, McpResult};
pub use init::init_tracing;
pub use result::json_success;

pub use rmcp::{
    model::{CallToolResult, Tool},
    ErrorData as McpError,
};

// For implementing EmbeddableMcp without a direct async-trait dependency
pub use async_trait::async_trait;
