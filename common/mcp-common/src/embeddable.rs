//! In-process tool execution
//!
//! [`EmbeddableMcp`] lets a host call a server's tools directly, without a
//! stdio transport in between. Servers built on `#[tool_router]` implement it
//! by listing their router and dispatching on the tool name.

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Parameters did not deserialize into the tool's parameter type
    #[error("invalid parameters: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// The tool ran and returned an MCP error
    #[error("mcp error: {0}")]
    McpError(String),
}

impl From<rmcp::ErrorData> for EmbeddableError {
    fn from(err: rmcp::ErrorData) -> Self {
        EmbeddableError::McpError(err.message.to_string())
    }
}

pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

/// An MCP server whose tools can be called in-process
#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    /// Name used for the server in MCP configuration
    fn server_name(&self) -> &str;

    fn list_tools(&self) -> Vec<Tool>;

    /// Run tool `name` with a JSON object of parameters
    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoServer;

    #[async_trait]
    impl EmbeddableMcp for EchoServer {
        fn server_name(&self) -> &str {
            "echo"
        }

        fn list_tools(&self) -> Vec<Tool> {
            vec![]
        }

        async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
            match name {
                "fail" => Err(rmcp::ErrorData::invalid_params("bad input", None).into()),
                "echo" => {
                    let text: String = serde_json::from_value(params)?;
                    Ok(CallToolResult::success(vec![rmcp::model::Content::text(text)]))
                }
                _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
            }
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(EchoServer.server_name(), "echo");
        assert!(EchoServer.server_description().is_none());
    }

    #[tokio::test]
    async fn test_call_errors() {
        let unknown = EchoServer.call_tool("unknown", serde_json::json!({})).await;
        assert!(matches!(unknown, Err(EmbeddableError::ToolNotFound(_))));

        let bad = EchoServer.call_tool("echo", serde_json::json!({ "not": "a string" })).await;
        assert!(matches!(bad, Err(EmbeddableError::SerdeError(_))));

        match EchoServer.call_tool("fail", serde_json::json!({})).await {
            Err(EmbeddableError::McpError(message)) => assert_eq!(message, "bad input"),
            other => panic!("expected McpError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_success() {
        let result = EchoServer.call_tool("echo", serde_json::json!("hi")).await.unwrap();
        assert_eq!(result.content.len(), 1);
    }
}
