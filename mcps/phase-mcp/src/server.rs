//! MCP Server implementation for development phase tracking

use mcp_common::{async_trait, json_success, EmbeddableError, EmbeddableMcp, EmbeddableResult, McpError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo, Tool},
    tool, tool_handler, tool_router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::catalog::WorkflowCatalog;
use crate::config::PhaseConfig;
use crate::handlers::{phase_error_to_mcp, PhaseService};
use crate::params::*;

/// The Phase MCP Server
#[derive(Clone)]
pub struct PhaseMcpServer {
    service: PhaseService,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PhaseMcpServer {
    /// Build from `PhaseConfig::load()`
    pub fn new() -> Result<Self, anyhow::Error> {
        let config = PhaseConfig::load()?;
        Self::with_config(config)
    }

    pub fn with_config(config: PhaseConfig) -> Result<Self, anyhow::Error> {
        let store = config.open_store()?;
        let catalog = Arc::new(WorkflowCatalog::new()?);
        tracing::info!(
            workflows = ?catalog.valid_names(),
            storage = ?config.storage,
            "Phase server configured"
        );

        Ok(Self {
            service: PhaseService::new(catalog, store, config),
            tool_router: Self::tool_router(),
        })
    }

    pub fn service(&self) -> &PhaseService {
        &self.service
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    #[tool(description = "Start development for the current project and branch with a workflow. \
        Creates the session in the workflow's initial phase and a plan file under .vibe/. \
        Calling again for an existing session returns its current state.")]
    async fn start_development(
        &self,
        Parameters(params): Parameters<StartDevelopmentParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .start_development(params)
            .await
            .map_err(phase_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Get guidance for what to do next. Pass a trigger (e.g. 'requirements_complete') \
        to move along the workflow; omit it to get instructions for the current phase.")]
    async fn whats_next(
        &self,
        Parameters(params): Parameters<WhatsNextParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .whats_next(params)
            .await
            .map_err(phase_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Move directly to a named phase of the session's workflow, \
        whether or not the workflow models a transition from the current phase.")]
    async fn proceed_to_phase(
        &self,
        Parameters(params): Parameters<ProceedToPhaseParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .proceed_to_phase(params)
            .await
            .map_err(phase_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "List the built-in workflows and the project's custom workflow if one exists")]
    async fn list_workflows(
        &self,
        Parameters(params): Parameters<ListWorkflowsParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.service.list_workflows(params).await;
        json_success(&response)
    }

    #[tool(description = "Delete the session for the current project and branch, including its plan file \
        and interaction history. Requires confirm=true.")]
    async fn reset_development(
        &self,
        Parameters(params): Parameters<ResetDevelopmentParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .reset_development(params)
            .await
            .map_err(phase_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Resume an existing session: current phase, guidance, plan file tasks and session details")]
    async fn resume_workflow(
        &self,
        Parameters(params): Parameters<ResumeWorkflowParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .service
            .resume_workflow(params)
            .await
            .map_err(phase_error_to_mcp)?;
        json_success(&response)
    }
}

#[tool_handler]
impl rmcp::ServerHandler for PhaseMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Phase MCP server that tracks development sessions through workflow phases \
                 (requirements, design, implementation, ...). Call start_development first, \
                 then whats_next after each step and follow the returned instructions."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ============================================================================
// EmbeddableMcp Implementation
// ============================================================================

#[async_trait]
impl EmbeddableMcp for PhaseMcpServer {
    fn server_name(&self) -> &str {
        "phase"
    }

    fn server_description(&self) -> Option<&str> {
        Some("Workflow phase tracking for development sessions, keyed by project and branch")
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "start_development" => {
                let params: StartDevelopmentParams = serde_json::from_value(params)?;
                self.start_development(Parameters(params)).await.map_err(Into::into)
            }
            "whats_next" => {
                let params: WhatsNextParams = serde_json::from_value(params)?;
                self.whats_next(Parameters(params)).await.map_err(Into::into)
            }
            "proceed_to_phase" => {
                let params: ProceedToPhaseParams = serde_json::from_value(params)?;
                self.proceed_to_phase(Parameters(params)).await.map_err(Into::into)
            }
            "list_workflows" => {
                let params: ListWorkflowsParams = serde_json::from_value(params)?;
                self.list_workflows(Parameters(params)).await.map_err(Into::into)
            }
            "reset_development" => {
                let params: ResetDevelopmentParams = serde_json::from_value(params)?;
                self.reset_development(Parameters(params)).await.map_err(Into::into)
            }
            "resume_workflow" => {
                let params: ResumeWorkflowParams = serde_json::from_value(params)?;
                self.resume_workflow(Parameters(params)).await.map_err(Into::into)
            }
            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::RawContent;
    use tempfile::TempDir;

    fn server() -> PhaseMcpServer {
        PhaseMcpServer::with_config(PhaseConfig::test_mode()).unwrap()
    }

    fn json_body(result: &CallToolResult) -> Value {
        match &result.content[0].raw {
            RawContent::Text(text) => serde_json::from_str(&text.text).unwrap(),
            other => panic!("expected text content, got {:?}", other),
        }
    }

    #[test]
    fn test_embeddable_server_name() {
        assert_eq!(server().server_name(), "phase");
    }

    #[test]
    fn test_embeddable_list_tools() {
        let tools = server().list_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();

        assert_eq!(tools.len(), 6);
        for expected in [
            "start_development",
            "whats_next",
            "proceed_to_phase",
            "list_workflows",
            "reset_development",
            "resume_workflow",
        ] {
            assert!(names.contains(&expected), "missing tool {}", expected);
        }
    }

    #[tokio::test]
    async fn test_embeddable_start_and_advance() {
        let server = server();
        let dir = TempDir::new().unwrap();
        let project = dir.path().to_string_lossy().to_string();

        let started = server
            .call_tool(
                "start_development",
                serde_json::json!({ "workflow": "waterfall", "project_path": project }),
            )
            .await
            .unwrap();
        assert_eq!(json_body(&started)["phase"], "idle");

        let next = server
            .call_tool(
                "whats_next",
                serde_json::json!({ "trigger": "new_feature_request", "project_path": project }),
            )
            .await
            .unwrap();
        let body = json_body(&next);
        assert_eq!(body["phase"], "requirements");
        assert_eq!(body["is_modeled_transition"], true);
    }

    #[tokio::test]
    async fn test_embeddable_caller_error() {
        let server = server();
        let dir = TempDir::new().unwrap();

        let result = server
            .call_tool(
                "whats_next",
                serde_json::json!({ "project_path": dir.path().to_string_lossy() }),
            )
            .await;
        match result {
            Err(EmbeddableError::McpError(message)) => {
                assert!(message.contains("start_development"), "{}", message)
            }
            other => panic!("expected McpError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embeddable_bad_params() {
        let result = server()
            .call_tool("proceed_to_phase", serde_json::json!({ "reason": "no target" }))
            .await;
        assert!(matches!(result, Err(EmbeddableError::SerdeError(_))));
    }

    #[tokio::test]
    async fn test_embeddable_unknown_tool() {
        let result = server()
            .call_tool("nonexistent_tool", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(EmbeddableError::ToolNotFound(_))));
    }

    #[test]
    fn test_error_mapping() {
        use crate::types::PhaseError;
        use rmcp::model::ErrorCode;

        let err = phase_error_to_mcp(PhaseError::ResetNotConfirmed);
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.unwrap()["kind"], "ResetNotConfirmed");

        let err = phase_error_to_mcp(PhaseError::Storage("disk full".to_string()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }
}
