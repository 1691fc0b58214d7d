//! MCP parameter types for phase tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for start_development tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartDevelopmentParams {
    #[schemars(description = "Workflow to follow: a built-in name (see list_workflows) or 'custom' for the project's .vibe/workflow.yaml")]
    pub workflow: String,

    #[schemars(description = "Project directory (default: server's configured project or working directory)")]
    #[serde(default)]
    pub project_path: Option<String>,

    #[schemars(description = "Require a review before each proceed_to_phase (default: false)")]
    #[serde(default)]
    pub require_reviews: Option<bool>,
}

/// Parameters for whats_next tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WhatsNextParams {
    #[schemars(description = "Trigger to fire from the current phase (e.g. 'requirements_complete'). Omit to stay in the current phase.")]
    #[serde(default)]
    pub trigger: Option<String>,

    #[schemars(description = "Free-text description of the current situation")]
    #[serde(default)]
    pub context: Option<String>,

    #[schemars(description = "The user's latest message")]
    #[serde(default)]
    pub user_input: Option<String>,

    #[schemars(description = "Summary of the conversation so far")]
    #[serde(default)]
    pub conversation_summary: Option<String>,

    #[serde(default)]
    pub project_path: Option<String>,
}

/// Review status passed with proceed_to_phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewState {
    #[default]
    NotRequired,
    Pending,
    Performed,
}

/// Parameters for proceed_to_phase tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProceedToPhaseParams {
    #[schemars(description = "Phase to move to")]
    pub target_phase: String,

    #[schemars(description = "Why the transition happens")]
    #[serde(default)]
    pub reason: Option<String>,

    #[schemars(description = "Review status when the session requires reviews: 'not-required', 'pending' or 'performed'")]
    #[serde(default)]
    pub review_state: ReviewState,

    #[serde(default)]
    pub project_path: Option<String>,
}

/// Parameters for list_workflows tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListWorkflowsParams {
    #[schemars(description = "Project whose custom workflow should be included")]
    #[serde(default)]
    pub project_path: Option<String>,
}

/// Parameters for reset_development tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResetDevelopmentParams {
    #[schemars(description = "Must be true; deletes the session, its plan file and interaction history")]
    pub confirm: bool,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub project_path: Option<String>,
}

/// Parameters for resume_workflow tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResumeWorkflowParams {
    #[serde(default)]
    pub project_path: Option<String>,
}
