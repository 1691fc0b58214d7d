//! Core type definitions
//!
//! Workflow graphs, sessions, and the error type shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A transition out of a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Trigger name (e.g. `requirements_complete`)
    pub trigger: String,

    /// Phase this edge leads to
    pub target: String,

    /// Guidance shown when the edge is taken
    pub instructions: String,

    /// Human-readable reason recorded for the transition
    pub transition_reason: String,

    /// `false` for self-loop refine edges
    pub is_modeled: bool,
}

/// A phase of a workflow graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseNode {
    pub name: String,
    pub description: String,

    /// Guidance while staying in this phase
    pub default_instructions: Option<String>,

    /// Outgoing edges in declaration order
    pub transitions: Vec<Edge>,
}

impl PhaseNode {
    /// Find the edge for a trigger
    pub fn edge(&self, trigger: &str) -> Option<&Edge> {
        self.transitions.iter().find(|e| e.trigger == trigger)
    }

    /// Find the first edge leading to `target`
    pub fn edge_to(&self, target: &str) -> Option<&Edge> {
        self.transitions.iter().find(|e| e.target == target)
    }
}

/// Guidance used when a caller jumps straight to a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectTransitionRule {
    pub phase: String,
    pub instructions: String,
    pub transition_reason: Option<String>,
}

/// A validated workflow graph. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowGraph {
    pub name: String,
    pub display_name: Option<String>,
    pub description: String,
    pub initial_phase: String,

    /// Phases in declaration order
    pub phases: Vec<PhaseNode>,

    pub direct_transitions: Vec<DirectTransitionRule>,
}

impl WorkflowGraph {
    pub fn phase(&self, name: &str) -> Option<&PhaseNode> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn phase_names(&self) -> Vec<String> {
        self.phases.iter().map(|p| p.name.clone()).collect()
    }

    pub fn direct_rule(&self, phase: &str) -> Option<&DirectTransitionRule> {
        self.direct_transitions.iter().find(|r| r.phase == phase)
    }

    /// Read-only projection used for catalog listings
    pub fn info(&self) -> WorkflowInfo {
        WorkflowInfo {
            name: self.name.clone(),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| title_case(&self.name)),
            description: self.description.clone(),
            initial_phase: self.initial_phase.clone(),
            phases: self.phase_names(),
        }
    }
}

/// Catalog listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub initial_phase: String,
    pub phases: Vec<String>,
}

/// Persisted state of one project+branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_key: String,
    pub project_path: String,
    pub branch: String,
    pub current_phase: String,
    pub plan_file_path: String,
    pub workflow_name: String,

    /// Whether phase changes must be preceded by a review
    pub require_reviews: bool,

    /// Incremented on every successful write
    pub revision: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_key: String,
    pub project_path: String,
    pub branch: String,
    pub workflow_name: String,
    pub initial_phase: String,
    pub plan_file_path: String,
    pub require_reviews: bool,
}

impl NewSession {
    pub fn into_session(self) -> Session {
        let now = Utc::now();
        Session {
            session_key: self.session_key,
            project_path: self.project_path,
            branch: self.branch,
            current_phase: self.initial_phase,
            plan_file_path: self.plan_file_path,
            workflow_name: self.workflow_name,
            require_reviews: self.require_reviews,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub current_phase: Option<String>,
    pub plan_file_path: Option<String>,
    pub workflow_name: Option<String>,
    pub require_reviews: Option<bool>,
}

impl SessionUpdate {
    pub fn phase(phase: impl Into<String>) -> Self {
        Self {
            current_phase: Some(phase.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current_phase.is_none()
            && self.plan_file_path.is_none()
            && self.workflow_name.is_none()
            && self.require_reviews.is_none()
    }

    /// Apply to a session, bumping revision and timestamp
    pub fn apply_to(self, session: &mut Session) {
        if let Some(phase) = self.current_phase {
            session.current_phase = phase;
        }
        if let Some(path) = self.plan_file_path {
            session.plan_file_path = path;
        }
        if let Some(workflow) = self.workflow_name {
            session.workflow_name = workflow;
        }
        if let Some(require) = self.require_reviews {
            session.require_reviews = require;
        }
        session.revision += 1;
        session.updated_at = Utc::now();
    }
}

/// One logged tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub session_key: String,
    pub tool_name: String,
    pub input: String,
    pub response: String,
    pub phase: String,
    pub created_at: DateTime<Utc>,
}

/// Engine and store errors
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("Invalid workflow definition '{origin}': {reason}")]
    DefinitionInvalid { origin: String, reason: String },

    #[error("Unknown workflow '{name}'. Available workflows: {}", .available.join(", "))]
    UnknownWorkflow { name: String, available: Vec<String> },

    #[error("No custom workflow found. Searched: {}", .searched.join(", "))]
    CustomWorkflowMissing { searched: Vec<String> },

    #[error(
        "'{requested}' is not a valid trigger or phase in workflow '{workflow}'. Valid phases: {}",
        .valid_phases.join(", ")
    )]
    PhaseNotFound {
        requested: String,
        workflow: String,
        valid_phases: Vec<String>,
    },

    #[error("No development session '{session_key}'. Call start_development first.")]
    SessionNotFound { session_key: String },

    #[error("Write conflict on session '{session_key}'")]
    StoreWriteConflict { session_key: String },

    #[error("Reset requires confirm=true")]
    ResetNotConfirmed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PhaseError {
    pub fn definition(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DefinitionInvalid {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Stable kind name for callers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DefinitionInvalid { .. } => "DefinitionInvalid",
            Self::UnknownWorkflow { .. } => "UnknownWorkflow",
            Self::CustomWorkflowMissing { .. } => "CustomWorkflowMissing",
            Self::PhaseNotFound { .. } => "PhaseNotFound",
            Self::SessionNotFound { .. } => "SessionNotFound",
            Self::StoreWriteConflict { .. } => "StoreWriteConflict",
            Self::ResetNotConfirmed => "ResetNotConfirmed",
            Self::Io(_) => "Io",
            Self::Storage(_) => "Storage",
        }
    }

    /// Whether the caller can fix the request and retry
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            Self::Io(_) | Self::Storage(_) | Self::StoreWriteConflict { .. }
        )
    }

    /// Kind plus context fields, for structured error payloads
    pub fn details(&self) -> serde_json::Value {
        let context = match self {
            Self::DefinitionInvalid { origin, reason } => {
                json!({ "origin": origin, "reason": reason })
            }
            Self::UnknownWorkflow { name, available } => {
                json!({ "requested": name, "available": available })
            }
            Self::CustomWorkflowMissing { searched } => json!({ "searched": searched }),
            Self::PhaseNotFound {
                requested,
                workflow,
                valid_phases,
            } => json!({
                "requested": requested,
                "workflow": workflow,
                "valid_phases": valid_phases,
            }),
            Self::SessionNotFound { session_key } | Self::StoreWriteConflict { session_key } => {
                json!({ "session_key": session_key })
            }
            Self::ResetNotConfirmed | Self::Io(_) | Self::Storage(_) => json!({}),
        };
        json!({ "kind": self.kind(), "context": context })
    }
}

impl From<rusqlite::Error> for PhaseError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type PhaseResult<T> = Result<T, PhaseError>;

/// `code_review` -> `Code Review`
pub fn title_case(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
