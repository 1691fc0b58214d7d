//! Phase operation handlers
//!
//! [`PhaseService`] implements the request-level operations behind the MCP
//! tools. Every state change is persisted before a response is built, so a
//! caller never sees guidance for a phase the store does not hold.

use chrono::Utc;
use mcp_common::{caller_error, server_error, McpError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::WorkflowCatalog;
use crate::composer::compose;
use crate::config::PhaseConfig;
use crate::engine::{phase_guidance, transition, TransitionRequest, TriggerHint};
use crate::identity::SessionIdentity;
use crate::params::*;
use crate::plan::{ensure_plan_file, plan_file_path, remove_plan_file, summarize, PlanFileSummary};
use crate::store::SessionStore;
use crate::types::{
    InteractionRecord, NewSession, PhaseError, PhaseResult, Session, SessionUpdate, WorkflowGraph,
    WorkflowInfo,
};

/// Map a phase error onto an MCP error
///
/// Caller mistakes become `invalid_params`; storage and I/O faults become
/// `internal_error`. Both carry `{kind, context}` as error data.
pub fn phase_error_to_mcp(e: PhaseError) -> McpError {
    let data = Some(e.details());
    if e.is_caller_error() {
        caller_error(e.to_string(), data)
    } else {
        server_error(e.to_string(), data)
    }
}

/// Response shared by all phase-changing operations
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResponse {
    pub phase: String,
    pub instructions: String,
    pub transition_reason: String,
    pub session_key: String,
    pub workflow: String,
    pub plan_file_path: String,
    pub is_modeled_transition: bool,
    pub available_triggers: Vec<TriggerHint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowListResponse {
    pub workflows: Vec<WorkflowInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub session_key: String,
    /// Always `None`: the session no longer exists
    pub phase: Option<String>,
    pub instructions: String,
    pub transition_reason: String,
    pub reset: bool,
    pub plan_file_removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeResponse {
    #[serde(flatten)]
    pub current: PhaseResponse,
    pub session: Session,
    pub plan: PlanFileSummary,
    pub interaction_count: usize,
}

/// Orchestrates identity, store, catalog, engine and composer
#[derive(Clone)]
pub struct PhaseService {
    catalog: Arc<WorkflowCatalog>,
    store: SessionStore,
    config: PhaseConfig,
}

impl PhaseService {
    pub fn new(catalog: Arc<WorkflowCatalog>, store: SessionStore, config: PhaseConfig) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn identify(&self, project_path: Option<&str>) -> SessionIdentity {
        SessionIdentity::resolve(
            project_path,
            self.config.project_path.as_deref(),
            self.config.key_mode,
        )
    }

    async fn require_session(&self, identity: &SessionIdentity) -> PhaseResult<Session> {
        self.store
            .get(&identity.session_key)
            .await?
            .ok_or_else(|| PhaseError::SessionNotFound {
                session_key: identity.session_key.clone(),
            })
    }

    async fn graph_for(&self, session: &Session) -> PhaseResult<Arc<WorkflowGraph>> {
        self.catalog
            .resolve_for_project(Path::new(&session.project_path), &session.workflow_name)
            .await
    }

    async fn respond(
        &self,
        session: &Session,
        graph: &WorkflowGraph,
        guidance: &str,
        transition_reason: String,
        is_modeled_transition: bool,
    ) -> (PhaseResponse, PlanFileSummary) {
        let plan = summarize(Path::new(&session.plan_file_path), &session.current_phase).await;
        let response = PhaseResponse {
            phase: session.current_phase.clone(),
            instructions: compose(guidance, session, &plan),
            transition_reason,
            session_key: session.session_key.clone(),
            workflow: session.workflow_name.clone(),
            plan_file_path: session.plan_file_path.clone(),
            is_modeled_transition,
            available_triggers: phase_guidance(graph, &session.current_phase).available_triggers,
        };
        (response, plan)
    }

    async fn record<I: Serialize>(&self, tool: &str, input: &I, response: &PhaseResponse) {
        let record = InteractionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_key: response.session_key.clone(),
            tool_name: tool.to_string(),
            input: serde_json::to_string(input).unwrap_or_default(),
            response: serde_json::to_string(response).unwrap_or_default(),
            phase: response.phase.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.log_interaction(&record).await {
            tracing::warn!("Failed to log {} interaction: {}", tool, e);
        }
    }

    /// Start (or rejoin) the session for a project+branch
    pub async fn start_development(&self, params: StartDevelopmentParams) -> PhaseResult<PhaseResponse> {
        let identity = self.identify(params.project_path.as_deref());

        if let Some(existing) = self.store.get(&identity.session_key).await? {
            let graph = self.graph_for(&existing).await?;
            let guidance = phase_guidance(&graph, &existing.current_phase);
            let reason = if existing.workflow_name == params.workflow {
                "Development already in progress; continuing".to_string()
            } else {
                format!(
                    "Development already in progress with workflow '{}'; call reset_development to switch to '{}'",
                    existing.workflow_name, params.workflow
                )
            };
            let (response, _) = self
                .respond(&existing, &graph, &guidance.instructions, reason, false)
                .await;
            return Ok(response);
        }

        let graph = self
            .catalog
            .resolve_for_project(&identity.project_path, &params.workflow)
            .await?;
        let plan_path = plan_file_path(&identity.project_path, &identity.branch);

        let session = self
            .store
            .create(NewSession {
                session_key: identity.session_key.clone(),
                project_path: identity.project_path.display().to_string(),
                branch: identity.branch.clone(),
                workflow_name: params.workflow.clone(),
                initial_phase: graph.initial_phase.clone(),
                plan_file_path: plan_path.display().to_string(),
                require_reviews: params.require_reviews.unwrap_or(false),
            })
            .await?;

        if let Err(e) = ensure_plan_file(&plan_path, &graph).await {
            tracing::warn!("Failed to create plan file at {:?}: {}", plan_path, e);
        }

        tracing::info!(
            session_key = %session.session_key,
            workflow = %session.workflow_name,
            branch = %session.branch,
            "Development started"
        );

        let guidance = phase_guidance(&graph, &session.current_phase);
        let reason = format!("Development started with workflow '{}'", params.workflow);
        let (response, _) = self
            .respond(&session, &graph, &guidance.instructions, reason, false)
            .await;
        self.record("start_development", &params, &response).await;
        Ok(response)
    }

    /// Fire a trigger, or report guidance for the current phase
    pub async fn whats_next(&self, params: WhatsNextParams) -> PhaseResult<PhaseResponse> {
        let identity = self.identify(params.project_path.as_deref());
        let session = self.require_session(&identity).await?;
        let graph = self.graph_for(&session).await?;

        let trigger = params.trigger.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let response = match trigger {
            Some(trigger) => {
                let outcome = transition(
                    &graph,
                    &session.current_phase,
                    &TransitionRequest::trigger(trigger),
                )?;
                let session = self
                    .store
                    .update(&session.session_key, SessionUpdate::phase(&outcome.to_phase))
                    .await?;
                tracing::info!(
                    session_key = %session.session_key,
                    from = %outcome.from_phase,
                    to = %outcome.to_phase,
                    trigger,
                    "Phase transition"
                );
                let is_modeled = outcome.is_modeled();
                self.respond(
                    &session,
                    &graph,
                    &outcome.instructions,
                    outcome.transition_reason,
                    is_modeled,
                )
                .await
                .0
            }
            None => {
                let guidance = phase_guidance(&graph, &session.current_phase);
                let reason = format!("Continuing in phase '{}'", session.current_phase);
                self.respond(&session, &graph, &guidance.instructions, reason, false)
                    .await
                    .0
            }
        };

        self.record("whats_next", &params, &response).await;
        Ok(response)
    }

    /// Jump to a named phase
    pub async fn proceed_to_phase(&self, params: ProceedToPhaseParams) -> PhaseResult<PhaseResponse> {
        let identity = self.identify(params.project_path.as_deref());
        let session = self.require_session(&identity).await?;
        let graph = self.graph_for(&session).await?;

        let outcome = transition(
            &graph,
            &session.current_phase,
            &TransitionRequest::Target {
                phase: params.target_phase.clone(),
                reason: params.reason.clone(),
            },
        )?;

        if session.require_reviews
            && params.review_state != ReviewState::Performed
            && outcome.to_phase != session.current_phase
        {
            let guidance = format!(
                "Reviews are required before leaving '{}'. Review the work of this phase against \
                 the plan file with the user, then call proceed_to_phase again with \
                 review_state 'performed'.",
                session.current_phase
            );
            let reason = format!("Review pending before moving to '{}'", outcome.to_phase);
            let (response, _) = self.respond(&session, &graph, &guidance, reason, false).await;
            return Ok(response);
        }

        let session = self
            .store
            .update(&session.session_key, SessionUpdate::phase(&outcome.to_phase))
            .await?;
        tracing::info!(
            session_key = %session.session_key,
            from = %outcome.from_phase,
            to = %outcome.to_phase,
            kind = ?outcome.kind,
            "Explicit phase transition"
        );

        let is_modeled = outcome.is_modeled();
        let (response, _) = self
            .respond(
                &session,
                &graph,
                &outcome.instructions,
                outcome.transition_reason,
                is_modeled,
            )
            .await;
        self.record("proceed_to_phase", &params, &response).await;
        Ok(response)
    }

    /// Built-in workflows plus the project's custom one
    pub async fn list_workflows(&self, params: ListWorkflowsParams) -> WorkflowListResponse {
        let identity = self.identify(params.project_path.as_deref());
        let workflows = self.catalog.list_for_project(&identity.project_path).await;
        WorkflowListResponse {
            total: workflows.len(),
            workflows,
        }
    }

    /// Destroy the session, its plan file and its interaction log
    pub async fn reset_development(&self, params: ResetDevelopmentParams) -> PhaseResult<ResetResponse> {
        if !params.confirm {
            return Err(PhaseError::ResetNotConfirmed);
        }

        let identity = self.identify(params.project_path.as_deref());
        let session = self.require_session(&identity).await?;

        let reset = self.store.delete(&session.session_key).await?;
        let plan_file_removed = match remove_plan_file(Path::new(&session.plan_file_path)).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Failed to remove plan file {:?}: {}", session.plan_file_path, e);
                false
            }
        };

        let transition_reason = params
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("Development reset from phase '{}'", session.current_phase));
        tracing::info!(
            session_key = %session.session_key,
            reason = %transition_reason,
            "Development reset"
        );

        Ok(ResetResponse {
            session_key: session.session_key,
            phase: None,
            instructions: "Session, plan file and interaction history deleted. Call start_development to begin again."
                .to_string(),
            transition_reason,
            reset,
            plan_file_removed,
        })
    }

    /// Current state with guidance for picking the work back up
    pub async fn resume_workflow(&self, params: ResumeWorkflowParams) -> PhaseResult<ResumeResponse> {
        let identity = self.identify(params.project_path.as_deref());
        let session = self.require_session(&identity).await?;
        let graph = self.graph_for(&session).await?;

        let guidance = phase_guidance(&graph, &session.current_phase);
        let reason = format!("Resuming in phase '{}'", session.current_phase);
        let (current, plan) = self
            .respond(&session, &graph, &guidance.instructions, reason, false)
            .await;
        let interaction_count = self.store.interactions(&session.session_key).await?.len();

        Ok(ResumeResponse {
            current,
            session,
            plan,
            interaction_count,
        })
    }
}
