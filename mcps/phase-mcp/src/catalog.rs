//! Workflow catalog
//!
//! Holds the built-in graphs, built once at start-up and shared by `Arc`.
//! Project-level custom graphs are never cached: every resolution re-reads
//! the project's override file so edits take effect without a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::loader::{builtin_workflows, load_file};
use crate::types::{PhaseError, PhaseResult, WorkflowGraph, WorkflowInfo};

/// Workflow name selecting the project's own definition
pub const CUSTOM_WORKFLOW: &str = "custom";

/// Project-relative override locations, highest priority first
pub const CUSTOM_WORKFLOW_CANDIDATES: &[&str] = &[
    ".vibe/workflow.yaml",
    ".vibe/workflow.yml",
    ".vibe/state-machine.yaml",
    ".vibe/state-machine.yml",
    ".vibe/workflow.toml",
];

/// Registry of workflow graphs
#[derive(Debug)]
pub struct WorkflowCatalog {
    builtin: BTreeMap<String, Arc<WorkflowGraph>>,
}

impl WorkflowCatalog {
    /// Build the catalog from the compiled-in definitions
    pub fn new() -> PhaseResult<Self> {
        Ok(Self::from_graphs(builtin_workflows()?))
    }

    pub fn from_graphs(graphs: impl IntoIterator<Item = WorkflowGraph>) -> Self {
        let builtin = graphs
            .into_iter()
            .map(|g| (g.name.clone(), Arc::new(g)))
            .collect();
        Self { builtin }
    }

    pub fn list_builtin(&self) -> Vec<WorkflowInfo> {
        self.builtin.values().map(|g| g.info()).collect()
    }

    /// Built-in names plus the custom sentinel
    pub fn valid_names(&self) -> Vec<String> {
        self.builtin
            .keys()
            .cloned()
            .chain(std::iter::once(CUSTOM_WORKFLOW.to_string()))
            .collect()
    }

    pub fn get(&self, name: &str) -> PhaseResult<Arc<WorkflowGraph>> {
        self.builtin
            .get(name)
            .cloned()
            .ok_or_else(|| PhaseError::UnknownWorkflow {
                name: name.to_string(),
                available: self.valid_names(),
            })
    }

    /// Resolve `requested` for a project, reading the custom file when asked for
    pub async fn resolve_for_project(
        &self,
        project_path: &Path,
        requested: &str,
    ) -> PhaseResult<Arc<WorkflowGraph>> {
        if let Some(graph) = self.builtin.get(requested) {
            return Ok(graph.clone());
        }
        if requested != CUSTOM_WORKFLOW {
            return Err(PhaseError::UnknownWorkflow {
                name: requested.to_string(),
                available: self.valid_names(),
            });
        }

        Ok(Arc::new(load_custom_workflow(project_path).await?))
    }

    /// Built-ins plus the project's custom workflow when one loads
    pub async fn list_for_project(&self, project_path: &Path) -> Vec<WorkflowInfo> {
        let mut workflows = self.list_builtin();

        match load_custom_workflow(project_path).await {
            Ok(graph) => {
                let mut info = graph.info();
                info.name = CUSTOM_WORKFLOW.to_string();
                workflows.push(info);
            }
            Err(PhaseError::CustomWorkflowMissing { .. }) => {}
            Err(e) => tracing::warn!("Skipping custom workflow: {}", e),
        }

        workflows
    }
}

/// Candidate paths in priority order
pub fn custom_candidates(project_path: &Path) -> Vec<PathBuf> {
    CUSTOM_WORKFLOW_CANDIDATES
        .iter()
        .map(|rel| project_path.join(rel))
        .collect()
}

/// First candidate that exists and loads
///
/// A candidate that fails to load is skipped in favour of the next one. If
/// none loads, the first load error is returned; if none exists,
/// `CustomWorkflowMissing` lists every path searched.
pub async fn load_custom_workflow(project_path: &Path) -> PhaseResult<WorkflowGraph> {
    let candidates = custom_candidates(project_path);
    let mut first_error = None;

    for candidate in &candidates {
        if !tokio::fs::try_exists(candidate).await.unwrap_or(false) {
            continue;
        }
        match load_file(candidate).await {
            Ok(graph) => {
                tracing::debug!("Loaded custom workflow from {:?}", candidate);
                return Ok(graph);
            }
            Err(e) => {
                tracing::warn!("Custom workflow {:?} does not load: {}", candidate, e);
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| PhaseError::CustomWorkflowMissing {
        searched: candidates.iter().map(|p| p.display().to_string()).collect(),
    }))
}
