//! Transition engine
//!
//! Pure functions over a [`WorkflowGraph`]: no I/O, no persistence. Callers
//! persist the resulting phase through the session store.
//!
//! Modeled edges are the recommended path, not an enforced one. An explicit
//! jump to any declared phase always succeeds, falling back to the graph's
//! direct transition rule or a generic message when no edge leads there.

use serde::Serialize;

use crate::types::{Edge, PhaseError, PhaseResult, WorkflowGraph};

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRequest {
    /// Follow the edge with this trigger
    Trigger(String),
    /// Go to this phase, with an optional caller-supplied reason
    Target { phase: String, reason: Option<String> },
}

impl TransitionRequest {
    pub fn trigger(trigger: impl Into<String>) -> Self {
        Self::Trigger(trigger.into())
    }

    pub fn target(phase: impl Into<String>) -> Self {
        Self::Target {
            phase: phase.into(),
            reason: None,
        }
    }
}

/// Where the guidance of a transition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// A modeled edge of the current phase
    Modeled,
    /// A self-loop refine edge
    Refine,
    /// The graph's direct transition rule for the target
    DirectRule,
    /// No edge or rule; generated guidance
    DirectGeneric,
}

/// Result of a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from_phase: String,
    pub to_phase: String,
    pub instructions: String,
    pub transition_reason: String,
    pub kind: TransitionKind,
}

impl TransitionOutcome {
    pub fn is_modeled(&self) -> bool {
        self.kind == TransitionKind::Modeled
    }

    fn from_edge(from: &str, edge: &Edge) -> Self {
        Self {
            from_phase: from.to_string(),
            to_phase: edge.target.clone(),
            instructions: edge.instructions.clone(),
            transition_reason: edge.transition_reason.clone(),
            kind: if edge.is_modeled {
                TransitionKind::Modeled
            } else {
                TransitionKind::Refine
            },
        }
    }
}

/// A trigger available from a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerHint {
    pub trigger: String,
    pub target: String,
    pub is_modeled: bool,
}

/// Guidance for staying in a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseGuidance {
    pub phase: String,
    pub description: Option<String>,
    pub instructions: String,
    pub available_triggers: Vec<TriggerHint>,
}

fn phase_not_found(graph: &WorkflowGraph, requested: &str) -> PhaseError {
    PhaseError::PhaseNotFound {
        requested: requested.to_string(),
        workflow: graph.name.clone(),
        valid_phases: graph.phase_names(),
    }
}

/// Compute the next phase for `request` from `current`
///
/// `current` may be a phase the graph no longer declares; it then has no
/// edges and only explicit jumps succeed.
pub fn transition(
    graph: &WorkflowGraph,
    current: &str,
    request: &TransitionRequest,
) -> PhaseResult<TransitionOutcome> {
    let node = graph.phase(current);

    match request {
        TransitionRequest::Trigger(trigger) => node
            .and_then(|n| n.edge(trigger))
            .map(|edge| TransitionOutcome::from_edge(current, edge))
            .ok_or_else(|| phase_not_found(graph, trigger)),

        TransitionRequest::Target { phase, reason } => {
            let target = graph.phase(phase).ok_or_else(|| phase_not_found(graph, phase))?;

            let mut outcome = if let Some(edge) = node.and_then(|n| n.edge_to(phase)) {
                TransitionOutcome::from_edge(current, edge)
            } else if let Some(rule) = graph.direct_rule(phase) {
                TransitionOutcome {
                    from_phase: current.to_string(),
                    to_phase: phase.clone(),
                    instructions: rule.instructions.clone(),
                    transition_reason: rule
                        .transition_reason
                        .clone()
                        .unwrap_or_else(|| direct_reason(current, phase)),
                    kind: TransitionKind::DirectRule,
                }
            } else {
                let mut instructions = format!(
                    "Direct transition to the '{}' phase: {}.",
                    phase, target.description
                );
                if let Some(default) = &target.default_instructions {
                    instructions.push_str("\n\n");
                    instructions.push_str(default);
                }
                TransitionOutcome {
                    from_phase: current.to_string(),
                    to_phase: phase.clone(),
                    instructions,
                    transition_reason: direct_reason(current, phase),
                    kind: TransitionKind::DirectGeneric,
                }
            };

            if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
                outcome.transition_reason = reason.to_string();
            }
            Ok(outcome)
        }
    }
}

fn direct_reason(from: &str, to: &str) -> String {
    format!("Direct transition from {} to {}", from, to)
}

/// Guidance for continuing in `phase`, plus the triggers that lead out of it
pub fn phase_guidance(graph: &WorkflowGraph, phase: &str) -> PhaseGuidance {
    let Some(node) = graph.phase(phase) else {
        return PhaseGuidance {
            phase: phase.to_string(),
            description: None,
            instructions: format!(
                "Phase '{}' is not part of workflow '{}'. Use proceed_to_phase to move to one of: {}.",
                phase,
                graph.name,
                graph.phase_names().join(", ")
            ),
            available_triggers: Vec::new(),
        };
    };

    let instructions = node
        .default_instructions
        .clone()
        .or_else(|| graph.direct_rule(phase).map(|r| r.instructions.clone()))
        .unwrap_or_else(|| format!("Continue working on the '{}' phase: {}.", phase, node.description));

    PhaseGuidance {
        phase: phase.to_string(),
        description: Some(node.description.clone()),
        instructions,
        available_triggers: node
            .transitions
            .iter()
            .map(|e| TriggerHint {
                trigger: e.trigger.clone(),
                target: e.target.clone(),
                is_modeled: e.is_modeled,
            })
            .collect(),
    }
}
